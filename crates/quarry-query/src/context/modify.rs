//! Statement contexts for UPDATE, DELETE, INSERT and insert-or-update.

use super::{
    BuildContext, ContextCore, ContextId, ConvertFlags, ExpressionBuilder, RequestFor,
    ResultAccessor, SqlInfo, TableContext, TableSourceKind,
};
use crate::error::{TranslateError, TranslateResult};
use crate::expr::Expr;
use crate::mapping::{ColumnMapping, TableMapping};
use crate::sql::{
    DeleteStatement, InsertOrUpdateStatement, InsertSource, InsertStatement, OutputItem,
    OutputRow, QueryId, SelectColumn, SelectQuery, SetItem, SqlStatement, SqlTable,
    UpdateStatement,
};

/// Physical table a statement writes to
#[derive(Debug, Clone)]
pub(super) struct TargetTable {
    pub context: ContextId,
    pub table: SqlTable,
    pub alias: String,
    pub mapping: TableMapping,
}

impl TargetTable {
    pub fn of(b: &ExpressionBuilder, context: ContextId) -> Option<Self> {
        let ctx = b.context(context);
        let table = ctx.as_table()?;
        Some(Self {
            context,
            table: table.sql_table(),
            alias: table.alias(),
            mapping: table.mapping().clone(),
        })
    }

    /// Table context whose query only filters a single mapped table
    pub fn simple(
        b: &ExpressionBuilder,
        context: ContextId,
        operation: &'static str,
    ) -> TranslateResult<Self> {
        let ctx = b.context(context);
        let is_table = ctx
            .as_table()
            .is_some_and(|t| t.source_kind() == TableSourceKind::Table);
        if !is_table || !b.query(ctx.query_id()).is_simple() {
            return Err(b.not_implemented(context, None, 0, operation));
        }
        Self::of(b, context).ok_or_else(|| b.not_implemented(context, None, 0, operation))
    }

    pub fn primary_key(&self) -> TranslateResult<Vec<String>> {
        let keys: Vec<String> = self
            .mapping
            .primary_key()
            .into_iter()
            .map(|c| c.column.clone())
            .collect();
        if keys.is_empty() {
            return Err(TranslateError::MissingPrimaryKey {
                entity: self.mapping.entity.clone(),
            });
        }
        Ok(keys)
    }
}

/// Assignments from a constructor-shaped setter, one per mapped member
pub(super) fn setter_items(
    b: &mut ExpressionBuilder,
    owner: ContextId,
    setter: &Expr,
    sources: &[ContextId],
    mapping: &TableMapping,
    skip: impl Fn(&ColumnMapping) -> bool,
) -> TranslateResult<Vec<SetItem>> {
    b.with_lambda(setter, sources, |b, body| {
        let Some(members) = body.constructed_members() else {
            return Err(b.not_implemented(owner, Some(body), 0, "assign from a non-constructor setter"));
        };
        let mut items = Vec::with_capacity(members.len());
        for (member, value) in members {
            let column = mapping
                .column(member)
                .ok_or_else(|| TranslateError::UnknownMember {
                    entity: mapping.entity.clone(),
                    member: member.clone(),
                    context: b.context_path(owner),
                })?;
            if skip(column) {
                continue;
            }
            items.push(SetItem::new(column.column.clone(), b.convert_expr(value)?));
        }
        Ok(items)
    })
}

macro_rules! statement_context {
    ($name:literal) => {
        fn core(&self) -> &ContextCore {
            &self.core
        }

        fn kind(&self) -> &'static str {
            $name
        }

        fn convert_to_sql(
            &self,
            b: &mut ExpressionBuilder,
            expr: Option<&Expr>,
            level: usize,
            _flags: ConvertFlags,
        ) -> TranslateResult<Vec<SqlInfo>> {
            Err(b.not_implemented(self.id(), expr, level, "convert a statement to SQL"))
        }

        fn is_expression(
            &self,
            _b: &mut ExpressionBuilder,
            _expr: Option<&Expr>,
            _level: usize,
            _request: RequestFor,
        ) -> TranslateResult<bool> {
            Ok(false)
        }

        fn get_context(
            &self,
            b: &mut ExpressionBuilder,
            expr: Option<&Expr>,
            level: usize,
        ) -> TranslateResult<ContextId> {
            Err(b.not_implemented(self.id(), expr, level, "resolve a nested context"))
        }

        fn get_sub_query(&self, _b: &mut ExpressionBuilder) -> Option<crate::sql::SqlExpr> {
            None
        }

        fn complete_columns(&self, _b: &mut ExpressionBuilder) -> TranslateResult<()> {
            Ok(())
        }
    };
}

pub(super) use statement_context;

// ============================================================================
// UPDATE
// ============================================================================

pub struct UpdateContext {
    core: ContextCore,
    target: TargetTable,
    items: Vec<SetItem>,
    /// Scratch query collecting output columns, with its row accessor
    output: Option<(QueryId, ResultAccessor)>,
}

impl UpdateContext {
    pub fn build(
        b: &mut ExpressionBuilder,
        expr: &Expr,
        source: ContextId,
        setter: &Expr,
        output: Option<&Expr>,
    ) -> TranslateResult<ContextId> {
        let target = TargetTable::simple(b, source, "update a filtered or projected source")?;
        let items = setter_items(b, source, setter, &[source], &target.mapping, |c| c.skip_on_update)?;

        let output = match output {
            Some(selector) => {
                let scratch = b.new_query(SelectQuery::default());
                let entity = target.mapping.entity.clone();
                let deleted =
                    TableContext::build_output(b, selector, &entity, OutputRow::Deleted, scratch, None)?;
                let inserted =
                    TableContext::build_output(b, selector, &entity, OutputRow::Inserted, scratch, None)?;
                let accessor = b.with_lambda(selector, &[deleted, inserted], |b, body| {
                    b.build_accessor(body, scratch, false)
                })?;
                Some((scratch, accessor))
            }
            None => None,
        };

        let query = b.context(source).query_id();
        Ok(b.add_context(query, expr, None, |core| UpdateContext {
            core,
            target,
            items,
            output,
        }))
    }
}

impl BuildContext for UpdateContext {
    statement_context!("Update");

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        _enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        match (&self.output, expr) {
            (Some((_, accessor)), None) => Ok(accessor.clone()),
            _ => Err(b.not_implemented(self.id(), expr, level, "project an update without output")),
        }
    }

    fn create_statement(&self, b: &mut ExpressionBuilder) -> TranslateResult<SqlStatement> {
        let mut output = Vec::new();
        if let Some((scratch, _)) = &self.output {
            let query = b.query_mut(*scratch)?;
            for index in 0..query.columns.len() {
                let hint = match &query.columns[index].expr {
                    crate::sql::SqlExpr::OutputColumn { name, .. } => Some(name.clone()),
                    _ => None,
                };
                let alias = query.column_alias(index, hint.as_deref());
                output.push(OutputItem {
                    expr: query.columns[index].expr.clone(),
                    alias,
                });
            }
            b.freeze(*scratch);
        }
        let statement = SqlStatement::Update(UpdateStatement {
            table: self.target.table.clone(),
            alias: self.target.alias.clone(),
            items: self.items.clone(),
            where_: b.query(self.query_id()).where_.clone(),
            output,
        });
        b.finish_statement(statement)
    }

    fn returns_rows(&self) -> bool {
        self.output.is_some()
    }
}

// ============================================================================
// DELETE
// ============================================================================

pub struct DeleteContext {
    core: ContextCore,
    target: TargetTable,
}

impl DeleteContext {
    pub fn build(b: &mut ExpressionBuilder, expr: &Expr, source: ContextId) -> TranslateResult<ContextId> {
        let target = TargetTable::simple(b, source, "delete from a filtered or projected source")?;
        let query = b.context(source).query_id();
        Ok(b.add_context(query, expr, None, |core| DeleteContext { core, target }))
    }
}

impl BuildContext for DeleteContext {
    statement_context!("Delete");

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        _enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        Err(b.not_implemented(self.id(), expr, level, "project a delete"))
    }

    fn create_statement(&self, b: &mut ExpressionBuilder) -> TranslateResult<SqlStatement> {
        let statement = SqlStatement::Delete(DeleteStatement {
            table: self.target.table.clone(),
            alias: self.target.alias.clone(),
            where_: b.query(self.query_id()).where_.clone(),
        });
        b.finish_statement(statement)
    }

    fn returns_rows(&self) -> bool {
        false
    }
}

// ============================================================================
// INSERT
// ============================================================================

pub struct InsertContext {
    core: ContextCore,
    target: TargetTable,
    items: Vec<SetItem>,
    /// Query feeding `INSERT ... SELECT`
    source: Option<QueryId>,
}

impl InsertContext {
    /// Single-row insert of a parameterless setter
    pub fn build_values(
        b: &mut ExpressionBuilder,
        expr: &Expr,
        table: ContextId,
        setter: &Expr,
    ) -> TranslateResult<ContextId> {
        let target = TargetTable::of(b, table)
            .ok_or_else(|| b.not_implemented(table, None, 0, "insert into a non-table"))?;
        let items = setter_items(b, table, setter, &[], &target.mapping, |c| c.identity)?;
        let query = b.context(table).query_id();
        Ok(b.add_context(query, expr, None, |core| InsertContext {
            core,
            target,
            items,
            source: None,
        }))
    }

    /// `INSERT ... SELECT` with the setter evaluated over `source`
    pub fn build_from(
        b: &mut ExpressionBuilder,
        expr: &Expr,
        source: ContextId,
        table: ContextId,
        setter: &Expr,
    ) -> TranslateResult<ContextId> {
        let target = TargetTable::of(b, table)
            .ok_or_else(|| b.not_implemented(table, None, 0, "insert into a non-table"))?;
        let items = setter_items(b, source, setter, &[source], &target.mapping, |c| c.identity)?;
        let query = b.context(source).query_id();
        Ok(b.add_context(query, expr, None, |core| InsertContext {
            core,
            target,
            items,
            source: Some(query),
        }))
    }
}

impl BuildContext for InsertContext {
    statement_context!("Insert");

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        _enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        Err(b.not_implemented(self.id(), expr, level, "project an insert"))
    }

    fn create_statement(&self, b: &mut ExpressionBuilder) -> TranslateResult<SqlStatement> {
        let source = match self.source {
            Some(query) => {
                // column i feeds item i, so no deduplication here
                b.query_mut(query)?.columns = self
                    .items
                    .iter()
                    .map(|item| SelectColumn {
                        expr: item.value.clone(),
                        alias: None,
                    })
                    .collect();
                InsertSource::Query(Box::new(b.materialize(query)?))
            }
            None => InsertSource::Values,
        };
        let statement = SqlStatement::Insert(InsertStatement {
            table: self.target.table.clone(),
            items: self.items.clone(),
            source,
        });
        b.finish_statement(statement)
    }

    fn returns_rows(&self) -> bool {
        false
    }
}

// ============================================================================
// INSERT OR UPDATE
// ============================================================================

pub struct InsertOrUpdateContext {
    core: ContextCore,
    target: TargetTable,
    keys: Vec<String>,
    insert: Vec<SetItem>,
    update: Vec<SetItem>,
}

impl InsertOrUpdateContext {
    pub fn build(
        b: &mut ExpressionBuilder,
        expr: &Expr,
        table: ContextId,
        insert: &Expr,
        update: &Expr,
    ) -> TranslateResult<ContextId> {
        let target = TargetTable::of(b, table)
            .ok_or_else(|| b.not_implemented(table, None, 0, "upsert into a non-table"))?;
        let keys = target.primary_key()?;
        let insert = setter_items(b, table, insert, &[], &target.mapping, |c| c.identity)?;
        let update = setter_items(b, table, update, &[table], &target.mapping, |c| {
            c.skip_on_update || c.primary_key.is_some()
        })?;
        let query = b.context(table).query_id();
        Ok(b.add_context(query, expr, None, |core| InsertOrUpdateContext {
            core,
            target,
            keys,
            insert,
            update,
        }))
    }
}

impl BuildContext for InsertOrUpdateContext {
    statement_context!("InsertOrUpdate");

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        _enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        Err(b.not_implemented(self.id(), expr, level, "project an upsert"))
    }

    fn create_statement(&self, b: &mut ExpressionBuilder) -> TranslateResult<SqlStatement> {
        let statement = SqlStatement::InsertOrUpdate(InsertOrUpdateStatement {
            table: self.target.table.clone(),
            alias: self.target.alias.clone(),
            keys: self.keys.clone(),
            insert: self.insert.clone(),
            update: self.update.clone(),
        });
        b.finish_statement(statement)
    }

    fn returns_rows(&self) -> bool {
        false
    }
}
