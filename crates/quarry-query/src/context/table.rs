//! Leaf contexts that own concrete columns.

use super::{
    path_tail, BuildContext, ContextCore, ContextId, ConvertFlags, ExpressionBuilder, RequestFor,
    ResultAccessor, SqlInfo,
};
use crate::error::{TranslateError, TranslateResult};
use crate::expr::{Expr, ExprType, RowSet};
use crate::mapping::{ColumnMapping, ObjectName, TableMapping};
use crate::sql::{
    ColumnRef, OutputRow, QueryId, SelectQuery, SqlExpr, SqlSource, SqlTable, TableSource,
    ValuesTable,
};
use std::cell::{Cell, RefCell};

/// What a [`TableContext`] reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSourceKind {
    /// Mapped physical table
    Table,
    /// Literal rows rendered as a values source
    Rows,
    /// `INSERTED`/`DELETED` pseudo-row of an update output clause
    Output(OutputRow),
}

pub struct TableContext {
    core: ContextCore,
    source: TableSourceKind,
    mapping: TableMapping,
    alias: RefCell<String>,
    nullable: Cell<bool>,
}

impl TableContext {
    /// Context over all rows of a mapped entity, in a fresh query
    pub fn build_table(b: &mut ExpressionBuilder, expr: &Expr, entity: &str) -> TranslateResult<ContextId> {
        let mapping = b.table_mapping(entity)?;
        let alias = b.next_table_alias();
        let table = SqlTable {
            name: mapping.table.clone(),
            entity: mapping.entity.clone(),
        };
        let query = b.new_query(SelectQuery::from_source(TableSource::new(
            SqlSource::Table(table),
            alias.clone(),
        )));
        Ok(Self::register(b, query, expr, None, TableSourceKind::Table, mapping, alias))
    }

    /// Context over literal rows; members missing from the entity mapping
    /// take their type from the first row
    pub fn build_rows(b: &mut ExpressionBuilder, expr: &Expr, rows: &RowSet) -> TranslateResult<ContextId> {
        let known = b.schema().table(&rows.entity).cloned();
        let mut mapping = TableMapping::new(rows.entity.clone(), ObjectName::new(rows.entity.clone()));
        for (i, member) in rows.members.iter().enumerate() {
            let column = match known.as_ref().and_then(|t| t.column(member)) {
                Some(column) => column.clone(),
                None => {
                    let ty = rows
                        .rows
                        .first()
                        .and_then(|r| r.get(i))
                        .map(ExprType::of_value)
                        .unwrap_or_default();
                    ColumnMapping::new(member.clone(), ty).nullable()
                }
            };
            mapping = mapping.with_column(column);
        }

        let values = ValuesTable {
            columns: mapping.columns.iter().map(|c| c.column.clone()).collect(),
            rows: rows
                .rows
                .iter()
                .map(|r| r.iter().cloned().map(SqlExpr::Value).collect())
                .collect(),
        };
        let alias = b.next_table_alias();
        let query = b.new_query(SelectQuery::from_source(TableSource::new(
            SqlSource::Values(values),
            alias.clone(),
        )));
        Ok(Self::register(b, query, expr, None, TableSourceKind::Rows, mapping, alias))
    }

    /// Output pseudo-row of `entity` sharing `query`
    pub fn build_output(
        b: &mut ExpressionBuilder,
        expr: &Expr,
        entity: &str,
        row: OutputRow,
        query: QueryId,
        parent: Option<ContextId>,
    ) -> TranslateResult<ContextId> {
        let mapping = b.table_mapping(entity)?;
        let alias = match row {
            OutputRow::Inserted => "INSERTED",
            OutputRow::Deleted => "DELETED",
        };
        Ok(Self::register(
            b,
            query,
            expr,
            parent,
            TableSourceKind::Output(row),
            mapping,
            alias.to_string(),
        ))
    }

    fn register(
        b: &mut ExpressionBuilder,
        query: QueryId,
        expr: &Expr,
        parent: Option<ContextId>,
        source: TableSourceKind,
        mapping: TableMapping,
        alias: String,
    ) -> ContextId {
        b.add_context(query, expr, parent, |core| TableContext {
            core,
            source,
            mapping,
            alias: RefCell::new(alias),
            nullable: Cell::new(false),
        })
    }

    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    pub fn source_kind(&self) -> TableSourceKind {
        self.source
    }

    pub fn alias(&self) -> String {
        self.alias.borrow().clone()
    }

    pub fn sql_table(&self) -> SqlTable {
        SqlTable {
            name: self.mapping.table.clone(),
            entity: self.mapping.entity.clone(),
        }
    }

    /// Reference to a mapped column through this context's alias
    pub fn column_expr(&self, column: &ColumnMapping) -> SqlExpr {
        match self.source {
            TableSourceKind::Output(row) => SqlExpr::OutputColumn {
                row,
                name: column.column.clone(),
            },
            _ => SqlExpr::Column(ColumnRef {
                table: self.alias(),
                name: column.column.clone(),
                nullable: column.nullable || self.nullable.get(),
            }),
        }
    }

    fn member_column(&self, b: &ExpressionBuilder, member: &str) -> TranslateResult<&ColumnMapping> {
        self.mapping
            .column(member)
            .ok_or_else(|| TranslateError::UnknownMember {
                entity: self.mapping.entity.clone(),
                member: member.to_string(),
                context: b.context_path(self.id()),
            })
    }

    fn entity_columns(&self, flags: ConvertFlags) -> TranslateResult<Vec<&ColumnMapping>> {
        if flags != ConvertFlags::Key {
            return Ok(self.mapping.columns.iter().collect());
        }
        let keys = self.mapping.primary_key();
        if keys.is_empty() {
            return Err(TranslateError::MissingPrimaryKey {
                entity: self.mapping.entity.clone(),
            });
        }
        Ok(keys)
    }
}

fn rename_source(sources: &mut [TableSource], from: &str, to: &str) -> bool {
    for source in sources {
        if source.alias == from {
            source.alias = to.to_string();
            return true;
        }
        for join in &mut source.joins {
            if rename_source(std::slice::from_mut(&mut join.table), from, to) {
                return true;
            }
        }
    }
    false
}

impl BuildContext for TableContext {
    fn core(&self) -> &ContextCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        match self.source {
            TableSourceKind::Table => "Table",
            TableSourceKind::Rows => "Rows",
            TableSourceKind::Output(_) => "Output",
        }
    }

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        _enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        let infos = self.convert_to_index(b, expr, level, ConvertFlags::Field)?;
        let tail = path_tail(b, self.id(), expr, level)?;
        if !tail.is_empty() {
            let [info] = infos.as_slice() else {
                return Err(b.ambiguous(self.id(), expr.unwrap_or(self.expression()), infos.len()));
            };
            let ty = self
                .member_column(b, tail[0])
                .map(|c| c.ty.clone())
                .unwrap_or_default();
            return Ok(ResultAccessor::Column {
                index: info.index.unwrap_or_default(),
                ty,
            });
        }

        let members = infos
            .into_iter()
            .zip(&self.mapping.columns)
            .map(|(info, column)| {
                (
                    column.member.clone(),
                    ResultAccessor::Column {
                        index: info.index.unwrap_or_default(),
                        ty: column.ty.clone(),
                    },
                )
            })
            .collect();
        Ok(ResultAccessor::Object {
            type_name: Some(self.mapping.entity.clone()),
            members,
        })
    }

    fn convert_to_sql(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let tail = path_tail(b, self.id(), expr, level)?;
        match tail.as_slice() {
            [] => Ok(self
                .entity_columns(flags)?
                .into_iter()
                .map(|c| SqlInfo::new(self.column_expr(c)).with_member(c.member.clone()))
                .collect()),
            [member] => {
                let column = self.member_column(b, member)?;
                Ok(vec![
                    SqlInfo::new(self.column_expr(column)).with_member(column.member.clone())
                ])
            }
            _ => Err(b.not_implemented(self.id(), expr, level + 1, "resolve a nested member")),
        }
    }

    fn is_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        request: RequestFor,
    ) -> TranslateResult<bool> {
        let tail = path_tail(b, self.id(), expr, level)?;
        Ok(match tail.len() {
            0 => matches!(request, RequestFor::Table | RequestFor::Object),
            1 => matches!(request, RequestFor::Expression | RequestFor::Field),
            _ => false,
        })
    }

    fn get_context(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
    ) -> TranslateResult<ContextId> {
        let tail = path_tail(b, self.id(), expr, level)?;
        if tail.is_empty() {
            Ok(self.id())
        } else {
            Err(b.not_implemented(self.id(), expr, level, "enter a member as a sequence"))
        }
    }

    fn set_alias(&self, b: &mut ExpressionBuilder, alias: &str) -> TranslateResult<()> {
        if matches!(self.source, TableSourceKind::Output(_)) {
            return Ok(());
        }
        let current = self.alias();
        let query = b.query_mut(self.query_id())?;
        rename_source(&mut query.from, &current, alias);
        *self.alias.borrow_mut() = alias.to_string();
        Ok(())
    }

    fn as_table(&self) -> Option<&TableContext> {
        Some(self)
    }

    fn set_nullable(&self) {
        self.nullable.set(true);
    }
}
