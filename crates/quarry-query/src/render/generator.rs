//! Shared rendering algorithm.
//!
//! [`SqlGenerator`] walks a frozen statement once, appending text and
//! collecting parameters in order of first appearance. Dialects influence
//! the output only through their [`DialectCapabilities`] and hook sets, so
//! the same statement always renders to the same text for one dialect.

use super::capabilities::{DialectCapabilities, LimitStyle, OutputStyle, ParameterStyle, UpsertStyle};
use super::dialect::Dialect;
use super::{QueryParameter, RenderedQuery};
use crate::error::{RenderError, RenderResult};
use crate::mapping::ObjectName;
use crate::sql::{
    ColumnRef, DeleteStatement, InsertOrUpdateStatement, InsertSource, InsertStatement,
    MergeOperationClause, MergeStatement, OutputItem, OutputRow, Precedence, QueryRef,
    SelectColumn, SelectQuery, SetItem, SqlBinaryOp, SqlExpr, SqlFunction, SqlParameter,
    SqlSource, SqlStatement, SqlUnaryOp, SqlValue, TableSource, UpdateStatement, ValuesTable,
};

/// Identifiers that are always quoted
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "BY", "CASE", "CROSS", "DELETE", "DISTINCT", "FROM", "GROUP", "HAVING",
    "IN", "INNER", "INSERT", "INTO", "JOIN", "KEY", "LEFT", "LIMIT", "MERGE", "NOT", "NULL",
    "OFFSET", "ON", "OR", "ORDER", "SELECT", "SET", "TABLE", "UNION", "UPDATE", "USER", "USING",
    "VALUES", "WHEN", "WHERE",
];

fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => true,
    };
    !plain || RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Append-only text buffer plus parameter list for one render call
pub struct SqlGenerator {
    dialect: &'static Dialect,
    inline_parameters: bool,
    sql: String,
    params: Vec<QueryParameter>,
    /// Source name of each entry in `params`, before collision renaming
    bound_names: Vec<String>,
    /// Nesting depth of subqueries; clauses break lines only at depth 0
    depth: usize,
    /// Columns of the first alias are written qualified with the second
    requalify: Option<(String, String)>,
    /// Qualifier for new values in a RETURNING clause
    returning_alias: Option<String>,
}

impl SqlGenerator {
    pub fn new(dialect: &'static Dialect, inline_parameters: bool) -> Self {
        Self {
            dialect,
            inline_parameters,
            sql: String::new(),
            params: Vec::new(),
            bound_names: Vec::new(),
            depth: 0,
            requalify: None,
            returning_alias: None,
        }
    }

    pub fn finish(self) -> RenderedQuery {
        RenderedQuery {
            sql: self.sql,
            params: self.params,
        }
    }

    pub fn capabilities(&self) -> &'static DialectCapabilities {
        &self.dialect.capabilities
    }

    pub fn unsupported(&self, feature: &str) -> RenderError {
        RenderError::Unsupported {
            feature: feature.to_string(),
            dialect: self.dialect.name().to_string(),
        }
    }

    fn invalid_operation(&self, operation: &MergeOperationClause) -> RenderError {
        RenderError::InvalidMergeOperationCombination {
            operation: operation.name().to_string(),
            dialect: self.dialect.name().to_string(),
        }
    }

    // ========================================================================
    // Text
    // ========================================================================

    pub fn write(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Start a clause: a new line at the top level, a space when nested
    pub fn clause(&mut self, keyword: &str) {
        if !self.sql.is_empty() && !self.sql.ends_with('(') {
            self.sql.push(if self.depth == 0 { '\n' } else { ' ' });
        }
        self.sql.push_str(keyword);
    }

    pub fn identifier(&mut self, name: &str) {
        if !needs_quotes(name) {
            self.sql.push_str(name);
            return;
        }
        let (open, close) = self.capabilities().identifier_quotes;
        self.sql.push(open);
        for ch in name.chars() {
            if ch == close {
                self.sql.push(close);
            }
            self.sql.push(ch);
        }
        self.sql.push(close);
    }

    pub fn object_name(&mut self, name: &ObjectName) {
        for (i, part) in name.parts().into_iter().enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            self.identifier(part);
        }
    }

    pub fn table_alias(&mut self, alias: &str) {
        if alias.is_empty() {
            return;
        }
        self.write(if self.capabilities().table_alias_keyword {
            " AS "
        } else {
            " "
        });
        self.identifier(alias);
    }

    fn list<T>(
        &mut self,
        items: &[T],
        mut each: impl FnMut(&mut Self, &T) -> RenderResult<()>,
    ) -> RenderResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            each(self, item)?;
        }
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn expr(&mut self, expr: &SqlExpr) -> RenderResult<()> {
        match expr {
            SqlExpr::Value(value) => {
                self.value(value);
                Ok(())
            }
            SqlExpr::Parameter(param) => {
                self.parameter(param);
                Ok(())
            }
            SqlExpr::Column(column) => {
                self.column(column);
                Ok(())
            }
            SqlExpr::OutputColumn { row, name } => self.output_column(*row, name),
            SqlExpr::Unary { op, operand } => match op {
                SqlUnaryOp::Not => {
                    self.write("NOT ");
                    self.predicate_operand(operand, Precedence::LOGICAL_NEGATION)
                }
                SqlUnaryOp::Negate => {
                    self.write("-");
                    self.operand(operand, Precedence::UNARY, true)
                }
                SqlUnaryOp::IsNull | SqlUnaryOp::IsNotNull => {
                    self.operand(operand, Precedence::COMPARISON, true)?;
                    self.write(if *op == SqlUnaryOp::IsNull {
                        " IS NULL"
                    } else {
                        " IS NOT NULL"
                    });
                    Ok(())
                }
            },
            SqlExpr::Binary { left, op, right } => self.binary(left, *op, right),
            SqlExpr::Function(function) => self.function(function),
            SqlExpr::SubQuery(query) => self.subquery(query),
            SqlExpr::Exists(query) => {
                self.write("EXISTS");
                self.subquery(query)
            }
            SqlExpr::In { expr, query } => {
                self.operand(expr, Precedence::COMPARISON, true)?;
                self.write(" IN ");
                self.subquery(query)
            }
        }
    }

    /// `expr`, parenthesized when it binds looser than its parent operator
    fn operand(&mut self, expr: &SqlExpr, parent: i32, wrap_equal: bool) -> RenderResult<()> {
        let precedence = expr.precedence();
        if precedence < parent || (wrap_equal && precedence == parent) {
            self.write("(");
            self.expr(expr)?;
            self.write(")");
            Ok(())
        } else {
            self.expr(expr)
        }
    }

    /// Operand of AND/OR/NOT
    fn predicate_operand(&mut self, expr: &SqlExpr, parent: i32) -> RenderResult<()> {
        if self.capabilities().boolean_literals || expr.is_predicate() {
            return self.operand(expr, parent, false);
        }
        // `x = 1` binds tighter than any logical operator
        self.condition(expr)
    }

    fn binary(&mut self, left: &SqlExpr, op: SqlBinaryOp, right: &SqlExpr) -> RenderResult<()> {
        let precedence = op.precedence();
        if matches!(op, SqlBinaryOp::And | SqlBinaryOp::Or) {
            self.predicate_operand(left, precedence)?;
            self.write(" ");
            self.write(op.symbol());
            self.write(" ");
            return self.predicate_operand(right, precedence);
        }

        let comparison = op.is_predicate();
        let ordered = comparison
            || matches!(
                op,
                SqlBinaryOp::Subtract | SqlBinaryOp::Divide | SqlBinaryOp::Modulo
            );
        self.operand(left, precedence, comparison)?;
        self.write(" ");
        self.write(match op {
            SqlBinaryOp::Concat => self.capabilities().concat_operator,
            _ => op.symbol(),
        });
        self.write(" ");
        self.operand(right, precedence, ordered)
    }

    /// Search condition of WHERE, HAVING, ON and merge branches
    pub fn condition(&mut self, expr: &SqlExpr) -> RenderResult<()> {
        if self.capabilities().boolean_literals || expr.is_predicate() {
            return self.expr(expr);
        }
        match expr {
            SqlExpr::Value(SqlValue::Bool(true)) => {
                self.write("1 = 1");
                Ok(())
            }
            SqlExpr::Value(SqlValue::Bool(false)) => {
                self.write("1 = 0");
                Ok(())
            }
            _ => {
                self.operand(expr, Precedence::COMPARISON, true)?;
                self.write(" = 1");
                Ok(())
            }
        }
    }

    pub fn value(&mut self, value: &SqlValue) {
        match value {
            SqlValue::Null => self.write("NULL"),
            SqlValue::Bool(b) => {
                let text = match (self.capabilities().boolean_literals, b) {
                    (true, true) => "TRUE",
                    (true, false) => "FALSE",
                    (false, true) => "1",
                    (false, false) => "0",
                };
                self.write(text);
            }
            SqlValue::Int(i) => self.write(&i.to_string()),
            SqlValue::Float(x) => self.write(&x.to_string()),
            SqlValue::Text(s) => {
                self.sql.push('\'');
                self.sql.push_str(&s.replace('\'', "''"));
                self.sql.push('\'');
            }
        }
    }

    fn parameter(&mut self, param: &SqlParameter) {
        if param.inline || self.inline_parameters {
            self.value(&param.value);
            return;
        }
        let style = self.capabilities().parameter_style;
        // a named placeholder is reused only when it binds the same value
        let existing = match style {
            ParameterStyle::Positional => None,
            _ => self
                .bound_names
                .iter()
                .zip(&self.params)
                .position(|(name, bound)| *name == param.name && bound.value == param.value),
        };
        let index = match existing {
            Some(index) => index,
            None => {
                let name = match style {
                    ParameterStyle::Positional => param.name.clone(),
                    _ => self.binding_name(&param.name),
                };
                self.params.push(QueryParameter {
                    name,
                    value: param.value.clone(),
                });
                self.bound_names.push(param.name.clone());
                self.params.len() - 1
            }
        };
        match style {
            ParameterStyle::Positional => self.write("?"),
            ParameterStyle::Named(prefix) => {
                self.sql.push(prefix);
                let name = self.params[index].name.clone();
                self.sql.push_str(&name);
            }
            ParameterStyle::Numbered => self.write(&format!("${}", index + 1)),
        }
    }

    /// First of `name`, `name_1`, `name_2`, ... not yet bound
    fn binding_name(&self, name: &str) -> String {
        let taken = |candidate: &str| self.params.iter().any(|p| p.name == candidate);
        if !taken(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| format!("{name}_{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn column(&mut self, column: &ColumnRef) {
        let table = match &self.requalify {
            Some((from, to)) if *from == column.table => to.clone(),
            _ => column.table.clone(),
        };
        if !table.is_empty() {
            self.identifier(&table);
            self.write(".");
        }
        self.identifier(&column.name);
    }

    fn output_column(&mut self, row: OutputRow, name: &str) -> RenderResult<()> {
        match (self.capabilities().output_style, row) {
            (OutputStyle::Output, OutputRow::Inserted) => self.write("INSERTED."),
            (OutputStyle::Output, OutputRow::Deleted) => self.write("DELETED."),
            (OutputStyle::Returning, OutputRow::Inserted) => {
                if let Some(alias) = self.returning_alias.clone() {
                    self.identifier(&alias);
                    self.write(".");
                }
            }
            (OutputStyle::Returning, OutputRow::Deleted) => {
                return Err(self.unsupported("old values in RETURNING"));
            }
            (OutputStyle::Unsupported, _) => return Err(self.unsupported("UPDATE output")),
        }
        self.identifier(name);
        Ok(())
    }

    fn function(&mut self, function: &SqlFunction) -> RenderResult<()> {
        self.write(&function.name.to_string());
        self.write("(");
        if function.args.is_empty() && function.is_aggregate {
            self.write("*");
        } else {
            self.list(&function.args, |g, arg| g.expr(arg))?;
        }
        self.write(")");
        if function.is_window_function {
            self.write(" OVER ()");
        }
        Ok(())
    }

    pub fn subquery(&mut self, query: &QueryRef) -> RenderResult<()> {
        match query {
            QueryRef::Pending(id) => Err(RenderError::UnresolvedSubQuery(id.0)),
            QueryRef::Resolved(query) => {
                self.write("(");
                self.depth += 1;
                let result = self.select(query);
                self.depth -= 1;
                result?;
                self.write(")");
                Ok(())
            }
        }
    }

    // ========================================================================
    // SELECT
    // ========================================================================

    pub fn select(&mut self, query: &SelectQuery) -> RenderResult<()> {
        let caps = self.capabilities();
        let top = caps.limit_style == LimitStyle::Top && query.skip.is_none();

        self.clause("SELECT");
        if query.distinct {
            self.write(" DISTINCT");
        }
        if let (true, Some(take)) = (top, &query.take) {
            self.write(" TOP (");
            self.expr(take)?;
            self.write(")");
        }
        self.write(" ");
        if query.columns.is_empty() {
            self.write("1");
        }
        self.list(&query.columns, |g, column| g.select_column(column))?;

        if query.from.is_empty() {
            if let Some(fake) = caps.fake_table_name() {
                self.clause("FROM ");
                self.write(&fake);
            }
        } else {
            self.clause("FROM ");
            self.list(&query.from, |g, source| g.table_source(source))?;
        }
        if let Some(filter) = &query.where_ {
            self.clause("WHERE ");
            self.condition(filter)?;
        }
        if !query.group_by.is_empty() {
            self.clause("GROUP BY ");
            self.list(&query.group_by, |g, key| g.expr(key))?;
        }
        if let Some(having) = &query.having {
            self.clause("HAVING ");
            self.condition(having)?;
        }
        if !query.order_by.is_empty() {
            self.clause("ORDER BY ");
            self.list(&query.order_by, |g, item| {
                g.expr(&item.expr)?;
                if item.descending {
                    g.write(" DESC");
                }
                Ok(())
            })?;
        } else if caps.limit_style == LimitStyle::Top && query.skip.is_some() {
            // OFFSET needs an ORDER BY
            self.clause("ORDER BY (SELECT NULL)");
        }
        self.paging(query, top)
    }

    fn paging(&mut self, query: &SelectQuery, top: bool) -> RenderResult<()> {
        let caps = self.capabilities();
        match caps.limit_style {
            LimitStyle::LimitOffset => {
                if let Some(take) = &query.take {
                    self.clause("LIMIT ");
                    self.expr(take)?;
                } else if query.skip.is_some() && caps.offset_requires_limit {
                    self.clause("LIMIT -1");
                }
                if let Some(skip) = &query.skip {
                    self.clause("OFFSET ");
                    self.expr(skip)?;
                }
            }
            LimitStyle::Top if top => {}
            LimitStyle::OffsetFetch | LimitStyle::Top => {
                if let Some(skip) = &query.skip {
                    self.clause("OFFSET ");
                    self.expr(skip)?;
                    self.write(" ROWS");
                }
                if let Some(take) = &query.take {
                    self.clause("FETCH NEXT ");
                    self.expr(take)?;
                    self.write(" ROWS ONLY");
                }
            }
        }
        Ok(())
    }

    fn select_column(&mut self, column: &SelectColumn) -> RenderResult<()> {
        if !self.capabilities().boolean_literals && column.expr.is_predicate() {
            self.write("CASE WHEN ");
            self.condition(&column.expr)?;
            self.write(" THEN 1 ELSE 0 END");
        } else {
            self.expr(&column.expr)?;
        }
        match (&column.alias, &column.expr) {
            (Some(alias), SqlExpr::Column(c)) if c.name == *alias => {}
            (Some(alias), _) => {
                self.write(" AS ");
                self.identifier(alias);
            }
            (None, _) => {}
        }
        Ok(())
    }

    pub fn table_source(&mut self, source: &TableSource) -> RenderResult<()> {
        match &source.source {
            SqlSource::Table(table) => {
                self.object_name(&table.name);
                self.table_alias(&source.alias);
            }
            SqlSource::SubQuery(query) => {
                self.subquery(query)?;
                self.table_alias(&source.alias);
            }
            SqlSource::Values(values) => self.values_source(values, &source.alias)?,
        }
        for join in &source.joins {
            self.clause(join.kind.keyword());
            self.write(" ");
            self.table_source(&join.table)?;
            if let Some(condition) = &join.condition {
                self.write(" ON ");
                self.condition(condition)?;
            }
        }
        Ok(())
    }

    /// Literal rows as `VALUES` with an alias list, or as a UNION ALL of
    /// single-row selects against the fake table
    fn values_source(&mut self, values: &ValuesTable, alias: &str) -> RenderResult<()> {
        let caps = self.capabilities();
        if caps.renders_values() && !values.rows.is_empty() {
            self.write("(VALUES ");
            self.list(&values.rows, |g, row| {
                g.write("(");
                g.list(row, |g, value| g.expr(value))?;
                g.write(")");
                Ok(())
            })?;
            self.write(")");
            self.table_alias(alias);
            self.write(" (");
            self.list(&values.columns, |g, column| {
                g.identifier(column);
                Ok(())
            })?;
            self.write(")");
            return Ok(());
        }

        let empty = values.rows.is_empty();
        let null_row = vec![SqlExpr::Value(SqlValue::Null); values.columns.len()];
        let rows = if empty {
            std::slice::from_ref(&null_row)
        } else {
            values.rows.as_slice()
        };
        let fake = caps.fake_table_name();

        self.write("(");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                self.write(" UNION ALL ");
            }
            self.write("SELECT ");
            if row.is_empty() {
                self.write("1");
            }
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    self.write(", ");
                }
                self.expr(value)?;
                // the first row names the columns
                if let (0, Some(column)) = (i, values.columns.get(j)) {
                    self.write(" AS ");
                    self.identifier(column);
                }
            }
            if let Some(fake) = &fake {
                self.write(" FROM ");
                self.write(fake);
            }
        }
        if empty {
            self.write(" WHERE 1 = 0");
        }
        self.write(")");
        self.table_alias(alias);
        Ok(())
    }

    // ========================================================================
    // Modification
    // ========================================================================

    pub fn set_items(&mut self, items: &[SetItem]) -> RenderResult<()> {
        self.list(items, |g, item| {
            g.identifier(&item.column);
            g.write(" = ");
            g.expr(&item.value)
        })
    }

    /// `(a, b) VALUES (x, y)`
    pub fn insert_columns_values(&mut self, items: &[SetItem]) -> RenderResult<()> {
        self.insert_columns(items);
        self.write(" VALUES (");
        self.list(items, |g, item| g.expr(&item.value))?;
        self.write(")");
        Ok(())
    }

    fn insert_columns(&mut self, items: &[SetItem]) {
        self.write("(");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.identifier(&item.column);
        }
        self.write(")");
    }

    /// `expr AS alias, ...` of an output clause
    pub fn output_items(&mut self, items: &[OutputItem], alias: &str) -> RenderResult<()> {
        self.returning_alias = Some(alias.to_string()).filter(|a| !a.is_empty());
        let result = self.list(items, |g, item| {
            g.expr(&item.expr)?;
            g.write(" AS ");
            g.identifier(&item.alias);
            Ok(())
        });
        self.returning_alias = None;
        result
    }

    fn insert(&mut self, insert: &InsertStatement) -> RenderResult<()> {
        self.write("INSERT INTO ");
        self.object_name(&insert.table.name);
        match &insert.source {
            InsertSource::Values if insert.items.is_empty() => {
                self.write(" DEFAULT VALUES");
                Ok(())
            }
            InsertSource::Values => {
                self.write(" ");
                self.insert_columns(&insert.items);
                self.clause("VALUES (");
                self.list(&insert.items, |g, item| g.expr(&item.value))?;
                self.write(")");
                Ok(())
            }
            InsertSource::Query(query) => {
                self.write(" ");
                self.insert_columns(&insert.items);
                self.select(query)
            }
        }
    }

    fn insert_or_update(&mut self, upsert: &InsertOrUpdateStatement) -> RenderResult<()> {
        if self.capabilities().upsert_style == UpsertStyle::Merge {
            return self.merge(&upsert.to_merge());
        }

        self.write("INSERT INTO ");
        self.object_name(&upsert.table.name);
        self.write(" ");
        self.insert_columns(&upsert.insert);
        self.clause("VALUES (");
        self.list(&upsert.insert, |g, item| g.expr(&item.value))?;
        self.write(")");
        self.clause("ON CONFLICT (");
        self.list(&upsert.keys, |g, key| {
            g.identifier(key);
            Ok(())
        })?;
        self.write(")");
        if upsert.update.is_empty() {
            self.write(" DO NOTHING");
            return Ok(());
        }
        self.write(" DO UPDATE SET ");
        // the existing row is visible under the table name only
        self.requalify = Some((upsert.alias.clone(), upsert.table.name.name.clone()));
        let result = self.set_items(&upsert.update);
        self.requalify = None;
        result
    }

    // ========================================================================
    // MERGE
    // ========================================================================

    /// Reject operation sets the dialect cannot express, before any text
    fn validate_merge(&self, merge: &MergeStatement) -> RenderResult<()> {
        let caps = self.capabilities();
        if !caps.merge_supported {
            return Err(self.unsupported("MERGE"));
        }
        if let SqlSource::Values(values) = &merge.source.source {
            if values.rows.is_empty() && !caps.empty_values_source_supported {
                return Err(RenderError::EmptyMergeSource {
                    dialect: self.dialect.name().to_string(),
                });
            }
        }

        for operation in &merge.operations {
            let allowed = match operation {
                MergeOperationClause::UpdateWithDelete { .. } => {
                    caps.merge_update_with_delete_supported
                }
                MergeOperationClause::Delete { .. } => caps.merge_delete_supported,
                _ => true,
            };
            if !allowed {
                return Err(self.invalid_operation(operation));
            }
        }
        Ok(())
    }

    fn merge(&mut self, merge: &MergeStatement) -> RenderResult<()> {
        self.validate_merge(merge)?;
        let hooks = self.dialect.merge;

        (hooks.build_merge_into)(self, merge)?;
        self.clause("USING ");
        self.table_source(&merge.source)?;
        self.clause("ON (");
        self.condition(&merge.on)?;
        self.write(")");

        for operation in &merge.operations {
            match operation {
                MergeOperationClause::Insert { items, where_ } => {
                    (hooks.build_merge_operation_insert)(self, items, where_.as_ref())?
                }
                MergeOperationClause::Update { items, where_ } => {
                    (hooks.build_merge_operation_update)(self, items, where_.as_ref())?
                }
                MergeOperationClause::UpdateWithDelete {
                    items,
                    where_,
                    where_delete,
                } => (hooks.build_merge_operation_update_with_delete)(
                    self,
                    items,
                    where_.as_ref(),
                    where_delete.as_ref(),
                )?,
                MergeOperationClause::Delete { where_ } => {
                    (hooks.build_merge_operation_delete)(self, where_.as_ref())?
                }
            }
        }
        if self.capabilities().merge_terminator_required {
            self.write(";");
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub fn statement(&mut self, statement: &SqlStatement) -> RenderResult<()> {
        match statement {
            SqlStatement::Select(query) => self.select(query),
            SqlStatement::Insert(insert) => self.insert(insert),
            SqlStatement::Update(update) => (self.dialect.modify.build_update)(self, update),
            SqlStatement::Delete(delete) => (self.dialect.modify.build_delete)(self, delete),
            SqlStatement::Merge(merge) => self.merge(merge),
            SqlStatement::InsertOrUpdate(upsert) => self.insert_or_update(upsert),
        }
    }
}

// ============================================================================
// Standard hooks
// ============================================================================

pub fn merge_into(g: &mut SqlGenerator, merge: &MergeStatement) -> RenderResult<()> {
    if merge.hint.is_some() {
        return Err(g.unsupported("MERGE hints"));
    }
    g.write("MERGE INTO ");
    g.object_name(&merge.target.name);
    g.table_alias(MergeStatement::TARGET_ALIAS);
    Ok(())
}

fn when(g: &mut SqlGenerator, branch: &str, filter: Option<&SqlExpr>) -> RenderResult<()> {
    g.clause(branch);
    if let Some(filter) = filter {
        g.write(" AND ");
        g.condition(filter)?;
    }
    g.write(" THEN");
    Ok(())
}

pub fn merge_operation_insert(
    g: &mut SqlGenerator,
    items: &[SetItem],
    filter: Option<&SqlExpr>,
) -> RenderResult<()> {
    when(g, "WHEN NOT MATCHED", filter)?;
    g.write(" INSERT ");
    g.insert_columns_values(items)
}

pub fn merge_operation_update(
    g: &mut SqlGenerator,
    items: &[SetItem],
    filter: Option<&SqlExpr>,
) -> RenderResult<()> {
    when(g, "WHEN MATCHED", filter)?;
    g.write(" UPDATE SET ");
    g.set_items(items)
}

/// No standard form exists; dialects that support the combination override it
pub fn merge_operation_update_with_delete(
    g: &mut SqlGenerator,
    items: &[SetItem],
    filter: Option<&SqlExpr>,
    _delete: Option<&SqlExpr>,
) -> RenderResult<()> {
    Err(g.invalid_operation(&MergeOperationClause::UpdateWithDelete {
        items: items.to_vec(),
        where_: filter.cloned(),
        where_delete: None,
    }))
}

pub fn merge_operation_delete(g: &mut SqlGenerator, filter: Option<&SqlExpr>) -> RenderResult<()> {
    when(g, "WHEN MATCHED", filter)?;
    g.write(" DELETE");
    Ok(())
}

pub fn update(g: &mut SqlGenerator, update: &UpdateStatement) -> RenderResult<()> {
    g.write("UPDATE ");
    g.object_name(&update.table.name);
    g.table_alias(&update.alias);
    g.clause("SET ");
    g.set_items(&update.items)?;
    if let Some(filter) = &update.where_ {
        g.clause("WHERE ");
        g.condition(filter)?;
    }
    if update.output.is_empty() {
        return Ok(());
    }
    match g.capabilities().output_style {
        OutputStyle::Returning => {
            g.clause("RETURNING ");
            g.output_items(&update.output, &update.alias)
        }
        _ => Err(g.unsupported("UPDATE output")),
    }
}

pub fn delete(g: &mut SqlGenerator, delete: &DeleteStatement) -> RenderResult<()> {
    g.write("DELETE FROM ");
    g.object_name(&delete.table.name);
    g.table_alias(&delete.alias);
    if let Some(filter) = &delete.where_ {
        g.clause("WHERE ");
        g.condition(filter)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{JoinKind, JoinedTable, OrderItem, SqlTable};
    use quarry_config::DialectKind;

    fn render(kind: DialectKind, statement: &SqlStatement) -> RenderResult<RenderedQuery> {
        let mut g = SqlGenerator::new(Dialect::of(kind), false);
        g.statement(statement)?;
        Ok(g.finish())
    }

    fn people() -> SqlSource {
        SqlSource::Table(SqlTable {
            name: ObjectName::new("people"),
            entity: "Person".to_string(),
        })
    }

    fn select(columns: Vec<SqlExpr>) -> SelectQuery {
        let mut query = SelectQuery::from_source(TableSource::new(people(), "t1"));
        for column in columns {
            query.add_column(column);
        }
        query
    }

    fn param(name: &str, value: i64) -> SqlExpr {
        SqlExpr::Parameter(SqlParameter {
            name: name.to_string(),
            value: SqlValue::Int(value),
            inline: false,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    #[test]
    fn test_precedence_parenthesizes_looser_operands() {
        let a = SqlExpr::column("t1", "a");
        let b = SqlExpr::column("t1", "b");
        let sum = SqlExpr::binary(a.clone(), SqlBinaryOp::Add, b.clone());
        let expr = SqlExpr::binary(sum, SqlBinaryOp::Multiply, SqlExpr::Value(SqlValue::Int(2)));
        let diff = SqlExpr::binary(
            a.clone(),
            SqlBinaryOp::Subtract,
            SqlExpr::binary(b, SqlBinaryOp::Subtract, a),
        );

        let mut g = SqlGenerator::new(Dialect::of(DialectKind::Ansi), false);
        g.expr(&expr).unwrap();
        g.write(" | ");
        g.expr(&diff).unwrap();
        assert_eq!(g.finish().sql, "(t1.a + t1.b) * 2 | t1.a - (t1.b - t1.a)");
    }

    #[test]
    fn test_or_inside_and_is_wrapped() {
        let x = SqlExpr::column("t1", "x");
        let cmp = |v: i64| {
            SqlExpr::binary(x.clone(), SqlBinaryOp::Equal, SqlExpr::Value(SqlValue::Int(v)))
        };
        let expr = cmp(1).or(cmp(2)).and(cmp(3));

        let mut g = SqlGenerator::new(Dialect::of(DialectKind::Ansi), false);
        g.condition(&expr).unwrap();
        assert_eq!(g.finish().sql, "(t1.x = 1 OR t1.x = 2) AND t1.x = 3");
    }

    #[test]
    fn test_text_literal_escaping() {
        let mut g = SqlGenerator::new(Dialect::of(DialectKind::Ansi), false);
        g.value(&SqlValue::Text("O'Brien".to_string()));
        assert_eq!(g.finish().sql, "'O''Brien'");
    }

    #[test]
    fn test_reserved_identifiers_are_quoted() {
        let mut g = SqlGenerator::new(Dialect::of(DialectKind::SqlServer), false);
        g.identifier("order");
        g.write(" ");
        g.identifier("first name");
        g.write(" ");
        g.identifier("plain_name");
        assert_eq!(g.finish().sql, "[order] [first name] plain_name");
    }

    #[test]
    fn test_boolean_condition_without_literals() {
        let flag = SqlExpr::Column(ColumnRef {
            table: "t1".to_string(),
            name: "active".to_string(),
            nullable: false,
        });
        let mut g = SqlGenerator::new(Dialect::of(DialectKind::Oracle), false);
        g.condition(&flag.and(SqlExpr::Value(SqlValue::Bool(true))))
            .unwrap();
        assert_eq!(g.finish().sql, "t1.active = 1 AND 1 = 1");
    }

    #[test]
    fn test_pending_subquery_is_rejected() {
        let expr = SqlExpr::Exists(QueryRef::Pending(crate::sql::QueryId(4)));
        let mut g = SqlGenerator::new(Dialect::of(DialectKind::Ansi), false);
        assert_eq!(g.expr(&expr), Err(RenderError::UnresolvedSubQuery(4)));
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    #[test]
    fn test_numbered_parameters_reuse_positions() {
        let mut query = select(vec![SqlExpr::column("t1", "name")]);
        query.add_where(SqlExpr::binary(
            SqlExpr::column("t1", "id"),
            SqlBinaryOp::Greater,
            param("low", 3),
        ));
        query.add_where(SqlExpr::binary(
            SqlExpr::column("t1", "age"),
            SqlBinaryOp::Greater,
            param("low", 3),
        ));
        let rendered = render(DialectKind::PostgreSql, &SqlStatement::Select(query)).unwrap();

        assert_eq!(
            rendered.sql,
            "SELECT t1.name\nFROM people AS t1\nWHERE t1.id > $1 AND t1.age > $1"
        );
        assert_eq!(rendered.params.len(), 1);
    }

    #[test]
    fn test_positional_parameters_repeat() {
        let mut query = select(vec![SqlExpr::column("t1", "name")]);
        query.add_where(SqlExpr::binary(param("p", 1), SqlBinaryOp::Equal, param("p", 1)));
        let rendered = render(DialectKind::Ansi, &SqlStatement::Select(query)).unwrap();

        assert!(rendered.sql.ends_with("WHERE ? = ?"));
        assert_eq!(rendered.params.len(), 2);
    }

    // ========================================================================
    // SELECT
    // ========================================================================

    #[test]
    fn test_join_and_order() {
        let mut query = select(vec![SqlExpr::column("t1", "name"), SqlExpr::column("t2", "title")]);
        query.from[0].joins.push(JoinedTable {
            kind: JoinKind::Left,
            table: TableSource::new(people(), "t2"),
            condition: Some(SqlExpr::binary(
                SqlExpr::column("t2", "id"),
                SqlBinaryOp::Equal,
                SqlExpr::column("t1", "id"),
            )),
        });
        query.order_by.push(OrderItem {
            expr: SqlExpr::column("t1", "name"),
            descending: true,
        });
        let rendered = render(DialectKind::Sqlite, &SqlStatement::Select(query)).unwrap();

        assert_eq!(
            rendered.sql,
            "SELECT t1.name, t2.title\nFROM people AS t1\nLEFT JOIN people AS t2 ON t2.id = t1.id\nORDER BY t1.name DESC"
        );
    }

    #[test]
    fn test_top_without_skip() {
        let mut query = select(vec![SqlExpr::column("t1", "name")]);
        query.take = Some(SqlExpr::Value(SqlValue::Int(5)));
        let rendered = render(DialectKind::SqlServer, &SqlStatement::Select(query)).unwrap();

        assert_eq!(rendered.sql, "SELECT TOP (5) t1.name\nFROM people AS t1");
    }

    #[test]
    fn test_skip_without_order_on_top_dialect() {
        let mut query = select(vec![SqlExpr::column("t1", "name")]);
        query.skip = Some(SqlExpr::Value(SqlValue::Int(10)));
        let rendered = render(DialectKind::SqlServer, &SqlStatement::Select(query)).unwrap();

        assert_eq!(
            rendered.sql,
            "SELECT t1.name\nFROM people AS t1\nORDER BY (SELECT NULL)\nOFFSET 10 ROWS"
        );
    }

    #[test]
    fn test_sqlite_offset_needs_limit() {
        let mut query = select(vec![SqlExpr::column("t1", "name")]);
        query.skip = Some(SqlExpr::Value(SqlValue::Int(10)));
        let rendered = render(DialectKind::Sqlite, &SqlStatement::Select(query)).unwrap();

        assert!(rendered.sql.ends_with("LIMIT -1\nOFFSET 10"));
    }

    #[test]
    fn test_scalar_select_uses_fake_table() {
        let mut query = SelectQuery::default();
        query.ensure_column();

        let oracle = render(DialectKind::Oracle, &SqlStatement::Select(query.clone())).unwrap();
        let postgres = render(DialectKind::PostgreSql, &SqlStatement::Select(query)).unwrap();
        assert_eq!(oracle.sql, "SELECT 1\nFROM sys.dual");
        assert_eq!(postgres.sql, "SELECT 1");
    }

    #[test]
    fn test_values_source_alias_list() {
        let values = ValuesTable {
            columns: vec!["id".to_string()],
            rows: vec![
                vec![SqlExpr::Value(SqlValue::Int(1))],
                vec![SqlExpr::Value(SqlValue::Int(2))],
            ],
        };
        let mut query = SelectQuery::from_source(TableSource::new(SqlSource::Values(values), "t1"));
        query.add_column(SqlExpr::column("t1", "id"));

        let ansi = render(DialectKind::Ansi, &SqlStatement::Select(query.clone())).unwrap();
        let oracle = render(DialectKind::Oracle, &SqlStatement::Select(query)).unwrap();
        assert_eq!(ansi.sql, "SELECT t1.id\nFROM (VALUES (1), (2)) AS t1 (id)");
        assert_eq!(
            oracle.sql,
            "SELECT t1.id\nFROM (SELECT 1 AS id FROM sys.dual UNION ALL SELECT 2 FROM sys.dual) t1"
        );
    }
}
