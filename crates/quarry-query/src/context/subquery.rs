use super::{
    BuildContext, ContextCore, ContextId, ConvertFlags, ExpressionBuilder, RequestFor,
    ResultAccessor, SqlInfo,
};
use crate::error::TranslateResult;
use crate::expr::Expr;
use crate::sql::{ColumnRef, QueryRef, SelectQuery, SqlExpr, SqlSource, TableSource};
use std::cell::RefCell;

/// Derived table around a child whose query cannot take more clauses.
///
/// Child columns are exposed under stable aliases; this is the context that
/// renumbers indices between the child's query and its own.
pub struct SubQueryContext {
    core: ContextCore,
    child: ContextId,
    alias: RefCell<String>,
}

impl SubQueryContext {
    pub fn wrap(b: &mut ExpressionBuilder, child: ContextId) -> TranslateResult<ContextId> {
        let inner = b.context(child);
        let alias = b.next_table_alias();
        let query = b.new_query(SelectQuery::from_source(TableSource::new(
            SqlSource::SubQuery(QueryRef::Pending(inner.query_id())),
            alias.clone(),
        )));
        let id = b.add_context(query, inner.expression(), inner.parent(), |core| SubQueryContext {
            core,
            child,
            alias: RefCell::new(alias),
        });
        b.set_parent(child, Some(id));
        Ok(id)
    }

    pub fn child(&self) -> ContextId {
        self.child
    }

    /// Outer reference to column `index` of the child query
    fn outer_column(
        &self,
        b: &mut ExpressionBuilder,
        index: usize,
        hint: Option<&str>,
    ) -> TranslateResult<SqlExpr> {
        let inner = b.context(self.child).query_id();
        let nullable = b.query(inner).columns[index].expr.can_be_null();
        let name = b.query_mut(inner)?.column_alias(index, hint);
        Ok(SqlExpr::Column(ColumnRef {
            table: self.alias.borrow().clone(),
            name,
            nullable,
        }))
    }

    fn import_column(&self, b: &mut ExpressionBuilder, index: usize) -> TranslateResult<usize> {
        let column = self.outer_column(b, index, None)?;
        Ok(b.query_mut(self.query_id())?.add_column(column))
    }
}

impl BuildContext for SubQueryContext {
    fn core(&self) -> &ContextCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "SubQuery"
    }

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        let child = b.context(self.child);
        let accessor = child.build_expression(b, expr, level, enforce_server_side)?;
        accessor.try_map_indices(&mut |index| self.import_column(b, index))
    }

    fn convert_to_sql(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let child = b.context(self.child);
        let infos = child.convert_to_index(b, expr, level, flags)?;
        infos
            .into_iter()
            .map(|info| {
                let index = info.index.unwrap_or_default();
                let sql = self.outer_column(b, index, info.member.as_deref())?;
                Ok(SqlInfo {
                    sql,
                    member: info.member,
                    index: None,
                })
            })
            .collect()
    }

    fn is_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        request: RequestFor,
    ) -> TranslateResult<bool> {
        let child = b.context(self.child);
        child.is_expression(b, expr, level, request)
    }

    fn get_context(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
    ) -> TranslateResult<ContextId> {
        let child = b.context(self.child);
        match child.get_context(b, expr, level)? {
            // the child itself is only reachable through this derived table
            id if id == self.child => Ok(self.id()),
            id => Ok(id),
        }
    }

    fn convert_to_parent_index(
        &self,
        b: &mut ExpressionBuilder,
        index: usize,
        context: ContextId,
    ) -> TranslateResult<usize> {
        let inner = b.context(self.child).query_id();
        if b.context(context).query_id() == inner {
            return self.import_column(b, index);
        }
        match self.parent() {
            Some(parent) => {
                let parent = b.context(parent);
                parent.convert_to_parent_index(b, index, context)
            }
            None => Ok(index),
        }
    }

    fn set_alias(&self, b: &mut ExpressionBuilder, alias: &str) -> TranslateResult<()> {
        let current = self.alias.borrow().clone();
        let query = b.query_mut(self.query_id())?;
        if let Some(source) = query.from.iter_mut().find(|s| s.alias == current) {
            source.alias = alias.to_string();
        }
        *self.alias.borrow_mut() = alias.to_string();
        Ok(())
    }
}
