use super::{
    BuildContext, ContextCore, ContextId, ConvertFlags, ExpressionBuilder, RequestFor,
    ResultAccessor, SqlInfo,
};
use crate::error::TranslateResult;
use crate::expr::Expr;
use crate::sql::{SelectQuery, SqlExpr};

/// Single-row projection of a parameterless lambda; the query has no FROM.
pub struct ScalarSelectContext {
    core: ContextCore,
    body: Expr,
}

impl ScalarSelectContext {
    pub fn build(b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let (_, body) = b.lambda_parts(expr, 0)?;
        let body = body.clone();
        let query = b.new_query(SelectQuery::default());
        Ok(b.add_context(query, expr, None, |core| ScalarSelectContext { core, body }))
    }
}

impl BuildContext for ScalarSelectContext {
    fn core(&self) -> &ContextCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "ScalarSelect"
    }

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        if expr.is_some() || level > 0 {
            return Err(b.not_implemented(self.id(), expr, level, "project a member of a scalar"));
        }
        let accessor = b.build_accessor(&self.body, self.query_id(), enforce_server_side)?;
        // all-constant projections still need one column
        b.query_mut(self.query_id())?.ensure_column();
        Ok(accessor)
    }

    fn convert_to_sql(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        _flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        Err(b.not_implemented(self.id(), expr, level, "convert to SQL"))
    }

    fn is_expression(
        &self,
        _b: &mut ExpressionBuilder,
        _expr: Option<&Expr>,
        _level: usize,
        request: RequestFor,
    ) -> TranslateResult<bool> {
        Ok(request == RequestFor::Expression)
    }

    fn get_context(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
    ) -> TranslateResult<ContextId> {
        Err(b.not_implemented(self.id(), expr, level, "resolve a nested context"))
    }

    fn get_sub_query(&self, _b: &mut ExpressionBuilder) -> Option<SqlExpr> {
        None
    }
}
