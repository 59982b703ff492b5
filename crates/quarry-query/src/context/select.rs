use super::{
    path_tail, BuildContext, ContextCore, ContextId, ConvertFlags, ExpressionBuilder, RequestFor,
    ResultAccessor, SqlInfo,
};
use crate::error::TranslateResult;
use crate::expr::Expr;

/// Projection `|a, b, ..| body` over one or more sources.
///
/// Shares the query of its first source; joins have already merged the
/// other sources into that query.
pub struct SelectContext {
    core: ContextCore,
    sources: Vec<ContextId>,
    selector: Expr,
    grouping: bool,
}

impl SelectContext {
    pub fn build(
        b: &mut ExpressionBuilder,
        expr: &Expr,
        sources: Vec<ContextId>,
        selector: Expr,
    ) -> TranslateResult<ContextId> {
        b.lambda_parts(&selector, sources.len())?;
        let Some(first) = sources.first() else {
            return Err(b.malformed(expr, "project without a source"));
        };
        let query = b.context(*first).query_id();
        let grouping = sources.iter().any(|s| b.context(*s).is_grouping());
        let children = sources.clone();
        let id = b.add_context(query, expr, None, |core| SelectContext {
            core,
            sources,
            selector,
            grouping,
        });
        for child in children {
            b.set_parent(child, Some(id));
        }
        Ok(id)
    }

    pub fn sources(&self) -> &[ContextId] {
        &self.sources
    }

    /// Run `f` on the selector body extended by the unconsumed path members
    fn in_body<T>(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        f: impl FnOnce(&mut ExpressionBuilder, &Expr) -> TranslateResult<T>,
    ) -> TranslateResult<T> {
        let tail: Vec<String> = path_tail(b, self.id(), expr, level)?
            .into_iter()
            .map(str::to_string)
            .collect();
        b.with_lambda(&self.selector, &self.sources, |b, body| {
            let target = tail
                .iter()
                .fold(body.clone(), |object, member| object.member(member.as_str()));
            f(b, &target)
        })
    }
}

impl BuildContext for SelectContext {
    fn core(&self) -> &ContextCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "Select"
    }

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        let query = self.query_id();
        self.in_body(b, expr, level, |b, target| {
            b.build_accessor(target, query, enforce_server_side)
        })
    }

    fn convert_to_sql(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        self.in_body(b, expr, level, |b, target| b.convert_infos(target, flags))
    }

    fn is_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        request: RequestFor,
    ) -> TranslateResult<bool> {
        self.in_body(b, expr, level, |b, target| b.is_expression_of(target, request))
    }

    fn get_context(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
    ) -> TranslateResult<ContextId> {
        let id = self.id();
        self.in_body(b, expr, level, |b, target| {
            let target = target.reduce_member_access().unwrap_or(target);
            match b.path_context(target)? {
                Some(context) => {
                    let context = b.context(context);
                    context.get_context(b, Some(target), 0)
                }
                None => Err(b.not_implemented(id, Some(target), 0, "enter a computed value as a sequence")),
            }
        })
    }

    fn is_grouping(&self) -> bool {
        self.grouping
    }
}
