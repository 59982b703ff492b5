use super::{
    path_tail, BuildContext, ContextCore, ContextId, ConvertFlags, ExpressionBuilder, RequestFor,
    ResultAccessor, SqlInfo,
};
use crate::error::{TranslateError, TranslateResult};
use crate::expr::Expr;
use tracing::trace;

/// Groups of `source` under `|p| key`.
///
/// A lambda parameter bound here denotes one group: `g.key` (and members
/// below it) resolve through the key selector, a bare `g` is the group as
/// a sequence for aggregates.
pub struct GroupByContext {
    core: ContextCore,
    source: ContextId,
    key: Expr,
}

impl GroupByContext {
    pub const KEY_MEMBER: &'static str = "key";

    pub fn build(
        b: &mut ExpressionBuilder,
        expr: &Expr,
        source: ContextId,
        key: Expr,
    ) -> TranslateResult<ContextId> {
        let infos = b.with_lambda(&key, &[source], |b, body| {
            b.convert_infos(body, ConvertFlags::Field)
        })?;
        let query = b.context(source).query_id();
        let group_by = &mut b.query_mut(query)?.group_by;
        for info in infos {
            if !group_by.contains(&info.sql) {
                group_by.push(info.sql);
            }
        }
        trace!(query = query.0, keys = b.query(query).group_by.len(), "grouping added");

        let id = b.add_context(query, expr, None, |core| GroupByContext { core, source, key });
        b.set_parent(source, Some(id));
        Ok(id)
    }

    pub fn source(&self) -> ContextId {
        self.source
    }

    /// Key selector body extended by the members after `key`
    fn in_key<T>(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        f: impl FnOnce(&mut ExpressionBuilder, &Expr) -> TranslateResult<T>,
    ) -> TranslateResult<Option<T>> {
        let tail: Vec<String> = path_tail(b, self.id(), expr, level)?
            .into_iter()
            .map(str::to_string)
            .collect();
        match tail.split_first() {
            None => Ok(None),
            Some((first, rest)) if first == Self::KEY_MEMBER => {
                let source = self.source;
                b.with_lambda(&self.key, &[source], |b, body| {
                    let target = rest
                        .iter()
                        .fold(body.clone(), |object, member| object.member(member.as_str()));
                    f(b, &target)
                })
                .map(Some)
            }
            Some((first, _)) => Err(TranslateError::UnknownMember {
                entity: "group".to_string(),
                member: first.clone(),
                context: b.context_path(self.id()),
            }),
        }
    }
}

impl BuildContext for GroupByContext {
    fn core(&self) -> &ContextCore {
        &self.core
    }

    fn kind(&self) -> &'static str {
        "GroupBy"
    }

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        let query = self.query_id();
        self.in_key(b, expr, level, |b, target| {
            b.build_accessor(target, query, enforce_server_side)
        })?
        .ok_or_else(|| b.not_implemented(self.id(), expr, level, "project a whole group"))
    }

    fn convert_to_sql(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        self.in_key(b, expr, level, |b, target| b.convert_infos(target, flags))?
            .ok_or_else(|| b.not_implemented(self.id(), expr, level, "convert a whole group to SQL"))
    }

    fn is_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        request: RequestFor,
    ) -> TranslateResult<bool> {
        let answer = self.in_key(b, expr, level, |b, target| b.is_expression_of(target, request))?;
        Ok(answer.unwrap_or(request == RequestFor::Group))
    }

    fn get_context(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
    ) -> TranslateResult<ContextId> {
        if path_tail(b, self.id(), expr, level)?.is_empty() {
            Ok(self.source)
        } else {
            Err(b.not_implemented(self.id(), expr, level, "enter a group member as a sequence"))
        }
    }

    fn is_grouping(&self) -> bool {
        true
    }
}
