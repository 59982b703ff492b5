//! MERGE statement context.

use super::modify::{setter_items, statement_context, TargetTable};
use super::{
    BuildContext, ContextCore, ContextId, ConvertFlags, ExpressionBuilder, RequestFor,
    ResultAccessor, SqlInfo, TableContext,
};
use crate::error::{TranslateError, TranslateResult};
use crate::expr::{Constant, Expr, ExprKind, QueryMethod};
use crate::sql::{
    MergeOperationClause, MergeStatement, SqlBinaryOp, SqlExpr, SqlStatement, SqlValue,
};
use tracing::debug;

/// Links of a merge chain, outermost operation last
struct MergeChain<'e> {
    target: &'e Expr,
    hint: Option<String>,
    source: &'e Expr,
    on: Option<&'e Expr>,
    operations: Vec<&'e Expr>,
}

impl<'e> MergeChain<'e> {
    fn parse(expr: &'e Expr) -> TranslateResult<Self> {
        let invalid = |reason: &str| TranslateError::InvalidMerge {
            reason: reason.to_string(),
            expr: Box::new(expr.clone()),
        };

        let mut link = expr;
        let mut operations = Vec::new();
        while let Some(method) = link.method() {
            if !matches!(
                method,
                QueryMethod::InsertWhenNotMatched
                    | QueryMethod::UpdateWhenMatched
                    | QueryMethod::UpdateWhenMatchedThenDelete
                    | QueryMethod::DeleteWhenMatched
            ) {
                break;
            }
            operations.push(link);
            link = link.args().first().ok_or_else(|| invalid("operation without a target"))?;
        }
        if operations.is_empty() {
            return Err(invalid("no WHEN operation"));
        }
        operations.reverse();

        let on = match link.method() {
            Some(QueryMethod::On) => Some(link.args().get(1).ok_or_else(|| invalid("ON without a condition"))?),
            Some(QueryMethod::OnTargetKey) => None,
            _ => return Err(invalid("missing ON")),
        };
        link = link.args().first().ok_or_else(|| invalid("ON without a source"))?;

        if link.method() != Some(QueryMethod::Using) {
            return Err(invalid("missing USING"));
        }
        let source = link.args().get(1).ok_or_else(|| invalid("USING without a source"))?;
        link = link.args().first().ok_or_else(|| invalid("USING without a target"))?;

        if link.method() != Some(QueryMethod::Merge) {
            return Err(invalid("chain does not start with MERGE INTO"));
        }
        let target = link.args().first().ok_or_else(|| invalid("MERGE without a target"))?;
        let hint = match link.args().get(1).map(|h| &h.kind) {
            Some(ExprKind::Constant(Constant::Value(SqlValue::Text(hint)))) => Some(hint.clone()),
            _ => None,
        };

        Ok(Self {
            target,
            hint,
            source,
            on,
            operations,
        })
    }
}

pub struct MergeContext {
    core: ContextCore,
    target: TargetTable,
    source: ContextId,
    on: SqlExpr,
    operations: Vec<MergeOperationClause>,
    hint: Option<String>,
}

impl MergeContext {
    pub fn build(b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let chain = MergeChain::parse(expr)?;

        let ExprKind::Constant(Constant::Table(entity)) = &chain.target.kind else {
            return Err(TranslateError::InvalidMerge {
                reason: "target is not a mapped table".to_string(),
                expr: Box::new(chain.target.clone()),
            });
        };
        let target_id = TableContext::build_table(b, chain.target, entity)?;
        b.context(target_id).set_alias(b, MergeStatement::TARGET_ALIAS)?;
        let target = TargetTable::of(b, target_id).ok_or_else(|| TranslateError::InvalidMerge {
            reason: "target is not a mapped table".to_string(),
            expr: Box::new(chain.target.clone()),
        })?;

        let source = Self::build_source(b, chain.source)?;
        let on = match chain.on {
            Some(condition) => {
                b.with_lambda(condition, &[target_id, source], |b, body| b.convert_expr(body))?
            }
            None => Self::key_condition(b, &target, source)?,
        };

        let mut operations = Vec::with_capacity(chain.operations.len());
        for operation in &chain.operations {
            operations.push(Self::build_operation(b, &target, source, operation)?);
        }
        debug!(
            operations = operations.len(),
            hint = chain.hint.as_deref().unwrap_or(""),
            "merge chain built"
        );

        let query = b.context(target_id).query_id();
        Ok(b.add_context(query, expr, None, |core| MergeContext {
            core,
            target,
            source,
            on,
            operations,
            hint: chain.hint,
        }))
    }

    /// Tables and literal rows are used in place; anything else becomes a
    /// derived table
    fn build_source(b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let mut source = b.build_sequence(expr)?;
        let ctx = b.context(source);
        let in_place = ctx.as_table().is_some()
            && b.query(ctx.query_id()).is_simple()
            && !b.query(ctx.query_id()).has_filter();
        if !in_place {
            source = b.wrap_in_subquery(source)?;
        }
        b.context(source).set_alias(b, MergeStatement::SOURCE_ALIAS)?;
        Ok(source)
    }

    /// `Target.key = Source.key` for every primary key member
    fn key_condition(
        b: &mut ExpressionBuilder,
        target: &TargetTable,
        source: ContextId,
    ) -> TranslateResult<SqlExpr> {
        const SOURCE_PARAM: &str = "source";
        target.primary_key()?;
        let keys: Vec<_> = target.mapping.primary_key().into_iter().cloned().collect();
        b.with_scope(vec![(SOURCE_PARAM.to_string(), source)], |b| {
            let mut condition: Option<SqlExpr> = None;
            for key in &keys {
                let value = b.convert_expr(&Expr::param(SOURCE_PARAM).member(key.member.as_str()))?;
                let equal = SqlExpr::binary(
                    SqlExpr::column(MergeStatement::TARGET_ALIAS, key.column.as_str()),
                    SqlBinaryOp::Equal,
                    value,
                );
                condition = Some(match condition {
                    Some(existing) => existing.and(equal),
                    None => equal,
                });
            }
            Ok(condition.unwrap_or(SqlExpr::Value(SqlValue::Bool(false))))
        })
    }

    /// Optional WHEN filter; a null constant means none
    fn filter(
        b: &mut ExpressionBuilder,
        predicate: &Expr,
        sources: &[ContextId],
    ) -> TranslateResult<Option<SqlExpr>> {
        if predicate.is_null_constant() {
            return Ok(None);
        }
        b.with_lambda(predicate, sources, |b, body| b.convert_expr(body))
            .map(Some)
    }

    fn build_operation(
        b: &mut ExpressionBuilder,
        target: &TargetTable,
        source: ContextId,
        expr: &Expr,
    ) -> TranslateResult<MergeOperationClause> {
        let args = expr.args();
        let arg = |i: usize| {
            args.get(i).ok_or_else(|| TranslateError::InvalidMerge {
                reason: "operation is missing an argument".to_string(),
                expr: Box::new(expr.clone()),
            })
        };
        let matched = [target.context, source];

        match expr.method() {
            Some(QueryMethod::InsertWhenNotMatched) => Ok(MergeOperationClause::Insert {
                where_: Self::filter(b, arg(1)?, &[source])?,
                items: setter_items(b, target.context, arg(2)?, &[source], &target.mapping, |c| {
                    c.identity
                })?,
            }),
            Some(QueryMethod::UpdateWhenMatched) => Ok(MergeOperationClause::Update {
                where_: Self::filter(b, arg(1)?, &matched)?,
                items: setter_items(b, target.context, arg(2)?, &matched, &target.mapping, |c| {
                    c.skip_on_update
                })?,
            }),
            Some(QueryMethod::UpdateWhenMatchedThenDelete) => {
                Ok(MergeOperationClause::UpdateWithDelete {
                    where_: Self::filter(b, arg(1)?, &matched)?,
                    items: setter_items(b, target.context, arg(2)?, &matched, &target.mapping, |c| {
                        c.skip_on_update
                    })?,
                    where_delete: Self::filter(b, arg(3)?, &matched)?,
                })
            }
            Some(QueryMethod::DeleteWhenMatched) => Ok(MergeOperationClause::Delete {
                where_: Self::filter(b, arg(1)?, &matched)?,
            }),
            _ => Err(TranslateError::InvalidMerge {
                reason: "unknown operation".to_string(),
                expr: Box::new(expr.clone()),
            }),
        }
    }
}

impl BuildContext for MergeContext {
    statement_context!("Merge");

    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        _enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        Err(b.not_implemented(self.id(), expr, level, "project a merge"))
    }

    fn create_statement(&self, b: &mut ExpressionBuilder) -> TranslateResult<SqlStatement> {
        let source_query = b.context(self.source).query_id();
        let Some(source) = b.query(source_query).from.first().cloned() else {
            return Err(b.not_implemented(self.source, None, 0, "merge from a source without rows"));
        };
        let statement = SqlStatement::Merge(MergeStatement {
            target: self.target.table.clone(),
            source,
            on: self.on.clone(),
            operations: self.operations.clone(),
            hint: self.hint.clone(),
        });
        b.freeze(source_query);
        b.finish_statement(statement)
    }

    fn returns_rows(&self) -> bool {
        false
    }
}
