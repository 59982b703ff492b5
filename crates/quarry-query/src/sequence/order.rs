//! Ordering, paging and DISTINCT.

use super::SequenceBuilder;
use crate::context::{ContextId, ConvertFlags, ExpressionBuilder};
use crate::error::TranslateResult;
use crate::expr::{Expr, QueryMethod};
use crate::sql::OrderItem;

pub struct OrderByBuilder;

impl SequenceBuilder for OrderByBuilder {
    fn name(&self) -> &'static str {
        "order_by"
    }

    fn priority(&self) -> u8 {
        64
    }

    fn can_build(&self, expr: &Expr) -> bool {
        matches!(
            expr.method(),
            Some(
                QueryMethod::OrderBy
                    | QueryMethod::OrderByDescending
                    | QueryMethod::ThenBy
                    | QueryMethod::ThenByDescending
            )
        ) && expr.args().get(1).is_some_and(|k| k.as_lambda(1).is_some())
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let method = expr.method();
        let descending = matches!(
            method,
            Some(QueryMethod::OrderByDescending | QueryMethod::ThenByDescending)
        );
        let restart = matches!(
            method,
            Some(QueryMethod::OrderBy | QueryMethod::OrderByDescending)
        );

        let mut source = b.build_sequence(&args[0])?;
        if b.query(b.context(source).query_id()).has_limit() {
            source = b.wrap_in_subquery(source)?;
        }
        let infos = b.with_lambda(&args[1], &[source], |b, body| {
            b.convert_infos(body, ConvertFlags::Field)
        })?;

        let query = b.query_mut(b.context(source).query_id())?;
        if restart {
            query.order_by.clear();
        }
        for info in infos {
            if !query.order_by.iter().any(|o| o.expr == info.sql) {
                query.order_by.push(OrderItem {
                    expr: info.sql,
                    descending,
                });
            }
        }
        Ok(source)
    }
}

/// `Take(source, n)` and `Skip(source, n)`
pub struct TakeSkipBuilder;

impl SequenceBuilder for TakeSkipBuilder {
    fn name(&self) -> &'static str {
        "take_skip"
    }

    fn priority(&self) -> u8 {
        62
    }

    fn can_build(&self, expr: &Expr) -> bool {
        matches!(expr.method(), Some(QueryMethod::Take | QueryMethod::Skip)) && expr.args().len() == 2
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let take = expr.method() == Some(QueryMethod::Take);

        let mut source = b.build_sequence(&args[0])?;
        let conflicts = {
            let q = b.query(b.context(source).query_id());
            if take {
                q.take.is_some()
            } else {
                q.has_limit()
            }
        };
        if conflicts {
            source = b.wrap_in_subquery(source)?;
        }

        let count = b.convert_expr(&args[1])?;
        let query = b.query_mut(b.context(source).query_id())?;
        if take {
            query.take = Some(count);
        } else {
            query.skip = Some(count);
        }
        Ok(source)
    }
}

pub struct DistinctBuilder;

impl SequenceBuilder for DistinctBuilder {
    fn name(&self) -> &'static str {
        "distinct"
    }

    fn priority(&self) -> u8 {
        60
    }

    fn can_build(&self, expr: &Expr) -> bool {
        expr.method() == Some(QueryMethod::Distinct) && expr.args().len() == 1
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let mut source = b.build_sequence(&expr.args()[0])?;
        if b.query(b.context(source).query_id()).has_limit() {
            source = b.wrap_in_subquery(source)?;
        }
        b.query_mut(b.context(source).query_id())?.distinct = true;
        Ok(source)
    }
}
