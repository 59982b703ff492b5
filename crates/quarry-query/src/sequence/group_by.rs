use super::{method_arg, SequenceBuilder};
use crate::context::{ContextId, ExpressionBuilder, GroupByContext};
use crate::error::TranslateResult;
use crate::expr::{Expr, QueryMethod};

/// `GroupBy(source, |p| key)`
pub struct GroupByBuilder;

impl SequenceBuilder for GroupByBuilder {
    fn name(&self) -> &'static str {
        "group_by"
    }

    fn priority(&self) -> u8 {
        72
    }

    fn can_build(&self, expr: &Expr) -> bool {
        method_arg(expr, QueryMethod::GroupBy, 1).is_some_and(|k| k.as_lambda(1).is_some())
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let mut source = b.build_sequence(&args[0])?;
        let query = b.context(source).query_id();
        let shaped = {
            let q = b.query(query);
            q.has_limit() || q.distinct || !q.group_by.is_empty()
        };
        if shaped {
            source = b.wrap_in_subquery(source)?;
        } else {
            // ordering before grouping has no observable effect
            b.query_mut(query)?.order_by.clear();
        }
        GroupByContext::build(b, expr, source, args[1].clone())
    }
}
