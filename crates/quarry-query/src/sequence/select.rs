use super::{method_arg, SequenceBuilder};
use crate::context::{ContextId, ExpressionBuilder, SelectContext};
use crate::error::TranslateResult;
use crate::expr::{Expr, QueryMethod};

/// `Select(source, |p| body)`
pub struct SelectBuilder;

impl SequenceBuilder for SelectBuilder {
    fn name(&self) -> &'static str {
        "select"
    }

    fn priority(&self) -> u8 {
        70
    }

    fn can_build(&self, expr: &Expr) -> bool {
        method_arg(expr, QueryMethod::Select, 1).is_some_and(|s| s.as_lambda(1).is_some())
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let mut source = b.build_sequence(&args[0])?;
        // distinct rows are fixed before the new projection
        if b.query(b.context(source).query_id()).distinct {
            source = b.wrap_in_subquery(source)?;
        }
        SelectContext::build(b, expr, vec![source], args[1].clone())
    }
}
