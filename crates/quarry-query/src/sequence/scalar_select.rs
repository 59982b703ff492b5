use super::SequenceBuilder;
use crate::context::{ContextId, ExpressionBuilder, ScalarSelectContext};
use crate::error::TranslateResult;
use crate::expr::Expr;

/// Parameterless lambda: a single-row projection with no source
pub struct ScalarSelectBuilder;

impl SequenceBuilder for ScalarSelectBuilder {
    fn name(&self) -> &'static str {
        "scalar_select"
    }

    fn priority(&self) -> u8 {
        40
    }

    fn can_build(&self, expr: &Expr) -> bool {
        expr.as_lambda(0).is_some()
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        ScalarSelectContext::build(b, expr)
    }
}
