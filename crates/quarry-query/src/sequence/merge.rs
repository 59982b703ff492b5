use super::SequenceBuilder;
use crate::context::{ContextId, ExpressionBuilder, MergeContext};
use crate::error::TranslateResult;
use crate::expr::{Expr, QueryMethod};

/// Complete MERGE chain, recognized by its last WHEN operation
pub struct MergeBuilder;

impl SequenceBuilder for MergeBuilder {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn priority(&self) -> u8 {
        95
    }

    fn is_sequence(&self, expr: &Expr) -> bool {
        expr.method().is_some_and(|m| m.is_merge())
    }

    fn can_build(&self, expr: &Expr) -> bool {
        matches!(
            expr.method(),
            Some(
                QueryMethod::InsertWhenNotMatched
                    | QueryMethod::UpdateWhenMatched
                    | QueryMethod::UpdateWhenMatchedThenDelete
                    | QueryMethod::DeleteWhenMatched
            )
        )
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        MergeContext::build(b, expr)
    }
}
