use super::{method_arg, SequenceBuilder};
use crate::context::{ContextId, ExpressionBuilder};
use crate::error::TranslateResult;
use crate::expr::{Expr, QueryMethod};

/// `Where(source, |p| predicate)`
pub struct FilterBuilder;

impl SequenceBuilder for FilterBuilder {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn priority(&self) -> u8 {
        68
    }

    fn can_build(&self, expr: &Expr) -> bool {
        method_arg(expr, QueryMethod::Where, 1).is_some_and(|p| p.as_lambda(1).is_some())
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let source = b.build_sequence(&args[0])?;
        b.filter_sequence(source, &args[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Query;

    #[test]
    fn test_filter_requires_unary_lambda() {
        let good = Query::table("Person")
            .filter(Expr::lambda1("p", |p| p.member("id").gt(3)))
            .into_expr();
        let bad = Query::table("Person").filter(Expr::value(true)).into_expr();

        assert!(FilterBuilder.can_build(&good));
        assert!(!FilterBuilder.can_build(&bad));
        assert!(!FilterBuilder.can_build(&Expr::table("Person")));
    }
}
