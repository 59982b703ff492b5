//! Leaf builders: mapped tables and literal rows.

use super::SequenceBuilder;
use crate::context::{ContextId, ExpressionBuilder, TableContext};
use crate::error::TranslateResult;
use crate::expr::{Constant, Expr, ExprKind};

pub struct TableBuilder;

impl SequenceBuilder for TableBuilder {
    fn name(&self) -> &'static str {
        "table"
    }

    fn priority(&self) -> u8 {
        20
    }

    fn can_build(&self, expr: &Expr) -> bool {
        matches!(expr.kind, ExprKind::Constant(Constant::Table(_)))
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let ExprKind::Constant(Constant::Table(entity)) = &expr.kind else {
            return Err(b.malformed(expr, "build a table from a non-table"));
        };
        TableContext::build_table(b, expr, entity)
    }
}

pub struct ValuesBuilder;

impl SequenceBuilder for ValuesBuilder {
    fn name(&self) -> &'static str {
        "values"
    }

    fn priority(&self) -> u8 {
        22
    }

    fn can_build(&self, expr: &Expr) -> bool {
        matches!(expr.kind, ExprKind::Constant(Constant::Rows(_)))
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let ExprKind::Constant(Constant::Rows(rows)) = &expr.kind else {
            return Err(b.malformed(expr, "build rows from a non-row constant"));
        };
        TableContext::build_rows(b, expr, rows)
    }
}
