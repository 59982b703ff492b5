//! Data-modifying statement builders.

use super::SequenceBuilder;
use crate::context::{
    ContextId, DeleteContext, ExpressionBuilder, InsertContext, InsertOrUpdateContext,
    UpdateContext,
};
use crate::error::TranslateResult;
use crate::expr::{Expr, QueryMethod};

/// `Update(source, setter)` and `UpdateWithOutput(source, setter, output)`
pub struct UpdateBuilder;

impl SequenceBuilder for UpdateBuilder {
    fn name(&self) -> &'static str {
        "update"
    }

    fn priority(&self) -> u8 {
        88
    }

    fn can_build(&self, expr: &Expr) -> bool {
        match expr.method() {
            Some(QueryMethod::Update) => expr.args().len() == 2,
            Some(QueryMethod::UpdateWithOutput) => {
                expr.args().len() == 3 && expr.args()[2].as_lambda(2).is_some()
            }
            _ => false,
        }
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let source = b.build_sequence(&args[0])?;
        UpdateContext::build(b, expr, source, &args[1], args.get(2))
    }
}

pub struct DeleteBuilder;

impl SequenceBuilder for DeleteBuilder {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn priority(&self) -> u8 {
        86
    }

    fn can_build(&self, expr: &Expr) -> bool {
        expr.method() == Some(QueryMethod::Delete) && expr.args().len() == 1
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let source = b.build_sequence(&expr.args()[0])?;
        DeleteContext::build(b, expr, source)
    }
}

/// `Insert(table, || setter)` and `InsertFrom(source, table, |p| setter)`
pub struct InsertBuilder;

impl SequenceBuilder for InsertBuilder {
    fn name(&self) -> &'static str {
        "insert"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn can_build(&self, expr: &Expr) -> bool {
        let args = expr.args();
        match expr.method() {
            Some(QueryMethod::Insert) => args.len() == 2 && args[1].as_lambda(0).is_some(),
            Some(QueryMethod::InsertFrom) => args.len() == 3 && args[2].as_lambda(1).is_some(),
            _ => false,
        }
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        if expr.method() == Some(QueryMethod::Insert) {
            let table = b.build_sequence(&args[0])?;
            return InsertContext::build_values(b, expr, table, &args[1]);
        }
        let source = b.build_sequence(&args[0])?;
        let table = b.build_sequence(&args[1])?;
        InsertContext::build_from(b, expr, source, table, &args[2])
    }
}

/// `InsertOrUpdate(table, || insert, |t| update)`
pub struct InsertOrUpdateBuilder;

impl SequenceBuilder for InsertOrUpdateBuilder {
    fn name(&self) -> &'static str {
        "insert_or_update"
    }

    fn priority(&self) -> u8 {
        92
    }

    fn can_build(&self, expr: &Expr) -> bool {
        let args = expr.args();
        expr.method() == Some(QueryMethod::InsertOrUpdate)
            && args.len() == 3
            && args[1].as_lambda(0).is_some()
            && args[2].as_lambda(1).is_some()
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let table = b.build_sequence(&args[0])?;
        InsertOrUpdateContext::build(b, expr, table, &args[1], &args[2])
    }
}
