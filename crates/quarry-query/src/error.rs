//! Error types for translation and rendering.

use crate::expr::Expr;
use thiserror::Error;

/// Errors raised while translating an expression tree into a statement.
///
/// Translation is all-or-nothing: any of these aborts the call and no
/// partial statement is returned. Variants raised inside a build context
/// carry the offending node and the context path (`Kind#id > ...`).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslateError {
    #[error("no sequence builder recognizes {expr} (tried: {})", .tried.join(", "))]
    UnsupportedExpressionShape {
        expr: Box<Expr>,
        tried: Vec<&'static str>,
    },

    #[error("{context} cannot {operation} {expr} at level {level}")]
    TranslationNotImplemented {
        expr: Box<Expr>,
        level: usize,
        context: String,
        operation: &'static str,
    },

    #[error("{expr} resolves to {candidates} columns in {context}")]
    AmbiguousColumnReference {
        expr: Box<Expr>,
        context: String,
        candidates: usize,
    },

    #[error("parameter '{name}' is not bound in {expr}")]
    UnboundParameter { name: String, expr: Box<Expr> },

    #[error("entity '{entity}' has no table mapping")]
    UnknownEntity { entity: String },

    #[error("entity '{entity}' has no member '{member}' (in {context})")]
    UnknownMember {
        entity: String,
        member: String,
        context: String,
    },

    #[error("function '{function}' has no mapping")]
    UnknownFunction { function: String },

    #[error("function '{function}' maps {expected} arguments but is called with {actual}")]
    InvalidFunctionMetadata {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("{context} is frozen; its columns can no longer change")]
    ContextFrozen { context: String },

    #[error("entity '{entity}' has no primary key")]
    MissingPrimaryKey { entity: String },

    #[error("invalid merge: {reason} in {expr}")]
    InvalidMerge { reason: String, expr: Box<Expr> },

    #[error("builders '{first}' and '{second}' share priority {priority}")]
    DuplicateBuilderPriority {
        priority: u8,
        first: &'static str,
        second: &'static str,
    },
}

/// Errors raised while rendering a statement for one dialect
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("{dialect} cannot render merge operation {operation}")]
    InvalidMergeOperationCombination {
        operation: String,
        dialect: String,
    },

    #[error("{feature} is not supported by {dialect}")]
    Unsupported { feature: String, dialect: String },

    #[error("{dialect} rejects a merge source without rows")]
    EmptyMergeSource { dialect: String },

    #[error("statement still references unresolved subquery #{0}")]
    UnresolvedSubQuery(usize),
}

/// Either stage of a compile call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

pub type TranslateResult<T> = Result<T, TranslateError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type QueryResult<T> = Result<T, QueryError>;
