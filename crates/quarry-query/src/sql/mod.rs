//! Dialect-neutral SQL AST.
//!
//! Built incrementally by the context graph, then frozen into a
//! [`SqlStatement`] that any renderer may walk any number of times.

mod query;
mod statement;

pub use query::*;
pub use statement::*;

use crate::mapping::ObjectName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

/// Operator precedence levels; a child with lower precedence than its
/// parent operator is parenthesized.
pub struct Precedence;

impl Precedence {
    pub const PRIMARY: i32 = 100;
    pub const UNARY: i32 = 90;
    pub const MULTIPLICATIVE: i32 = 80;
    pub const SUBTRACTION: i32 = 70;
    pub const ADDITIVE: i32 = 60;
    pub const COMPARISON: i32 = 50;
    pub const LOGICAL_NEGATION: i32 = 30;
    pub const LOGICAL_CONJUNCTION: i32 = 20;
    pub const LOGICAL_DISJUNCTION: i32 = 10;
    pub const UNKNOWN: i32 = 0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlBinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
}

impl SqlBinaryOp {
    pub fn precedence(&self) -> i32 {
        match self {
            SqlBinaryOp::Multiply | SqlBinaryOp::Divide | SqlBinaryOp::Modulo => {
                Precedence::MULTIPLICATIVE
            }
            SqlBinaryOp::Subtract => Precedence::SUBTRACTION,
            SqlBinaryOp::Add | SqlBinaryOp::Concat => Precedence::ADDITIVE,
            SqlBinaryOp::Equal
            | SqlBinaryOp::NotEqual
            | SqlBinaryOp::Less
            | SqlBinaryOp::LessOrEqual
            | SqlBinaryOp::Greater
            | SqlBinaryOp::GreaterOrEqual => Precedence::COMPARISON,
            SqlBinaryOp::And => Precedence::LOGICAL_CONJUNCTION,
            SqlBinaryOp::Or => Precedence::LOGICAL_DISJUNCTION,
        }
    }

    pub fn is_predicate(&self) -> bool {
        self.precedence() <= Precedence::COMPARISON
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            SqlBinaryOp::Add => "+",
            SqlBinaryOp::Subtract => "-",
            SqlBinaryOp::Multiply => "*",
            SqlBinaryOp::Divide => "/",
            SqlBinaryOp::Modulo => "%",
            SqlBinaryOp::Concat => "||",
            SqlBinaryOp::Equal => "=",
            SqlBinaryOp::NotEqual => "<>",
            SqlBinaryOp::Less => "<",
            SqlBinaryOp::LessOrEqual => "<=",
            SqlBinaryOp::Greater => ">",
            SqlBinaryOp::GreaterOrEqual => ">=",
            SqlBinaryOp::And => "AND",
            SqlBinaryOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlUnaryOp {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

/// Reference to a column of a table source visible in the current query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Alias of the table source
    pub table: String,
    /// Column name (or subquery column alias)
    pub name: String,
    pub nullable: bool,
}

/// Bound query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: SqlValue,
    /// Render as a literal instead of a placeholder
    pub inline: bool,
}

/// Call of a mapped SQL function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlFunction {
    pub name: ObjectName,
    pub args: Vec<SqlExpr>,
    pub precedence: i32,
    pub is_predicate: bool,
    pub is_aggregate: bool,
    pub is_window_function: bool,
    pub is_pure: bool,
    pub can_be_null: bool,
}

/// Row of an UPDATE ... OUTPUT clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputRow {
    Inserted,
    Deleted,
}

/// Arena id of a select query still under construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub usize);

/// Nested query: an arena id while building, an owned query once frozen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryRef {
    Pending(QueryId),
    Resolved(Box<SelectQuery>),
}

/// SQL scalar expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlExpr {
    Value(SqlValue),
    Parameter(SqlParameter),
    Column(ColumnRef),
    OutputColumn {
        row: OutputRow,
        name: String,
    },
    Unary {
        op: SqlUnaryOp,
        operand: Box<SqlExpr>,
    },
    Binary {
        left: Box<SqlExpr>,
        op: SqlBinaryOp,
        right: Box<SqlExpr>,
    },
    Function(SqlFunction),
    SubQuery(QueryRef),
    Exists(QueryRef),
    In {
        expr: Box<SqlExpr>,
        query: QueryRef,
    },
}

impl SqlExpr {
    pub fn binary(left: SqlExpr, op: SqlBinaryOp, right: SqlExpr) -> Self {
        SqlExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: SqlUnaryOp, operand: SqlExpr) -> Self {
        SqlExpr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn and(self, other: SqlExpr) -> Self {
        SqlExpr::binary(self, SqlBinaryOp::And, other)
    }

    pub fn or(self, other: SqlExpr) -> Self {
        SqlExpr::binary(self, SqlBinaryOp::Or, other)
    }

    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Self {
        SqlExpr::Column(ColumnRef {
            table: table.into(),
            name: name.into(),
            nullable: false,
        })
    }

    pub fn precedence(&self) -> i32 {
        match self {
            SqlExpr::Binary { op, .. } => op.precedence(),
            SqlExpr::Unary {
                op: SqlUnaryOp::Not,
                ..
            } => Precedence::LOGICAL_NEGATION,
            SqlExpr::Unary {
                op: SqlUnaryOp::Negate,
                ..
            } => Precedence::UNARY,
            SqlExpr::Unary { .. } | SqlExpr::In { .. } => Precedence::COMPARISON,
            SqlExpr::Function(f) => f.precedence,
            _ => Precedence::PRIMARY,
        }
    }

    /// Whether the expression evaluates to a boolean predicate
    pub fn is_predicate(&self) -> bool {
        match self {
            SqlExpr::Binary { op, .. } => op.is_predicate(),
            SqlExpr::Unary { op, .. } => *op != SqlUnaryOp::Negate,
            SqlExpr::Exists(_) | SqlExpr::In { .. } => true,
            SqlExpr::Function(f) => f.is_predicate,
            _ => false,
        }
    }

    pub fn can_be_null(&self) -> bool {
        match self {
            SqlExpr::Value(v) => v.is_null(),
            SqlExpr::Parameter(p) => p.value.is_null(),
            SqlExpr::Column(c) => c.nullable,
            SqlExpr::OutputColumn { .. } | SqlExpr::SubQuery(_) => true,
            SqlExpr::Unary { op, operand } => match op {
                SqlUnaryOp::IsNull | SqlUnaryOp::IsNotNull => false,
                _ => operand.can_be_null(),
            },
            SqlExpr::Binary { left, right, .. } => left.can_be_null() || right.can_be_null(),
            SqlExpr::Function(f) => f.can_be_null,
            SqlExpr::Exists(_) => false,
            SqlExpr::In { expr, .. } => expr.can_be_null(),
        }
    }

    /// False when any function call inside is impure
    pub fn is_pure(&self) -> bool {
        let mut pure = true;
        self.walk(&mut |e| {
            if let SqlExpr::Function(f) = e {
                pure &= f.is_pure;
            }
        });
        pure
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let SqlExpr::Function(f) = e {
                found |= f.is_aggregate;
            }
        });
        found
    }

    /// Pre-order walk of this expression (nested queries are not entered)
    pub fn walk(&self, visit: &mut dyn FnMut(&SqlExpr)) {
        visit(self);
        match self {
            SqlExpr::Unary { operand, .. } => operand.walk(visit),
            SqlExpr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            SqlExpr::Function(f) => f.args.iter().for_each(|a| a.walk(visit)),
            SqlExpr::In { expr, .. } => expr.walk(visit),
            _ => {}
        }
    }

    /// Visit every nested query reference mutably
    pub fn for_each_query_mut(&mut self, visit: &mut dyn FnMut(&mut QueryRef)) {
        match self {
            SqlExpr::Unary { operand, .. } => operand.for_each_query_mut(visit),
            SqlExpr::Binary { left, right, .. } => {
                left.for_each_query_mut(visit);
                right.for_each_query_mut(visit);
            }
            SqlExpr::Function(f) => f
                .args
                .iter_mut()
                .for_each(|a| a.for_each_query_mut(visit)),
            SqlExpr::SubQuery(q) | SqlExpr::Exists(q) => visit(q),
            SqlExpr::In { expr, query } => {
                expr.for_each_query_mut(visit);
                visit(query);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        let cmp = SqlExpr::binary(
            SqlExpr::column("t1", "id"),
            SqlBinaryOp::Greater,
            SqlExpr::Value(SqlValue::Int(3)),
        );
        let and = cmp.clone().and(cmp.clone());
        assert!(and.precedence() < cmp.precedence());
        assert!(cmp.is_predicate());
        assert!(!SqlExpr::column("t1", "id").is_predicate());
    }

    #[test]
    fn test_can_be_null_propagates() {
        let nullable = SqlExpr::Column(ColumnRef {
            table: "t1".to_string(),
            name: "name".to_string(),
            nullable: true,
        });
        let sum = SqlExpr::binary(
            nullable.clone(),
            SqlBinaryOp::Concat,
            SqlExpr::Value("x".into()),
        );
        assert!(sum.can_be_null());
        assert!(!SqlExpr::unary(SqlUnaryOp::IsNull, nullable).can_be_null());
    }
}
