//! Expression AST consumed by the translator.
//!
//! Trees are built by the caller (usually through [`Query`]) and are never
//! mutated during translation. Every node carries a static [`ExprType`].

mod query;

pub use query::{MergeQuery, Query};

use crate::sql::{SqlBinaryOp, SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static result type of an expression node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprType {
    #[default]
    Unknown,
    Bool,
    Int,
    Float,
    Text,
    /// Mapped entity row
    Entity(String),
    Sequence(Box<ExprType>),
    /// Anonymous constructed object
    Object,
    Unit,
}

impl ExprType {
    pub fn of_value(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => ExprType::Unknown,
            SqlValue::Bool(_) => ExprType::Bool,
            SqlValue::Int(_) => ExprType::Int,
            SqlValue::Float(_) => ExprType::Float,
            SqlValue::Text(_) => ExprType::Text,
        }
    }

    pub fn element(&self) -> Option<&ExprType> {
        match self {
            ExprType::Sequence(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Literal row set used as an in-memory table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub entity: String,
    pub members: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Value(SqlValue),
    /// Whole mapped table of an entity
    Table(String),
    Rows(RowSet),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterRef {
    /// Lambda parameter, resolved through the enclosing scopes
    Lambda(String),
    /// Bound query parameter
    Query { name: String, value: SqlValue },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
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

impl BinaryOp {
    pub fn to_sql(self) -> SqlBinaryOp {
        match self {
            BinaryOp::Add => SqlBinaryOp::Add,
            BinaryOp::Subtract => SqlBinaryOp::Subtract,
            BinaryOp::Multiply => SqlBinaryOp::Multiply,
            BinaryOp::Divide => SqlBinaryOp::Divide,
            BinaryOp::Modulo => SqlBinaryOp::Modulo,
            BinaryOp::Concat => SqlBinaryOp::Concat,
            BinaryOp::Equal => SqlBinaryOp::Equal,
            BinaryOp::NotEqual => SqlBinaryOp::NotEqual,
            BinaryOp::Less => SqlBinaryOp::Less,
            BinaryOp::LessOrEqual => SqlBinaryOp::LessOrEqual,
            BinaryOp::Greater => SqlBinaryOp::Greater,
            BinaryOp::GreaterOrEqual => SqlBinaryOp::GreaterOrEqual,
            BinaryOp::And => SqlBinaryOp::And,
            BinaryOp::Or => SqlBinaryOp::Or,
        }
    }

    fn result_type(self, left: &ExprType) -> ExprType {
        match self {
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessOrEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterOrEqual
            | BinaryOp::And
            | BinaryOp::Or => ExprType::Bool,
            BinaryOp::Concat => ExprType::Text,
            _ => left.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Cross,
}

/// Query operators understood by the sequence builders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMethod {
    Where,
    Select,
    SelectMany,
    Join(JoinType),
    GroupBy,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    Take,
    Skip,
    Distinct,
    Any,
    Contains,
    Update,
    UpdateWithOutput,
    Delete,
    Insert,
    InsertFrom,
    InsertOrUpdate,
    Merge,
    Using,
    On,
    OnTargetKey,
    InsertWhenNotMatched,
    UpdateWhenMatched,
    UpdateWhenMatchedThenDelete,
    DeleteWhenMatched,
}

impl QueryMethod {
    pub fn name(&self) -> &'static str {
        match self {
            QueryMethod::Where => "Where",
            QueryMethod::Select => "Select",
            QueryMethod::SelectMany => "SelectMany",
            QueryMethod::Join(JoinType::Inner) => "Join",
            QueryMethod::Join(JoinType::Left) => "LeftJoin",
            QueryMethod::Join(JoinType::Cross) => "CrossJoin",
            QueryMethod::GroupBy => "GroupBy",
            QueryMethod::OrderBy => "OrderBy",
            QueryMethod::OrderByDescending => "OrderByDescending",
            QueryMethod::ThenBy => "ThenBy",
            QueryMethod::ThenByDescending => "ThenByDescending",
            QueryMethod::Take => "Take",
            QueryMethod::Skip => "Skip",
            QueryMethod::Distinct => "Distinct",
            QueryMethod::Any => "Any",
            QueryMethod::Contains => "Contains",
            QueryMethod::Update => "Update",
            QueryMethod::UpdateWithOutput => "UpdateWithOutput",
            QueryMethod::Delete => "Delete",
            QueryMethod::Insert => "Insert",
            QueryMethod::InsertFrom => "InsertFrom",
            QueryMethod::InsertOrUpdate => "InsertOrUpdate",
            QueryMethod::Merge => "Merge",
            QueryMethod::Using => "Using",
            QueryMethod::On => "On",
            QueryMethod::OnTargetKey => "OnTargetKey",
            QueryMethod::InsertWhenNotMatched => "InsertWhenNotMatched",
            QueryMethod::UpdateWhenMatched => "UpdateWhenMatched",
            QueryMethod::UpdateWhenMatchedThenDelete => "UpdateWhenMatchedThenDelete",
            QueryMethod::DeleteWhenMatched => "DeleteWhenMatched",
        }
    }

    /// Part of a MERGE chain
    pub fn is_merge(&self) -> bool {
        matches!(
            self,
            QueryMethod::Merge
                | QueryMethod::Using
                | QueryMethod::On
                | QueryMethod::OnTargetKey
                | QueryMethod::InsertWhenNotMatched
                | QueryMethod::UpdateWhenMatched
                | QueryMethod::UpdateWhenMatchedThenDelete
                | QueryMethod::DeleteWhenMatched
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Method(QueryMethod),
    /// Mapped SQL function, looked up by id
    Function(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Constant(Constant),
    Parameter(ParameterRef),
    MemberAccess {
        object: Box<Expr>,
        member: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    New {
        members: Vec<(String, Expr)>,
    },
    MemberInit {
        type_name: String,
        bindings: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: ExprType,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: ExprType) -> Self {
        Self { kind, ty }
    }

    pub fn value(value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let ty = ExprType::of_value(&value);
        Self::new(ExprKind::Constant(Constant::Value(value)), ty)
    }

    pub fn null() -> Self {
        Self::value(SqlValue::Null)
    }

    pub fn table(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        let ty = ExprType::Sequence(Box::new(ExprType::Entity(entity.clone())));
        Self::new(ExprKind::Constant(Constant::Table(entity)), ty)
    }

    pub fn rows(entity: impl Into<String>, members: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        let entity = entity.into();
        let ty = ExprType::Sequence(Box::new(ExprType::Entity(entity.clone())));
        Self::new(
            ExprKind::Constant(Constant::Rows(RowSet {
                entity,
                members: members.iter().map(|m| m.to_string()).collect(),
                rows,
            })),
            ty,
        )
    }

    /// Lambda parameter reference
    pub fn param(name: impl Into<String>) -> Self {
        Self::new(
            ExprKind::Parameter(ParameterRef::Lambda(name.into())),
            ExprType::Unknown,
        )
    }

    /// Bound query parameter
    pub fn query_param(name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        let ty = ExprType::of_value(&value);
        Self::new(
            ExprKind::Parameter(ParameterRef::Query {
                name: name.into(),
                value,
            }),
            ty,
        )
    }

    pub fn member(self, member: impl Into<String>) -> Self {
        Self::new(
            ExprKind::MemberAccess {
                object: Box::new(self),
                member: member.into(),
            },
            ExprType::Unknown,
        )
    }

    pub fn typed(mut self, ty: ExprType) -> Self {
        self.ty = ty;
        self
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        let ty = match op {
            UnaryOp::Not => ExprType::Bool,
            UnaryOp::Negate => operand.ty.clone(),
        };
        Self::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let ty = op.result_type(&left.ty);
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn not(self) -> Self {
        Self::unary(UnaryOp::Not, self)
    }

    pub fn negate(self) -> Self {
        Self::unary(UnaryOp::Negate, self)
    }

    pub fn equals(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Equal, self, other.into())
    }

    pub fn not_equals(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::NotEqual, self, other.into())
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Less, self, other.into())
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::LessOrEqual, self, other.into())
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Greater, self, other.into())
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::GreaterOrEqual, self, other.into())
    }

    pub fn and(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::And, self, other.into())
    }

    pub fn or(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Or, self, other.into())
    }

    pub fn plus(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Add, self, other.into())
    }

    pub fn minus(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Subtract, self, other.into())
    }

    pub fn times(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Multiply, self, other.into())
    }

    pub fn concat(self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Concat, self, other.into())
    }

    pub fn call(method: QueryMethod, args: Vec<Expr>, ty: ExprType) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Callee::Method(method),
                args,
            },
            ty,
        )
    }

    /// Call of a mapped SQL function
    pub fn function(id: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Callee::Function(id.into()),
                args,
            },
            ExprType::Unknown,
        )
    }

    pub fn lambda(params: &[&str], body: Expr) -> Self {
        let ty = body.ty.clone();
        Self::new(
            ExprKind::Lambda {
                params: params.iter().map(|p| p.to_string()).collect(),
                body: Box::new(body),
            },
            ty,
        )
    }

    /// `|p| body(p)`
    pub fn lambda1(param: &str, body: impl FnOnce(Expr) -> Expr) -> Self {
        Self::lambda(&[param], body(Expr::param(param)))
    }

    /// `|a, b| body(a, b)`
    pub fn lambda2(a: &str, b: &str, body: impl FnOnce(Expr, Expr) -> Expr) -> Self {
        Self::lambda(&[a, b], body(Expr::param(a), Expr::param(b)))
    }

    pub fn new_object(members: Vec<(&str, Expr)>) -> Self {
        Self::new(
            ExprKind::New {
                members: members
                    .into_iter()
                    .map(|(n, e)| (n.to_string(), e))
                    .collect(),
            },
            ExprType::Object,
        )
    }

    pub fn member_init(type_name: impl Into<String>, bindings: Vec<(&str, Expr)>) -> Self {
        let type_name = type_name.into();
        Self::new(
            ExprKind::MemberInit {
                type_name: type_name.clone(),
                bindings: bindings
                    .into_iter()
                    .map(|(n, e)| (n.to_string(), e))
                    .collect(),
            },
            ExprType::Entity(type_name),
        )
    }

    /// Node kind name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Constant(_) => "Constant",
            ExprKind::Parameter(_) => "ParameterRef",
            ExprKind::MemberAccess { .. } => "MemberAccess",
            ExprKind::Unary { .. } => "UnaryOp",
            ExprKind::Binary { .. } => "BinaryOp",
            ExprKind::Call { .. } => "Call",
            ExprKind::Lambda { .. } => "Lambda",
            ExprKind::New { .. } => "NewObject",
            ExprKind::MemberInit { .. } => "MemberInit",
        }
    }

    pub fn method(&self) -> Option<QueryMethod> {
        match &self.kind {
            ExprKind::Call {
                callee: Callee::Method(m),
                ..
            } => Some(*m),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Expr] {
        match &self.kind {
            ExprKind::Call { args, .. } => args,
            _ => &[],
        }
    }

    /// `(params, body)` of a lambda with exactly `arity` parameters
    pub fn as_lambda(&self, arity: usize) -> Option<(&[String], &Expr)> {
        match &self.kind {
            ExprKind::Lambda { params, body } if params.len() == arity => Some((params, body)),
            _ => None,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(&self.kind, ExprKind::Constant(Constant::Value(SqlValue::Null)))
    }

    /// Members of a `New` or `MemberInit` node
    pub fn constructed_members(&self) -> Option<&[(String, Expr)]> {
        match &self.kind {
            ExprKind::New { members } => Some(members),
            ExprKind::MemberInit { bindings, .. } => Some(bindings),
            _ => None,
        }
    }

    /// Flatten `p.a.b` into `("p", ["a", "b"])`
    pub fn member_path(&self) -> Option<(&str, Vec<&str>)> {
        match &self.kind {
            ExprKind::Parameter(ParameterRef::Lambda(name)) => Some((name.as_str(), Vec::new())),
            ExprKind::MemberAccess { object, member } => {
                let (root, mut path) = object.member_path()?;
                path.push(member.as_str());
                Some((root, path))
            }
            _ => None,
        }
    }

    /// Replace `New { .. }.member` by the member's expression
    pub fn reduce_member_access(&self) -> Option<&Expr> {
        if let ExprKind::MemberAccess { object, member } = &self.kind {
            let object = object.reduce_member_access().unwrap_or(&**object);
            return object
                .constructed_members()?
                .iter()
                .find(|(name, _)| name == member)
                .map(|(_, e)| e);
        }
        None
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::value(v)
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Expr::value(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::value(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::value(v)
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::value(v)
    }
}

impl From<SqlValue> for Expr {
    fn from(v: SqlValue) -> Self {
        Expr::value(v)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(Constant::Value(v)) => write!(f, "{}", v),
            ExprKind::Constant(Constant::Table(entity)) => write!(f, "Table<{}>", entity),
            ExprKind::Constant(Constant::Rows(rows)) => {
                write!(f, "Rows<{}>[{}]", rows.entity, rows.rows.len())
            }
            ExprKind::Parameter(ParameterRef::Lambda(name)) => f.write_str(name),
            ExprKind::Parameter(ParameterRef::Query { name, .. }) => write!(f, "@{}", name),
            ExprKind::MemberAccess { object, member } => write!(f, "{}.{}", object, member),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!({})", operand),
                UnaryOp::Negate => write!(f, "-({})", operand),
            },
            ExprKind::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.to_sql().symbol(), right)
            }
            ExprKind::Call { callee, args } => {
                match callee {
                    Callee::Method(m) => write!(f, "{}(", m.name())?,
                    Callee::Function(id) => write!(f, "{}(", id)?,
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            ExprKind::Lambda { params, body } => write!(f, "|{}| {}", params.join(", "), body),
            ExprKind::New { members } => {
                f.write_str("new {")?;
                for (i, (name, e)) in members.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{} = {}", sep, name, e)?;
                }
                f.write_str(" }")
            }
            ExprKind::MemberInit {
                type_name,
                bindings,
            } => {
                write!(f, "{} {{", type_name)?;
                for (i, (name, e)) in bindings.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{} = {}", sep, name, e)?;
                }
                f.write_str(" }")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_path() {
        let e = Expr::param("p").member("address").member("city");
        let (root, path) = e.member_path().unwrap();
        assert_eq!(root, "p");
        assert_eq!(path, vec!["address", "city"]);

        assert!(Expr::value(1).member("x").member_path().is_none());
    }

    #[test]
    fn test_reduce_member_access() {
        let obj = Expr::new_object(vec![
            ("a", Expr::value(1)),
            ("b", Expr::new_object(vec![("c", Expr::param("p"))])),
        ]);
        assert_eq!(
            obj.clone().member("a").reduce_member_access(),
            Some(&Expr::value(1))
        );
        assert_eq!(
            obj.clone().member("b").member("c").reduce_member_access(),
            Some(&Expr::param("p"))
        );
        assert!(obj.member("z").reduce_member_access().is_none());
    }

    #[test]
    fn test_binary_result_types() {
        let e = Expr::param("p").member("id").typed(ExprType::Int).gt(3);
        assert_eq!(e.ty, ExprType::Bool);
        let sum = Expr::value(1).plus(2);
        assert_eq!(sum.ty, ExprType::Int);
    }

    #[test]
    fn test_display() {
        let e = Expr::lambda1("p", |p| p.member("id").gt(3));
        assert_eq!(e.to_string(), "|p| (p.id > 3)");
        assert_eq!(Expr::table("Person").kind_name(), "Constant");
    }
}
