//! Shared fixtures for quarry-query integration tests

#![allow(dead_code)]

use quarry_query::expr::ExprType;
use quarry_query::mapping::{ColumnMapping, MappingSchema, ObjectName, TableMapping};
use quarry_query::sql::SqlValue;
use quarry_query::{DialectKind, RenderedQuery, SqlRenderer, Translator};

/// `Person -> people(id, name, age)` and `Pet -> pets(id, owner_id, name)`
pub fn schema() -> MappingSchema {
    MappingSchema::new()
        .with_standard_functions()
        .with_table(
            TableMapping::new("Person", ObjectName::new("people"))
                .with_column(ColumnMapping::new("id", ExprType::Int).primary_key(1))
                .with_column(ColumnMapping::new("name", ExprType::Text))
                .with_column(ColumnMapping::new("age", ExprType::Int).nullable()),
        )
        .with_table(
            TableMapping::new("Pet", ObjectName::new("pets"))
                .with_column(ColumnMapping::new("id", ExprType::Int).primary_key(1).identity())
                .with_column(ColumnMapping::new("owner_id", ExprType::Int).column("owner_id"))
                .with_column(ColumnMapping::new("name", ExprType::Text)),
        )
}

pub fn translator() -> Translator {
    Translator::new(schema())
}

pub fn renderer(kind: DialectKind) -> SqlRenderer {
    SqlRenderer::new(kind)
}

/// Translate and render, panicking on either error
pub fn sql(kind: DialectKind, expr: &quarry_query::expr::Expr) -> String {
    compile(kind, expr).sql
}

pub fn compile(kind: DialectKind, expr: &quarry_query::expr::Expr) -> RenderedQuery {
    translator()
        .compile(expr, &renderer(kind))
        .unwrap_or_else(|e| panic!("{} failed: {e}", kind.as_str()))
        .rendered
}

/// Single-column id rows `1..=count`
pub fn id_rows(count: i64) -> Vec<Vec<SqlValue>> {
    (1..=count).map(|i| vec![SqlValue::Int(i)]).collect()
}
