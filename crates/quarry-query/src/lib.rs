//! # Quarry Query
//!
//! Translates composable query expressions into dialect-correct SQL.
//!
//! The pipeline has three stages:
//!
//! 1. **Sequence builders** ([`sequence`]) recognize the shape of each query
//!    method call, picked by priority from a shared registry.
//! 2. **Build contexts** ([`context`]) cooperate to resolve lambda
//!    parameters and member paths into columns of a dialect-neutral
//!    statement ([`sql`]), which is frozen once complete.
//! 3. **Renderers** ([`render`]) emit text and ordered parameters for one
//!    target dialect.
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry_query::expr::{Expr, ExprType, Query};
//! use quarry_query::mapping::{ColumnMapping, MappingSchema, ObjectName, TableMapping};
//! use quarry_query::render::SqlRenderer;
//! use quarry_query::{DialectKind, Translator};
//!
//! let schema = MappingSchema::new().with_table(
//!     TableMapping::new("Person", ObjectName::new("people"))
//!         .with_column(ColumnMapping::new("id", ExprType::Int).primary_key(1))
//!         .with_column(ColumnMapping::new("name", ExprType::Text)),
//! );
//! let query = Query::table("Person")
//!     .filter(Expr::lambda1("p", |p| p.member("id").gt(3)))
//!     .select(Expr::lambda1("p", |p| p.member("name")));
//!
//! let compiled = Translator::new(schema)
//!     .compile(&query.into_expr(), &SqlRenderer::new(DialectKind::PostgreSql))
//!     .unwrap();
//! assert_eq!(
//!     compiled.rendered.sql,
//!     "SELECT t1.name\nFROM people AS t1\nWHERE t1.id > 3"
//! );
//! ```

pub mod context;
pub mod error;
pub mod expr;
pub mod mapping;
pub mod render;
pub mod sequence;
pub mod sql;
pub mod translate;

pub use error::{QueryError, QueryResult, RenderError, TranslateError, TranslateResult};
pub use quarry_config::{DialectKind, QuarryConfig};
pub use render::{QueryRenderer, RenderedQuery, SqlRenderer};
pub use translate::{render, CompiledQuery, TranslatedQuery, Translator};
