//! # Quarry Configuration Library
//!
//! Type-safe configuration for the Quarry query translator: which SQL
//! dialect to render, how parameters are emitted, and which translation
//! behaviors are enabled.
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry_config::{DialectKind, QuarryConfig};
//!
//! let config = QuarryConfig::from_toml_str(
//!     r#"
//!     [render]
//!     dialect = "oracle"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.render.dialect, DialectKind::Oracle);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod loader;

pub use config::*;
pub use loader::*;
