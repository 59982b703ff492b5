//! Configuration records
//!
//! Every section defaults to the behavior the translator has without any
//! configuration file, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target database engine for rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// ISO SQL with `OFFSET ... FETCH` paging
    #[default]
    Ansi,
    /// Oracle Database
    Oracle,
    /// Microsoft SQL Server
    #[serde(alias = "mssql")]
    SqlServer,
    /// PostgreSQL
    #[serde(alias = "postgres")]
    PostgreSql,
    /// SQLite
    Sqlite,
}

impl DialectKind {
    /// All dialects in a fixed order
    pub const ALL: [DialectKind; 5] = [
        DialectKind::Ansi,
        DialectKind::Oracle,
        DialectKind::SqlServer,
        DialectKind::PostgreSql,
        DialectKind::Sqlite,
    ];

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Ansi => "ansi",
            DialectKind::Oracle => "oracle",
            DialectKind::SqlServer => "sqlserver",
            DialectKind::PostgreSql => "postgresql",
            DialectKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translation behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Rewrite `a = b` / `a <> b` between two nullable operands so that
    /// NULL compares equal to NULL
    pub compare_nulls_as_values: bool,

    /// Sequence builders (by name) removed from the standard registry
    pub disabled_builders: Vec<String>,

    /// Configuration tag used to pick between provider-specific function
    /// mappings (e.g. `"Oracle"`)
    pub function_configuration: Option<String>,
}

/// Rendering behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Target dialect
    pub dialect: DialectKind,

    /// Emit every bound parameter as an inline literal
    pub inline_parameters: bool,
}

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    /// Translation section
    pub translation: TranslationConfig,

    /// Rendering section
    pub render: RenderConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dialect_is_ansi() {
        let config = QuarryConfig::default();
        assert_eq!(config.render.dialect, DialectKind::Ansi);
        assert!(!config.render.inline_parameters);
        assert!(!config.translation.compare_nulls_as_values);
    }

    #[test]
    fn test_dialect_names_are_stable() {
        let names: Vec<_> = DialectKind::ALL.iter().map(|d| d.as_str()).collect();
        assert_eq!(
            names,
            vec!["ansi", "oracle", "sqlserver", "postgresql", "sqlite"]
        );
    }
}
