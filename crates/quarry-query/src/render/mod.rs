//! Dialect renderers for frozen statements.
//!
//! Every dialect shares one generator ([`SqlGenerator`]); a [`Dialect`]
//! contributes a capability record and named hook functions for the
//! places where engines disagree on syntax.

mod ansi;
mod capabilities;
mod dialect;
mod generator;
mod oracle;
mod postgres;
mod sqlite;
mod sqlserver;

pub use capabilities::{DialectCapabilities, LimitStyle, OutputStyle, ParameterStyle, UpsertStyle};
pub use dialect::{Dialect, MergeHooks, ModifyHooks, OperationHook};
pub use generator::SqlGenerator;

use crate::error::RenderError;
use crate::sql::{SqlStatement, SqlValue};
use quarry_config::{DialectKind, RenderConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bound parameter, in placeholder order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: SqlValue,
}

/// Output from rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedQuery {
    /// The generated SQL text
    pub sql: String,
    /// Parameters to bind, in placeholder order
    pub params: Vec<QueryParameter>,
}

/// Trait for rendering a statement to one target's SQL text.
pub trait QueryRenderer: Send + Sync {
    /// Unique name for this renderer
    fn name(&self) -> &str;

    /// Render the statement to SQL text with parameters
    fn render(&self, statement: &SqlStatement) -> Result<RenderedQuery, RenderError>;
}

/// Renderer for one of the built-in dialects
#[derive(Debug, Clone, Copy)]
pub struct SqlRenderer {
    dialect: &'static Dialect,
    inline_parameters: bool,
}

impl SqlRenderer {
    pub fn new(kind: DialectKind) -> Self {
        Self {
            dialect: Dialect::of(kind),
            inline_parameters: false,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.dialect).with_inline_parameters(config.inline_parameters)
    }

    /// Write every parameter as a literal
    pub fn with_inline_parameters(mut self, inline: bool) -> Self {
        self.inline_parameters = inline;
        self
    }

    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }
}

impl Default for SqlRenderer {
    fn default() -> Self {
        Self::new(DialectKind::default())
    }
}

impl QueryRenderer for SqlRenderer {
    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn render(&self, statement: &SqlStatement) -> Result<RenderedQuery, RenderError> {
        let mut generator = SqlGenerator::new(self.dialect, self.inline_parameters);
        generator.statement(statement)?;
        let rendered = generator.finish();
        debug!(
            dialect = self.name(),
            kind = statement.kind(),
            params = rendered.params.len(),
            "statement rendered"
        );
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::SelectQuery;

    #[test]
    fn test_builtin_renderers_behind_trait_object() {
        let statement = SqlStatement::Select(SelectQuery::default());
        let renderers: Vec<Box<dyn QueryRenderer>> = DialectKind::ALL
            .iter()
            .map(|kind| Box::new(SqlRenderer::new(*kind)) as Box<dyn QueryRenderer>)
            .collect();

        for (renderer, kind) in renderers.iter().zip(DialectKind::ALL.iter()) {
            assert_eq!(renderer.name(), kind.as_str());
            let rendered = renderer.render(&statement).unwrap();
            assert!(rendered.sql.starts_with("SELECT 1"), "{}", rendered.sql);
            assert!(rendered.params.is_empty());
        }
        assert_eq!(renderers[1].name(), "oracle");
    }

    #[test]
    fn test_renderer_from_config() {
        let config = RenderConfig {
            dialect: DialectKind::Oracle,
            inline_parameters: true,
        };
        let renderer = SqlRenderer::from_config(&config);

        assert_eq!(renderer.name(), "oracle");
        assert!(renderer.inline_parameters);
    }

    #[test]
    fn test_renderers_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqlRenderer>();
        assert_send_sync::<SqlStatement>();
    }
}
