//! Translation entry points.
//!
//! A [`Translator`] holds the read-only inputs shared by every call: the
//! builder registry, the mapping schema and the options. Each call to
//! [`Translator::translate`] owns a fresh context arena, so one translator
//! can serve any number of threads.

use crate::context::{ExpressionBuilder, ResultAccessor, TranslateOptions};
use crate::error::{QueryResult, RenderResult, TranslateResult};
use crate::expr::Expr;
use crate::mapping::MappingSchema;
use crate::render::{QueryRenderer, RenderedQuery};
use crate::sequence::{standard_registry, SequenceBuilderRegistry};
use crate::sql::SqlStatement;
use quarry_config::QuarryConfig;
use std::sync::Arc;
use tracing::debug;

/// Frozen statement plus the accessor reading its result rows
#[derive(Debug, Clone)]
pub struct TranslatedQuery {
    pub statement: Arc<SqlStatement>,
    /// `None` for statements that return no rows
    pub accessor: Option<ResultAccessor>,
}

impl TranslatedQuery {
    /// Key shared by every structurally equal statement
    pub fn shape_key(&self) -> serde_json::Result<String> {
        self.statement.shape_key()
    }
}

/// Translated statement and its text for one dialect
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub query: TranslatedQuery,
    pub rendered: RenderedQuery,
}

#[derive(Clone)]
pub struct Translator {
    registry: Arc<SequenceBuilderRegistry>,
    schema: Arc<MappingSchema>,
    options: TranslateOptions,
}

impl Translator {
    /// Translator over the standard builder registry
    pub fn new(schema: MappingSchema) -> Self {
        Self {
            registry: standard_registry(),
            schema: Arc::new(schema),
            options: TranslateOptions::default(),
        }
    }

    /// Apply the translation section of a configuration document
    pub fn from_config(schema: MappingSchema, config: &QuarryConfig) -> Self {
        let translation = &config.translation;
        let registry = if translation.disabled_builders.is_empty() {
            standard_registry()
        } else {
            let names: Vec<&str> = translation
                .disabled_builders
                .iter()
                .map(String::as_str)
                .collect();
            Arc::new(standard_registry().without(&names))
        };
        let schema = match &translation.function_configuration {
            Some(tag) => schema.with_configuration(Some(tag.clone())),
            None => schema,
        };
        Self {
            registry,
            schema: Arc::new(schema),
            options: TranslateOptions {
                compare_nulls_as_values: translation.compare_nulls_as_values,
            },
        }
    }

    pub fn with_registry(mut self, registry: Arc<SequenceBuilderRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_options(mut self, options: TranslateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &MappingSchema {
        &self.schema
    }

    pub fn registry(&self) -> &SequenceBuilderRegistry {
        &self.registry
    }

    /// Translate an expression tree into a frozen statement.
    ///
    /// Any error aborts the whole call; no partial statement is returned.
    pub fn translate(&self, expr: &Expr) -> TranslateResult<TranslatedQuery> {
        let mut b = ExpressionBuilder::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.schema),
            self.options,
        );
        let root = b.build_sequence(expr)?;
        let context = b.context(root);
        let accessor = if context.returns_rows() {
            Some(context.build_expression(&mut b, None, 0, false)?)
        } else {
            None
        };
        let statement = context.get_result_statement(&mut b)?;
        debug!(
            kind = statement.kind(),
            root = %b.context_path(root),
            "query translated"
        );
        Ok(TranslatedQuery {
            statement,
            accessor,
        })
    }

    /// Translate, then render with `renderer`
    pub fn compile(&self, expr: &Expr, renderer: &dyn QueryRenderer) -> QueryResult<CompiledQuery> {
        let query = self.translate(expr)?;
        let rendered = render(&query.statement, renderer)?;
        Ok(CompiledQuery { query, rendered })
    }
}

/// Render a frozen statement; the same statement may be rendered by any
/// number of renderers
pub fn render(statement: &SqlStatement, renderer: &dyn QueryRenderer) -> RenderResult<RenderedQuery> {
    renderer.render(statement)
}
