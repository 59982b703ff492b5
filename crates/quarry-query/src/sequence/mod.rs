//! Sequence builders.
//!
//! This module defines the `SequenceBuilder` trait and the
//! `SequenceBuilderRegistry` that picks one builder per expression shape.
//! Priorities are unique, so the first builder whose `can_build()` accepts
//! a node is the only possible choice.

mod filter;
mod group_by;
mod join;
mod merge;
mod modify;
mod order;
mod scalar_select;
mod select;
mod table;

pub use filter::FilterBuilder;
pub use group_by::GroupByBuilder;
pub use join::{JoinBuilder, SelectManyBuilder};
pub use merge::MergeBuilder;
pub use modify::{DeleteBuilder, InsertBuilder, InsertOrUpdateBuilder, UpdateBuilder};
pub use order::{DistinctBuilder, OrderByBuilder, TakeSkipBuilder};
pub use scalar_select::ScalarSelectBuilder;
pub use select::SelectBuilder;
pub use table::{TableBuilder, ValuesBuilder};

use crate::context::{ContextId, ExpressionBuilder};
use crate::error::{TranslateError, TranslateResult};
use crate::expr::{Expr, QueryMethod};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::debug;

/// Strategy that recognizes one expression shape and builds its context.
///
/// - `is_sequence()` for a cheap pre-check
/// - `can_build()` for the full shape match
/// - `build_sequence()` for the actual build
pub trait SequenceBuilder: Send + Sync {
    /// Unique name for this builder
    fn name(&self) -> &'static str;

    /// Priority (higher = tried first); unique within a registry
    fn priority(&self) -> u8;

    /// Cheap check that `expr` can denote a sequence at all
    fn is_sequence(&self, _expr: &Expr) -> bool {
        true
    }

    fn can_build(&self, expr: &Expr) -> bool;

    /// Build the context for `expr`.
    ///
    /// Called only if `can_build()` returned true.
    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId>;

    /// Equivalent shape this one is better built as
    fn convert(&self, _expr: &Expr) -> Option<Expr> {
        None
    }
}

/// Argument `index` of a call to `method`, when `expr` is one
pub(crate) fn method_arg(expr: &Expr, method: QueryMethod, index: usize) -> Option<&Expr> {
    if expr.method() == Some(method) {
        expr.args().get(index)
    } else {
        None
    }
}

/// Registry of sequence builders (sorted by priority descending)
pub struct SequenceBuilderRegistry {
    builders: Vec<Arc<dyn SequenceBuilder>>,
}

impl Default for SequenceBuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceBuilderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            builders: Vec::new(),
        }
    }

    /// Register a builder, keeping priority order; a priority already
    /// taken is rejected
    pub fn register(&mut self, builder: Arc<dyn SequenceBuilder>) -> TranslateResult<()> {
        if let Some(existing) = self
            .builders
            .iter()
            .find(|b| b.priority() == builder.priority())
        {
            return Err(TranslateError::DuplicateBuilderPriority {
                priority: builder.priority(),
                first: existing.name(),
                second: builder.name(),
            });
        }
        self.builders.push(builder);
        self.builders
            .sort_by_key(|b| std::cmp::Reverse(b.priority()));
        Ok(())
    }

    /// First builder accepting `expr`
    pub fn find(&self, expr: &Expr) -> Option<&dyn SequenceBuilder> {
        self.builders
            .iter()
            .find(|b| b.is_sequence(expr) && b.can_build(expr))
            .map(|b| &**b)
    }

    /// Build `expr` with the first matching builder
    pub fn build(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let Some(builder) = self.find(expr) else {
            return Err(TranslateError::UnsupportedExpressionShape {
                expr: Box::new(expr.clone()),
                tried: self.builder_names(),
            });
        };
        if let Some(converted) = builder.convert(expr) {
            debug!(builder = builder.name(), "expression rewritten before build");
            return self.build(b, &converted);
        }
        debug!(builder = builder.name(), node = expr.kind_name(), "sequence builder selected");
        builder.build_sequence(b, expr)
    }

    /// Copy without the named builders
    pub fn without(&self, names: &[&str]) -> Self {
        Self {
            builders: self
                .builders
                .iter()
                .filter(|b| !names.contains(&b.name()))
                .cloned()
                .collect(),
        }
    }

    /// Get list of registered builder names, in selection order
    pub fn builder_names(&self) -> Vec<&'static str> {
        self.builders.iter().map(|b| b.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

/// Builder for ergonomic registry construction
pub struct SequenceBuilderRegistryBuilder {
    builders: Vec<Arc<dyn SequenceBuilder>>,
}

impl Default for SequenceBuilderRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceBuilderRegistryBuilder {
    pub fn new() -> Self {
        Self {
            builders: Vec::new(),
        }
    }

    /// Add a builder to the registry
    pub fn with_builder(mut self, builder: impl SequenceBuilder + 'static) -> Self {
        self.builders.push(Arc::new(builder));
        self
    }

    /// Build the registry
    pub fn build(self) -> TranslateResult<SequenceBuilderRegistry> {
        let mut registry = SequenceBuilderRegistry::new();
        for builder in self.builders {
            registry.register(builder)?;
        }
        Ok(registry)
    }
}

fn standard_builders() -> Vec<Arc<dyn SequenceBuilder>> {
    vec![
        Arc::new(MergeBuilder),
        Arc::new(InsertOrUpdateBuilder),
        Arc::new(InsertBuilder),
        Arc::new(UpdateBuilder),
        Arc::new(DeleteBuilder),
        Arc::new(SelectManyBuilder),
        Arc::new(JoinBuilder),
        Arc::new(GroupByBuilder),
        Arc::new(SelectBuilder),
        Arc::new(FilterBuilder),
        Arc::new(OrderByBuilder),
        Arc::new(TakeSkipBuilder),
        Arc::new(DistinctBuilder),
        Arc::new(ScalarSelectBuilder),
        Arc::new(ValuesBuilder),
        Arc::new(TableBuilder),
    ]
}

static STANDARD_REGISTRY: Lazy<Arc<SequenceBuilderRegistry>> = Lazy::new(|| {
    let mut builders = standard_builders();
    builders.sort_by_key(|b| std::cmp::Reverse(b.priority()));
    Arc::new(SequenceBuilderRegistry { builders })
});

/// Shared registry holding every built-in builder
pub fn standard_registry() -> Arc<SequenceBuilderRegistry> {
    Arc::clone(&STANDARD_REGISTRY)
}
