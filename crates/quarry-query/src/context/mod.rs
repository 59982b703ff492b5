//! Build context graph.
//!
//! A translation call owns one [`ExpressionBuilder`]. It is the arena for
//! every build context and every select fragment created while the
//! sequence builders walk the expression tree. Contexts refer to each other
//! (and to their fragments) by id only; a context's parent is used for read
//! queries such as index translation, never to mutate the parent.
//!
//! The protocol all contexts implement is [`BuildContext`]. Paths are
//! resolved with a `level`: the number of members of a `p.a.b` path that
//! have already been consumed by outer contexts.

mod accessor;
mod convert;
mod group_by;
mod merge;
mod modify;
mod scalar;
mod select;
mod subquery;
mod table;

pub use accessor::{ResultAccessor, ResultValue};
pub use group_by::GroupByContext;
pub use merge::MergeContext;
pub use modify::{DeleteContext, InsertContext, InsertOrUpdateContext, UpdateContext};
pub use scalar::ScalarSelectContext;
pub use select::SelectContext;
pub use subquery::SubQueryContext;
pub use table::{TableContext, TableSourceKind};

use crate::error::{TranslateError, TranslateResult};
use crate::expr::Expr;
use crate::mapping::{MappingSchema, TableMapping};
use crate::sequence::SequenceBuilderRegistry;
use crate::sql::{QueryId, QueryRef, SelectQuery, SqlExpr, SqlStatement};
use once_cell::unsync::OnceCell;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// Arena id of a build context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub usize);

/// What a conversion should produce for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertFlags {
    /// The value itself; whole entities expand to all their columns
    Field,
    /// Primary key columns of an entity
    Key,
    /// Every column
    All,
}

/// Shape question asked through [`BuildContext::is_expression`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFor {
    Expression,
    Field,
    Table,
    Object,
    Group,
}

/// SQL fragment for one column of a converted path
#[derive(Debug, Clone, PartialEq)]
pub struct SqlInfo {
    pub sql: SqlExpr,
    /// Member the column was reached through
    pub member: Option<String>,
    /// Column index, once the fragment has been added to a query
    pub index: Option<usize>,
}

impl SqlInfo {
    pub fn new(sql: SqlExpr) -> Self {
        Self {
            sql,
            member: None,
            index: None,
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }
}

/// Translation switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslateOptions {
    /// `a = b` between nullable operands also matches when both are NULL
    pub compare_nulls_as_values: bool,
}

/// State shared by every context kind
pub struct ContextCore {
    id: ContextId,
    parent: Cell<Option<ContextId>>,
    query: Cell<QueryId>,
    expr: Expr,
    statement: OnceCell<Arc<SqlStatement>>,
}

impl ContextCore {
    fn new(id: ContextId, query: QueryId, expr: Expr, parent: Option<ContextId>) -> Self {
        Self {
            id,
            parent: Cell::new(parent),
            query: Cell::new(query),
            expr,
            statement: OnceCell::new(),
        }
    }
}

/// Protocol shared by every build context
pub trait BuildContext {
    fn core(&self) -> &ContextCore;

    /// Short kind name used in context paths
    fn kind(&self) -> &'static str;

    fn id(&self) -> ContextId {
        self.core().id
    }

    fn parent(&self) -> Option<ContextId> {
        self.core().parent.get()
    }

    /// Select fragment this context adds columns to
    fn query_id(&self) -> QueryId {
        self.core().query.get()
    }

    /// Expression this context was built from
    fn expression(&self) -> &Expr {
        &self.core().expr
    }

    /// Compile `expr` (or the whole context when `None`) into a result
    /// accessor, adding the columns it needs.
    fn build_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor>;

    /// SQL fragments for a path without adding columns
    fn convert_to_sql(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>>;

    /// Like [`convert_to_sql`](Self::convert_to_sql), adding each fragment
    /// as a column of this context's query
    fn convert_to_index(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        flags: ConvertFlags,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let infos = self.convert_to_sql(b, expr, level, flags)?;
        b.add_columns(self.query_id(), infos)
    }

    fn is_expression(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
        request: RequestFor,
    ) -> TranslateResult<bool>;

    /// Context responsible for the sub-path of `expr` at `level`
    fn get_context(
        &self,
        b: &mut ExpressionBuilder,
        expr: Option<&Expr>,
        level: usize,
    ) -> TranslateResult<ContextId>;

    /// Map `index`, a column of `context`'s query, to the index visible
    /// from the nearest ancestor that renumbers columns. Contexts sharing
    /// their parent's query forward unchanged.
    fn convert_to_parent_index(
        &self,
        b: &mut ExpressionBuilder,
        index: usize,
        context: ContextId,
    ) -> TranslateResult<usize> {
        match self.parent() {
            Some(parent) => {
                let parent = b.context(parent);
                parent.convert_to_parent_index(b, index, context)
            }
            None => Ok(index),
        }
    }

    fn set_alias(&self, _b: &mut ExpressionBuilder, _alias: &str) -> TranslateResult<()> {
        Ok(())
    }

    /// Expression embedding this context's query in an enclosing one
    fn get_sub_query(&self, _b: &mut ExpressionBuilder) -> Option<SqlExpr> {
        Some(SqlExpr::SubQuery(QueryRef::Pending(self.query_id())))
    }

    /// Runs once before the statement is created
    fn complete_columns(&self, b: &mut ExpressionBuilder) -> TranslateResult<()> {
        b.query_mut(self.query_id())?.ensure_column();
        Ok(())
    }

    fn create_statement(&self, b: &mut ExpressionBuilder) -> TranslateResult<SqlStatement> {
        Ok(SqlStatement::Select(b.materialize(self.query_id())?))
    }

    /// Final statement; built and frozen on the first call, then the same
    /// instance on every later call
    fn get_result_statement(
        &self,
        b: &mut ExpressionBuilder,
    ) -> TranslateResult<Arc<SqlStatement>> {
        if let Some(statement) = self.core().statement.get() {
            return Ok(Arc::clone(statement));
        }
        self.complete_columns(b)?;
        let statement = Arc::new(self.create_statement(b)?);
        b.freeze(self.query_id());
        debug!(context = %b.context_path(self.id()), kind = statement.kind(), "statement created");
        Ok(Arc::clone(
            self.core().statement.get_or_init(|| statement),
        ))
    }

    /// Filters over this context go to HAVING
    fn is_grouping(&self) -> bool {
        false
    }

    /// Whether the statement produces rows read through an accessor
    fn returns_rows(&self) -> bool {
        true
    }

    fn as_table(&self) -> Option<&TableContext> {
        None
    }

    /// Columns become nullable (outer-joined side)
    fn set_nullable(&self) {}
}

struct QuerySlot {
    query: SelectQuery,
    frozen: bool,
}

/// Arena and scope stack for one translation call
pub struct ExpressionBuilder {
    registry: Arc<SequenceBuilderRegistry>,
    schema: Arc<MappingSchema>,
    options: TranslateOptions,
    contexts: Vec<Rc<dyn BuildContext>>,
    queries: Vec<QuerySlot>,
    scopes: Vec<(String, ContextId)>,
    table_aliases: usize,
}

impl ExpressionBuilder {
    pub fn new(
        registry: Arc<SequenceBuilderRegistry>,
        schema: Arc<MappingSchema>,
        options: TranslateOptions,
    ) -> Self {
        Self {
            registry,
            schema,
            options,
            contexts: Vec::new(),
            queries: Vec::new(),
            scopes: Vec::new(),
            table_aliases: 0,
        }
    }

    pub fn options(&self) -> TranslateOptions {
        self.options
    }

    pub fn schema(&self) -> Arc<MappingSchema> {
        Arc::clone(&self.schema)
    }

    pub fn table_mapping(&self, entity: &str) -> TranslateResult<TableMapping> {
        self.schema
            .table(entity)
            .cloned()
            .ok_or_else(|| TranslateError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    /// Build the context for a sequence expression through the registry
    pub fn build_sequence(&mut self, expr: &Expr) -> TranslateResult<ContextId> {
        let registry = Arc::clone(&self.registry);
        registry.build(self, expr)
    }

    // ========================================================================
    // Arena
    // ========================================================================

    pub fn new_query(&mut self, query: SelectQuery) -> QueryId {
        self.queries.push(QuerySlot {
            query,
            frozen: false,
        });
        QueryId(self.queries.len() - 1)
    }

    pub fn query(&self, id: QueryId) -> &SelectQuery {
        &self.queries[id.0].query
    }

    pub fn query_mut(&mut self, id: QueryId) -> TranslateResult<&mut SelectQuery> {
        let slot = &mut self.queries[id.0];
        if slot.frozen {
            return Err(TranslateError::ContextFrozen {
                context: format!("Query#{}", id.0),
            });
        }
        Ok(&mut slot.query)
    }

    pub fn is_frozen(&self, id: QueryId) -> bool {
        self.queries[id.0].frozen
    }

    pub fn next_table_alias(&mut self) -> String {
        self.table_aliases += 1;
        format!("t{}", self.table_aliases)
    }

    /// Register a context built by `make` around a fresh core
    pub fn add_context<C: BuildContext + 'static>(
        &mut self,
        query: QueryId,
        expr: &Expr,
        parent: Option<ContextId>,
        make: impl FnOnce(ContextCore) -> C,
    ) -> ContextId {
        let id = ContextId(self.contexts.len());
        let context = make(ContextCore::new(id, query, expr.clone(), parent));
        trace!(kind = context.kind(), id = id.0, query = query.0, "context created");
        self.contexts.push(Rc::new(context));
        id
    }

    pub fn context(&self, id: ContextId) -> Rc<dyn BuildContext> {
        Rc::clone(&self.contexts[id.0])
    }

    pub fn set_parent(&self, child: ContextId, parent: Option<ContextId>) {
        self.contexts[child.0].core().parent.set(parent);
    }

    /// Move every context using `from` over to `to`
    pub fn repoint_query(&self, from: QueryId, to: QueryId) {
        for context in &self.contexts {
            if context.query_id() == from {
                context.core().query.set(to);
            }
        }
    }

    /// `Kind#id > ...` from the root down to `id`
    pub fn context_path(&self, id: ContextId) -> String {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            let context = &self.contexts[cid.0];
            chain.push(format!("{}#{}", context.kind(), cid.0));
            current = context.parent();
        }
        chain.reverse();
        chain.join(" > ")
    }

    /// Add fragments as columns of `query`, recording their indices
    pub fn add_columns(
        &mut self,
        query: QueryId,
        infos: Vec<SqlInfo>,
    ) -> TranslateResult<Vec<SqlInfo>> {
        let query = self.query_mut(query)?;
        Ok(infos
            .into_iter()
            .map(|mut info| {
                info.index = Some(query.add_column(info.sql.clone()));
                info
            })
            .collect())
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Run `f` with lambda parameters bound to contexts
    pub fn with_scope<T>(
        &mut self,
        bindings: Vec<(String, ContextId)>,
        f: impl FnOnce(&mut Self) -> TranslateResult<T>,
    ) -> TranslateResult<T> {
        for (i, (name, context)) in bindings.iter().enumerate() {
            if bindings[..i].iter().any(|(other, _)| other == name) {
                return Err(TranslateError::AmbiguousColumnReference {
                    expr: Box::new(Expr::param(name.as_str())),
                    context: self.context_path(*context),
                    candidates: 2,
                });
            }
        }
        let depth = self.scopes.len();
        self.scopes.extend(bindings);
        let result = f(self);
        self.scopes.truncate(depth);
        result
    }

    /// Bind the parameters of `lambda` to `sources` and run `f` on its body
    pub fn with_lambda<T>(
        &mut self,
        lambda: &Expr,
        sources: &[ContextId],
        f: impl FnOnce(&mut Self, &Expr) -> TranslateResult<T>,
    ) -> TranslateResult<T> {
        let (params, body) = self.lambda_parts(lambda, sources.len())?;
        let bindings = params.iter().cloned().zip(sources.iter().copied()).collect();
        self.with_scope(bindings, |b| f(b, body))
    }

    pub fn lambda_parts<'e>(
        &self,
        lambda: &'e Expr,
        arity: usize,
    ) -> TranslateResult<(&'e [String], &'e Expr)> {
        lambda
            .as_lambda(arity)
            .ok_or_else(|| TranslateError::TranslationNotImplemented {
                expr: Box::new(lambda.clone()),
                level: 0,
                context: "ExpressionBuilder".to_string(),
                operation: "bind a lambda of this arity",
            })
    }

    /// Innermost context bound to a lambda parameter
    pub fn resolve_param(&self, name: &str) -> Option<ContextId> {
        self.scopes
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, context)| *context)
    }

    /// Context bound to the root parameter of a `p.a.b` path
    pub fn path_context(&self, expr: &Expr) -> TranslateResult<Option<ContextId>> {
        match expr.member_path() {
            Some((name, _)) => self
                .resolve_param(name)
                .map(Some)
                .ok_or_else(|| TranslateError::UnboundParameter {
                    name: name.to_string(),
                    expr: Box::new(expr.clone()),
                }),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub fn not_implemented(
        &self,
        context: ContextId,
        expr: Option<&Expr>,
        level: usize,
        operation: &'static str,
    ) -> TranslateError {
        let expr = expr
            .cloned()
            .unwrap_or_else(|| self.contexts[context.0].expression().clone());
        TranslateError::TranslationNotImplemented {
            expr: Box::new(expr),
            level,
            context: self.context_path(context),
            operation,
        }
    }

    pub fn ambiguous(&self, context: ContextId, expr: &Expr, candidates: usize) -> TranslateError {
        TranslateError::AmbiguousColumnReference {
            expr: Box::new(expr.clone()),
            context: self.context_path(context),
            candidates,
        }
    }

    // ========================================================================
    // Freezing
    // ========================================================================

    /// Owned copy of `id` with every nested query resolved; all touched
    /// queries are frozen
    pub fn materialize(&mut self, id: QueryId) -> TranslateResult<SelectQuery> {
        let mut query = self.query(id).clone();
        query.ensure_column();
        let mut result = Ok(());
        query.for_each_query_mut(&mut |nested| {
            if result.is_err() {
                return;
            }
            if let QueryRef::Pending(nested_id) = nested {
                match self.materialize(*nested_id) {
                    Ok(resolved) => *nested = QueryRef::Resolved(Box::new(resolved)),
                    Err(e) => result = Err(e),
                }
            }
        });
        result?;
        self.freeze(id);
        Ok(query)
    }

    /// Resolve every pending subquery of a statement
    pub fn finish_statement(&mut self, mut statement: SqlStatement) -> TranslateResult<SqlStatement> {
        let mut result = Ok(());
        statement.for_each_query_mut(&mut |nested| {
            if result.is_err() {
                return;
            }
            if let QueryRef::Pending(nested_id) = nested {
                match self.materialize(*nested_id) {
                    Ok(resolved) => *nested = QueryRef::Resolved(Box::new(resolved)),
                    Err(e) => result = Err(e),
                }
            }
        });
        result.map(|_| statement)
    }

    pub fn freeze(&mut self, id: QueryId) {
        if !self.queries[id.0].frozen {
            trace!(query = id.0, "query frozen");
            self.queries[id.0].frozen = true;
        }
    }

    /// Wrap a context whose query cannot take more clauses in place
    pub fn wrap_in_subquery(&mut self, child: ContextId) -> TranslateResult<ContextId> {
        SubQueryContext::wrap(self, child)
    }
}

/// Unconsumed members of `expr`'s path at `level`
pub(crate) fn path_tail<'e>(
    b: &ExpressionBuilder,
    context: ContextId,
    expr: Option<&'e Expr>,
    level: usize,
) -> TranslateResult<Vec<&'e str>> {
    let Some(expr) = expr else {
        return Ok(Vec::new());
    };
    match expr.member_path() {
        Some((_, path)) => Ok(path.into_iter().skip(level).collect()),
        None => Err(b.not_implemented(context, Some(expr), level, "resolve a non-member path")),
    }
}

#[cfg(test)]
mod tests;
