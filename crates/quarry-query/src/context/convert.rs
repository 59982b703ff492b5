//! Expression-to-SQL conversion inside the current lambda scopes.

use super::{ContextId, ConvertFlags, ExpressionBuilder, RequestFor, ResultAccessor, SqlInfo};
use crate::error::{TranslateError, TranslateResult};
use crate::expr::{Callee, Constant, Expr, ExprKind, ParameterRef, QueryMethod, UnaryOp};
use crate::sql::{
    QueryId, QueryRef, SqlBinaryOp, SqlExpr, SqlFunction, SqlParameter, SqlUnaryOp, SqlValue,
};
use tracing::trace;

impl ExpressionBuilder {
    /// Convert `expr` into one fragment per produced column.
    ///
    /// Constructed objects expand member by member and whole entities
    /// expand to their columns.
    pub fn convert_infos(&mut self, expr: &Expr, flags: ConvertFlags) -> TranslateResult<Vec<SqlInfo>> {
        if let Some(members) = expr.constructed_members() {
            let mut infos = Vec::new();
            for (name, member) in members {
                for info in self.convert_infos(member, flags)? {
                    infos.push(match info.member {
                        Some(_) => info,
                        None => info.with_member(name.clone()),
                    });
                }
            }
            return Ok(infos);
        }
        if let Some(reduced) = expr.reduce_member_access() {
            return self.convert_infos(reduced, flags);
        }
        if let Some(id) = self.path_context(expr)? {
            let context = self.context(id);
            return context.convert_to_sql(self, Some(expr), 0, flags);
        }
        if let ExprKind::MemberAccess { .. } = expr.kind {
            return Err(TranslateError::TranslationNotImplemented {
                expr: Box::new(expr.clone()),
                level: 0,
                context: "ExpressionBuilder".to_string(),
                operation: "resolve a member of a non-path expression",
            });
        }
        Ok(vec![SqlInfo::new(self.convert_expr(expr)?)])
    }

    /// Convert `expr` into exactly one SQL scalar
    pub fn convert_expr(&mut self, expr: &Expr) -> TranslateResult<SqlExpr> {
        trace!(expr = %expr, "convert");
        match &expr.kind {
            ExprKind::Constant(Constant::Value(v)) => Ok(SqlExpr::Value(v.clone())),
            ExprKind::Parameter(ParameterRef::Query { name, value }) => {
                Ok(SqlExpr::Parameter(SqlParameter {
                    name: name.clone(),
                    value: value.clone(),
                    inline: false,
                }))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.convert_expr(operand)?;
                Ok(SqlExpr::unary(
                    match op {
                        UnaryOp::Not => SqlUnaryOp::Not,
                        UnaryOp::Negate => SqlUnaryOp::Negate,
                    },
                    operand,
                ))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.convert_expr(left)?;
                let right = self.convert_expr(right)?;
                Ok(self.compare(op.to_sql(), left, right))
            }
            ExprKind::Call {
                callee: Callee::Function(id),
                args,
            } => self.convert_function(id, args),
            ExprKind::Call {
                callee: Callee::Method(QueryMethod::Any),
                args,
            } => self.convert_any(expr, args),
            ExprKind::Call {
                callee: Callee::Method(QueryMethod::Contains),
                args,
            } => self.convert_contains(expr, args),
            ExprKind::Call { .. } => {
                let (_, query) = self.single_column_subquery(expr)?;
                Ok(SqlExpr::SubQuery(QueryRef::Pending(query)))
            }
            _ => {
                let infos = self.convert_infos(expr, ConvertFlags::Field)?;
                if infos.len() != 1 {
                    return Err(TranslateError::AmbiguousColumnReference {
                        expr: Box::new(expr.clone()),
                        context: self.scope_description(expr),
                        candidates: infos.len(),
                    });
                }
                Ok(infos.into_iter().map(|i| i.sql).next().unwrap_or(SqlExpr::Value(SqlValue::Null)))
            }
        }
    }

    fn scope_description(&self, expr: &Expr) -> String {
        match self.path_context(expr) {
            Ok(Some(id)) => self.context_path(id),
            _ => "ExpressionBuilder".to_string(),
        }
    }

    /// Binary operator with NULL-literal and null-as-value rewrites
    fn compare(&self, op: SqlBinaryOp, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        let is_null = |e: &SqlExpr| matches!(e, SqlExpr::Value(SqlValue::Null));
        let test = match op {
            SqlBinaryOp::Equal => Some(SqlUnaryOp::IsNull),
            SqlBinaryOp::NotEqual => Some(SqlUnaryOp::IsNotNull),
            _ => None,
        };
        let Some(test) = test else {
            return SqlExpr::binary(left, op, right);
        };
        if is_null(&right) {
            return SqlExpr::unary(test, left);
        }
        if is_null(&left) {
            return SqlExpr::unary(test, right);
        }
        if !self.options.compare_nulls_as_values || !left.can_be_null() || !right.can_be_null() {
            return SqlExpr::binary(left, op, right);
        }

        let compared = SqlExpr::binary(left.clone(), op, right.clone());
        let l_null = SqlExpr::unary(SqlUnaryOp::IsNull, left.clone());
        let r_null = SqlExpr::unary(SqlUnaryOp::IsNull, right.clone());
        match op {
            SqlBinaryOp::Equal => compared.or(l_null.and(r_null)),
            _ => {
                let l_set = SqlExpr::unary(SqlUnaryOp::IsNotNull, left);
                let r_set = SqlExpr::unary(SqlUnaryOp::IsNotNull, right);
                compared.or(l_null.and(r_set)).or(l_set.and(r_null))
            }
        }
    }

    fn convert_function(&mut self, id: &str, args: &[Expr]) -> TranslateResult<SqlExpr> {
        let metadata = self
            .schema
            .function(id)
            .cloned()
            .ok_or_else(|| TranslateError::UnknownFunction {
                function: id.to_string(),
            })?;

        let mut sql_args = Vec::with_capacity(args.len());
        let group = match args.first() {
            Some(first) if metadata.is_aggregate => self.grouping_context(first)?,
            _ => None,
        };
        match (group, args.split_first()) {
            (Some(group), Some((first, rest))) => {
                let context = self.context(group);
                let element = context.get_context(self, Some(first), 0)?;
                for arg in rest {
                    let sql = match arg.as_lambda(1) {
                        Some(_) => self.with_lambda(arg, &[element], |b, body| b.convert_expr(body))?,
                        None => self.convert_expr(arg)?,
                    };
                    sql_args.push(sql);
                }
            }
            _ => {
                for arg in args {
                    sql_args.push(self.convert_expr(arg)?);
                }
            }
        }

        if let Some(indices) = &metadata.arg_indices {
            let invalid = || TranslateError::InvalidFunctionMetadata {
                function: id.to_string(),
                expected: indices.len(),
                actual: sql_args.len(),
            };
            if indices.len() != sql_args.len() {
                return Err(invalid());
            }
            sql_args = indices
                .iter()
                .map(|&i| sql_args.get(i).cloned().ok_or_else(invalid))
                .collect::<TranslateResult<Vec<_>>>()?;
        }
        if metadata.inline_parameters {
            for arg in &mut sql_args {
                if let SqlExpr::Parameter(p) = arg {
                    p.inline = true;
                }
            }
        }

        let nulls: Vec<bool> = sql_args.iter().map(SqlExpr::can_be_null).collect();
        Ok(SqlExpr::Function(SqlFunction {
            can_be_null: metadata.result_can_be_null(&nulls),
            name: metadata.name,
            args: sql_args,
            precedence: metadata.precedence,
            is_predicate: metadata.is_predicate,
            is_aggregate: metadata.is_aggregate,
            is_window_function: metadata.is_window_function,
            is_pure: metadata.is_pure,
        }))
    }

    /// Grouping context bound to a bare lambda parameter
    fn grouping_context(&self, expr: &Expr) -> TranslateResult<Option<ContextId>> {
        match expr.member_path() {
            Some((_, path)) if path.is_empty() => {
                let id = self.path_context(expr)?;
                Ok(id.filter(|id| self.context(*id).is_grouping()))
            }
            _ => Ok(None),
        }
    }

    fn convert_any(&mut self, expr: &Expr, args: &[Expr]) -> TranslateResult<SqlExpr> {
        let Some(source) = args.first() else {
            return Err(self.malformed(expr, "Any without a source"));
        };
        let mut context = self.build_sequence(source)?;
        if let Some(predicate) = args.get(1) {
            context = self.filter_sequence(context, predicate)?;
        }
        let ctx = self.context(context);
        match ctx.get_sub_query(self) {
            Some(SqlExpr::SubQuery(query)) => Ok(SqlExpr::Exists(query)),
            _ => Err(self.not_implemented(context, Some(expr), 0, "embed as EXISTS")),
        }
    }

    fn convert_contains(&mut self, expr: &Expr, args: &[Expr]) -> TranslateResult<SqlExpr> {
        let (Some(source), Some(value)) = (args.first(), args.get(1)) else {
            return Err(self.malformed(expr, "Contains needs a source and a value"));
        };
        let value = self.convert_expr(value)?;
        let (_, query) = self.single_column_subquery(source)?;
        Ok(SqlExpr::In {
            expr: Box::new(value),
            query: QueryRef::Pending(query),
        })
    }

    /// Build `expr` as a nested sequence projecting exactly one column
    fn single_column_subquery(&mut self, expr: &Expr) -> TranslateResult<(ContextId, QueryId)> {
        let context = self.build_sequence(expr)?;
        let ctx = self.context(context);
        let infos = ctx.convert_to_index(self, None, 0, ConvertFlags::Field)?;
        if infos.len() != 1 {
            return Err(self.ambiguous(context, expr, infos.len()));
        }
        match ctx.get_sub_query(self) {
            Some(SqlExpr::SubQuery(QueryRef::Pending(query))) => Ok((context, query)),
            _ => Err(self.not_implemented(context, Some(expr), 0, "embed as a subquery")),
        }
    }

    pub(crate) fn malformed(&self, expr: &Expr, operation: &'static str) -> TranslateError {
        TranslateError::TranslationNotImplemented {
            expr: Box::new(expr.clone()),
            level: 0,
            context: "ExpressionBuilder".to_string(),
            operation,
        }
    }

    /// Accessor for `expr`, adding the columns it needs to `query`.
    ///
    /// Constants and query parameters inside constructed objects stay on
    /// the client unless `enforce_server_side` is set.
    pub fn build_accessor(
        &mut self,
        expr: &Expr,
        query: QueryId,
        enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        match &expr.kind {
            ExprKind::New { .. } | ExprKind::MemberInit { .. } => {
                let type_name = match &expr.kind {
                    ExprKind::MemberInit { type_name, .. } => Some(type_name.clone()),
                    _ => None,
                };
                let mut members = Vec::new();
                for (name, member) in expr.constructed_members().unwrap_or_default() {
                    let accessor = self.build_member_accessor(member, query, enforce_server_side)?;
                    members.push((name.clone(), accessor));
                }
                return Ok(ResultAccessor::Object { type_name, members });
            }
            _ => {}
        }
        if let Some(reduced) = expr.reduce_member_access() {
            return self.build_accessor(reduced, query, enforce_server_side);
        }
        if let Some(id) = self.path_context(expr)? {
            let context = self.context(id);
            let accessor = context.build_expression(self, Some(expr), 0, enforce_server_side)?;
            if context.query_id() == query {
                return Ok(accessor);
            }
            return accessor.try_map_indices(&mut |i| context.convert_to_parent_index(self, i, id));
        }
        let sql = self.convert_expr(expr)?;
        let index = self.query_mut(query)?.add_column(sql);
        Ok(ResultAccessor::Column {
            index,
            ty: expr.ty.clone(),
        })
    }

    fn build_member_accessor(
        &mut self,
        member: &Expr,
        query: QueryId,
        enforce_server_side: bool,
    ) -> TranslateResult<ResultAccessor> {
        if !enforce_server_side {
            match &member.kind {
                ExprKind::Constant(Constant::Value(v)) => return Ok(ResultAccessor::Value(v.clone())),
                ExprKind::Parameter(ParameterRef::Query { value, .. }) => {
                    return Ok(ResultAccessor::Value(value.clone()))
                }
                _ => {}
            }
        }
        self.build_accessor(member, query, enforce_server_side)
    }

    /// Apply `|p| predicate` to `source`: HAVING over a grouping, WHERE
    /// otherwise. A paged or distinct source is wrapped first.
    pub fn filter_sequence(&mut self, source: ContextId, predicate: &Expr) -> TranslateResult<ContextId> {
        let mut source = source;
        let query = self.query(self.context(source).query_id());
        if query.has_limit() || query.distinct {
            source = self.wrap_in_subquery(source)?;
        }
        let context = self.context(source);
        let condition = self.with_lambda(predicate, &[source], |b, body| b.convert_expr(body))?;
        if context.is_grouping() {
            self.query_mut(context.query_id())?.add_having(condition);
        } else {
            if condition.contains_aggregate() {
                return Err(self.not_implemented(source, Some(predicate), 0, "filter on an aggregate"));
            }
            self.query_mut(context.query_id())?.add_where(condition);
        }
        Ok(source)
    }

    /// Shape question for an expression in the current scopes
    pub fn is_expression_of(&mut self, expr: &Expr, request: RequestFor) -> TranslateResult<bool> {
        if expr.constructed_members().is_some() {
            return Ok(request == RequestFor::Object);
        }
        if let Some(reduced) = expr.reduce_member_access() {
            return self.is_expression_of(reduced, request);
        }
        if let Some(id) = self.path_context(expr)? {
            let context = self.context(id);
            return context.is_expression(self, Some(expr), 0, request);
        }
        Ok(matches!(request, RequestFor::Expression | RequestFor::Field))
    }
}
