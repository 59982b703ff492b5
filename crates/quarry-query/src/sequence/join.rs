//! Joins and flattening projections.

use super::{method_arg, SequenceBuilder};
use crate::context::{ContextId, ExpressionBuilder, SelectContext};
use crate::error::TranslateResult;
use crate::expr::{Constant, Expr, ExprKind, ExprType, JoinType, QueryMethod};
use crate::sql::{JoinKind, JoinedTable, SqlBinaryOp, SqlExpr, SqlValue};
use tracing::trace;

/// `Join(outer, inner, |o, i| condition, |o, i| result)`.
///
/// The inner source is merged into the outer query as a joined table;
/// both contexts then share the outer query.
pub struct JoinBuilder;

impl JoinBuilder {
    fn join_kind(expr: &Expr) -> Option<JoinType> {
        match expr.method() {
            Some(QueryMethod::Join(kind)) => Some(kind),
            _ => None,
        }
    }
}

impl SequenceBuilder for JoinBuilder {
    fn name(&self) -> &'static str {
        "join"
    }

    fn priority(&self) -> u8 {
        78
    }

    fn can_build(&self, expr: &Expr) -> bool {
        let args = expr.args();
        Self::join_kind(expr).is_some()
            && args.len() == 4
            && (args[2].is_null_constant() || args[2].as_lambda(2).is_some())
            && args[3].as_lambda(2).is_some()
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        let args = expr.args();
        let kind = match Self::join_kind(expr) {
            Some(JoinType::Inner) | None => JoinKind::Inner,
            Some(JoinType::Left) => JoinKind::Left,
            Some(JoinType::Cross) => JoinKind::Cross,
        };

        let mut outer = b.build_sequence(&args[0])?;
        let joinable = {
            let q = b.query(b.context(outer).query_id());
            !q.has_limit() && !q.distinct && q.group_by.is_empty() && q.having.is_none()
        };
        if !joinable {
            outer = b.wrap_in_subquery(outer)?;
        }

        let mut inner = b.build_sequence(&args[1])?;
        if !b.query(b.context(inner).query_id()).is_simple() {
            inner = b.wrap_in_subquery(inner)?;
        }

        let outer_query = b.context(outer).query_id();
        let inner_query = b.context(inner).query_id();
        let (table, inner_where) = {
            let q = b.query_mut(inner_query)?;
            (q.from.remove(0), q.where_.take())
        };
        b.freeze(inner_query);
        b.repoint_query(inner_query, outer_query);
        if kind == JoinKind::Left {
            b.context(inner).set_nullable();
        }

        let on = if args[2].is_null_constant() {
            None
        } else {
            Some(b.with_lambda(&args[2], &[outer, inner], |b, body| b.convert_expr(body))?)
        };
        let condition = match (kind, on, inner_where) {
            (JoinKind::Cross, _, Some(filter)) => {
                b.query_mut(outer_query)?.add_where(filter);
                None
            }
            (JoinKind::Cross, _, None) => None,
            (_, Some(on), Some(filter)) => Some(on.and(filter)),
            (_, on, filter) => on.or(filter),
        };
        let condition = match (kind, condition) {
            (JoinKind::Cross, _) => None,
            (_, Some(c)) => Some(c),
            (_, None) => Some(SqlExpr::binary(
                SqlExpr::Value(SqlValue::Int(1)),
                SqlBinaryOp::Equal,
                SqlExpr::Value(SqlValue::Int(1)),
            )),
        };

        trace!(kind = kind.keyword(), alias = %table.alias, "table joined");
        let query = b.query_mut(outer_query)?;
        query.from[0].joins.push(JoinedTable {
            kind,
            table,
            condition,
        });

        SelectContext::build(b, expr, vec![outer, inner], args[3].clone())
    }
}

/// `SelectMany(source, |p| collection, |p, c| result)`, rewritten into a
/// join before building.
///
/// A plain table collection becomes a cross join; a collection filtered by
/// a predicate correlated with `p` becomes an inner join on that predicate.
pub struct SelectManyBuilder;

impl SelectManyBuilder {
    fn is_source(expr: &Expr) -> bool {
        matches!(
            expr.kind,
            ExprKind::Constant(Constant::Table(_)) | ExprKind::Constant(Constant::Rows(_))
        )
    }
}

impl SequenceBuilder for SelectManyBuilder {
    fn name(&self) -> &'static str {
        "select_many"
    }

    fn priority(&self) -> u8 {
        80
    }

    fn can_build(&self, expr: &Expr) -> bool {
        self.convert(expr).is_some()
    }

    fn build_sequence(&self, b: &mut ExpressionBuilder, expr: &Expr) -> TranslateResult<ContextId> {
        match self.convert(expr) {
            Some(join) => b.build_sequence(&join),
            None => Err(b.malformed(expr, "flatten this collection")),
        }
    }

    fn convert(&self, expr: &Expr) -> Option<Expr> {
        let source = method_arg(expr, QueryMethod::SelectMany, 0)?;
        let (params, collection) = method_arg(expr, QueryMethod::SelectMany, 1)?.as_lambda(1)?;
        let outer = params[0].as_str();

        let result = match expr.args().get(2) {
            Some(result) => {
                result.as_lambda(2)?;
                result.clone()
            }
            None => {
                let inner = format!("{outer}_inner");
                Expr::lambda(&[outer, inner.as_str()], Expr::param(inner.as_str()))
            }
        };

        let (kind, inner, on) = if Self::is_source(collection) {
            (JoinType::Cross, collection.clone(), Expr::null())
        } else {
            let inner = method_arg(collection, QueryMethod::Where, 0)?;
            let (inner_params, predicate) =
                method_arg(collection, QueryMethod::Where, 1)?.as_lambda(1)?;
            if !Self::is_source(inner) || inner_params[0] == outer {
                return None;
            }
            let on = Expr::lambda(&[outer, inner_params[0].as_str()], predicate.clone());
            (JoinType::Inner, inner.clone(), on)
        };

        let ty = ExprType::Sequence(Box::new(result.ty.clone()));
        Some(Expr::call(
            QueryMethod::Join(kind),
            vec![source.clone(), inner, on, result],
            ty,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Query;

    #[test]
    fn test_select_many_table_becomes_cross_join() {
        let expr = Query::table("Person")
            .select_many(Expr::lambda1("p", |_| Expr::table("Pet")), None)
            .into_expr();

        let join = SelectManyBuilder.convert(&expr).unwrap();
        assert_eq!(join.method(), Some(QueryMethod::Join(JoinType::Cross)));
        assert_eq!(join.args()[1], Expr::table("Pet"));
        assert!(join.args()[2].is_null_constant());
        assert_eq!(join.args()[3].to_string(), "|p, p_inner| p_inner");
    }

    #[test]
    fn test_select_many_correlated_filter_becomes_inner_join() {
        let expr = Query::table("Person")
            .select_many(
                Expr::lambda1("p", |p| {
                    Query::table("Pet")
                        .filter(Expr::lambda1("x", |x| x.member("owner_id").equals(p.member("id"))))
                        .into_expr()
                }),
                None,
            )
            .into_expr();

        let join = SelectManyBuilder.convert(&expr).unwrap();
        assert_eq!(join.method(), Some(QueryMethod::Join(JoinType::Inner)));
        assert_eq!(join.args()[2].to_string(), "|p, x| (x.owner_id = p.id)");
    }

    #[test]
    fn test_select_many_other_collection_rejected() {
        let expr = Query::table("Person")
            .select_many(
                Expr::lambda1("p", |_| Query::table("Pet").take(1).into_expr()),
                None,
            )
            .into_expr();

        assert!(SelectManyBuilder.convert(&expr).is_none());
        assert!(!SelectManyBuilder.can_build(&expr));
    }
}
