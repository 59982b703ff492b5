//! Fluent construction of query expression trees.

use super::{Expr, ExprType, JoinType, QueryMethod};
use crate::sql::SqlValue;

/// Composable query over a sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    expr: Expr,
}

impl Query {
    /// All rows of a mapped entity
    pub fn table(entity: impl Into<String>) -> Self {
        Self {
            expr: Expr::table(entity),
        }
    }

    /// Literal rows of an entity; `members` names the value columns
    pub fn rows(entity: impl Into<String>, members: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            expr: Expr::rows(entity, members, rows),
        }
    }

    /// Single-row projection without a source (`|| body`)
    pub fn scalar(body: Expr) -> Self {
        Self {
            expr: Expr::lambda(&[], body),
        }
    }

    pub fn from_expr(expr: Expr) -> Self {
        Self { expr }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    fn chain(self, method: QueryMethod, mut rest: Vec<Expr>, ty: ExprType) -> Self {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(self.expr);
        args.append(&mut rest);
        Self {
            expr: Expr::call(method, args, ty),
        }
    }

    fn same_type(&self) -> ExprType {
        self.expr.ty.clone()
    }

    /// `Where(|p| predicate)`
    pub fn filter(self, predicate: Expr) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::Where, vec![predicate], ty)
    }

    /// `Select(|p| body)`
    pub fn select(self, selector: Expr) -> Self {
        let ty = ExprType::Sequence(Box::new(selector.ty.clone()));
        self.chain(QueryMethod::Select, vec![selector], ty)
    }

    /// `SelectMany(|p| collection, |p, c| result)`
    pub fn select_many(self, collection: Expr, result: Option<Expr>) -> Self {
        let mut args = vec![collection];
        args.extend(result);
        self.chain(QueryMethod::SelectMany, args, ExprType::Sequence(Box::new(ExprType::Object)))
    }

    /// Join on a two-parameter condition, projecting with a two-parameter
    /// result selector
    pub fn join(self, inner: Query, kind: JoinType, on: Expr, result: Expr) -> Self {
        let ty = ExprType::Sequence(Box::new(result.ty.clone()));
        self.chain(QueryMethod::Join(kind), vec![inner.expr, on, result], ty)
    }

    pub fn cross_join(self, inner: Query, result: Expr) -> Self {
        self.join(inner, JoinType::Cross, Expr::null(), result)
    }

    pub fn group_by(self, key: Expr) -> Self {
        self.chain(QueryMethod::GroupBy, vec![key], ExprType::Sequence(Box::new(ExprType::Object)))
    }

    pub fn order_by(self, key: Expr) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::OrderBy, vec![key], ty)
    }

    pub fn order_by_descending(self, key: Expr) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::OrderByDescending, vec![key], ty)
    }

    pub fn then_by(self, key: Expr) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::ThenBy, vec![key], ty)
    }

    pub fn then_by_descending(self, key: Expr) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::ThenByDescending, vec![key], ty)
    }

    pub fn take(self, count: impl Into<Expr>) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::Take, vec![count.into()], ty)
    }

    pub fn skip(self, count: impl Into<Expr>) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::Skip, vec![count.into()], ty)
    }

    pub fn distinct(self) -> Self {
        let ty = self.same_type();
        self.chain(QueryMethod::Distinct, vec![], ty)
    }

    /// `EXISTS` predicate, optionally filtered
    pub fn any(self, predicate: Option<Expr>) -> Expr {
        let mut args = vec![self.expr];
        args.extend(predicate);
        Expr::call(QueryMethod::Any, args, ExprType::Bool)
    }

    /// `value IN (query)`
    pub fn contains(self, value: impl Into<Expr>) -> Expr {
        Expr::call(
            QueryMethod::Contains,
            vec![self.expr, value.into()],
            ExprType::Bool,
        )
    }

    /// `UPDATE` with a `|p| Entity { .. }` setter
    pub fn update(self, setter: Expr) -> Expr {
        Expr::call(QueryMethod::Update, vec![self.expr, setter], ExprType::Int)
    }

    /// `UPDATE` returning `|deleted, inserted| new { .. }` per row
    pub fn update_with_output(self, setter: Expr, output: Expr) -> Expr {
        let ty = ExprType::Sequence(Box::new(output.ty.clone()));
        Expr::call(
            QueryMethod::UpdateWithOutput,
            vec![self.expr, setter, output],
            ty,
        )
    }

    pub fn delete(self) -> Expr {
        Expr::call(QueryMethod::Delete, vec![self.expr], ExprType::Int)
    }

    /// `INSERT INTO target SELECT ...` with a `|p| Entity { .. }` setter
    pub fn insert_into(self, target: impl Into<String>, setter: Expr) -> Expr {
        Expr::call(
            QueryMethod::InsertFrom,
            vec![self.expr, Expr::table(target), setter],
            ExprType::Int,
        )
    }

    /// Single-row `INSERT` of a `|| Entity { .. }` setter
    pub fn insert(target: impl Into<String>, setter: Expr) -> Expr {
        Expr::call(
            QueryMethod::Insert,
            vec![Expr::table(target), setter],
            ExprType::Int,
        )
    }

    /// Upsert keyed by the target's primary key
    pub fn insert_or_update(target: impl Into<String>, insert: Expr, update: Expr) -> Expr {
        Expr::call(
            QueryMethod::InsertOrUpdate,
            vec![Expr::table(target), insert, update],
            ExprType::Int,
        )
    }
}

impl From<Query> for Expr {
    fn from(query: Query) -> Self {
        query.expr
    }
}

/// MERGE chain: target, source, match condition, then WHEN branches in
/// the order they are added
#[derive(Debug, Clone, PartialEq)]
pub struct MergeQuery {
    expr: Expr,
}

impl MergeQuery {
    pub fn into_table(target: impl Into<String>) -> Self {
        Self {
            expr: Expr::call(
                QueryMethod::Merge,
                vec![Expr::table(target), Expr::null()],
                ExprType::Unit,
            ),
        }
    }

    /// Engine hint emitted after `MERGE`
    pub fn hint(self, hint: impl Into<String>) -> Self {
        let mut args = self.expr.args().to_vec();
        if let Some(slot) = args.get_mut(1) {
            *slot = Expr::value(hint.into());
        }
        Self {
            expr: Expr::call(QueryMethod::Merge, args, ExprType::Unit),
        }
    }

    fn chain(self, method: QueryMethod, mut rest: Vec<Expr>) -> Self {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(self.expr);
        args.append(&mut rest);
        Self {
            expr: Expr::call(method, args, ExprType::Unit),
        }
    }

    pub fn using(self, source: Query) -> Self {
        self.chain(QueryMethod::Using, vec![source.into_expr()])
    }

    /// Match on `|target, source| condition`
    pub fn on(self, condition: Expr) -> Self {
        self.chain(QueryMethod::On, vec![condition])
    }

    /// Match target primary key columns against same-named source members
    pub fn on_target_key(self) -> Self {
        self.chain(QueryMethod::OnTargetKey, vec![])
    }

    /// `WHEN NOT MATCHED` with a `|source| Entity { .. }` setter
    pub fn insert_when_not_matched(self, setter: Expr) -> Self {
        self.chain(QueryMethod::InsertWhenNotMatched, vec![Expr::null(), setter])
    }

    pub fn insert_when_not_matched_and(self, predicate: Expr, setter: Expr) -> Self {
        self.chain(QueryMethod::InsertWhenNotMatched, vec![predicate, setter])
    }

    /// `WHEN MATCHED` with a `|target, source| Entity { .. }` setter
    pub fn update_when_matched(self, setter: Expr) -> Self {
        self.chain(QueryMethod::UpdateWhenMatched, vec![Expr::null(), setter])
    }

    pub fn update_when_matched_and(self, predicate: Expr, setter: Expr) -> Self {
        self.chain(QueryMethod::UpdateWhenMatched, vec![predicate, setter])
    }

    /// Update matched rows, then delete those satisfying `delete_predicate`
    pub fn update_when_matched_then_delete(
        self,
        predicate: Option<Expr>,
        setter: Expr,
        delete_predicate: Expr,
    ) -> Self {
        self.chain(
            QueryMethod::UpdateWhenMatchedThenDelete,
            vec![predicate.unwrap_or_else(Expr::null), setter, delete_predicate],
        )
    }

    pub fn delete_when_matched(self) -> Self {
        self.chain(QueryMethod::DeleteWhenMatched, vec![Expr::null()])
    }

    pub fn delete_when_matched_and(self, predicate: Expr) -> Self {
        self.chain(QueryMethod::DeleteWhenMatched, vec![predicate])
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }
}

impl From<MergeQuery> for Expr {
    fn from(merge: MergeQuery) -> Self {
        merge.expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_chain_shape() {
        let q = Query::table("Person")
            .filter(Expr::lambda1("p", |p| p.member("id").gt(3)))
            .take(10)
            .into_expr();

        assert_eq!(q.method(), Some(QueryMethod::Take));
        let source = &q.args()[0];
        assert_eq!(source.method(), Some(QueryMethod::Where));
        assert_eq!(source.args()[0], Expr::table("Person"));
    }

    #[test]
    fn test_merge_chain_shape() {
        let merge = MergeQuery::into_table("Person")
            .hint("APPEND")
            .using(Query::table("Staging"))
            .on_target_key()
            .delete_when_matched()
            .into_expr();

        assert_eq!(merge.method(), Some(QueryMethod::DeleteWhenMatched));
        assert!(merge.args()[1].is_null_constant());

        let mut link = &merge;
        while let Some(next) = link.args().first().filter(|a| a.method().is_some()) {
            link = next;
        }
        assert_eq!(link.method(), Some(QueryMethod::Merge));
        assert_eq!(link.args()[1], Expr::value("APPEND"));
    }
}
