//! SELECT query fragments.

use super::{QueryRef, SqlExpr, SqlValue};
use crate::mapping::ObjectName;
use serde::{Deserialize, Serialize};

/// Projected column; position defines the result-row mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

/// Mapped physical table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlTable {
    pub name: ObjectName,
    pub entity: String,
}

/// Literal row source (`VALUES` or its substitute)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlExpr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlSource {
    Table(SqlTable),
    Values(ValuesTable),
    SubQuery(QueryRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Cross,
}

impl JoinKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedTable {
    pub kind: JoinKind,
    pub table: TableSource,
    pub condition: Option<SqlExpr>,
}

/// FROM item with its alias and joins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub source: SqlSource,
    pub alias: String,
    pub joins: Vec<JoinedTable>,
}

impl TableSource {
    pub fn new(source: SqlSource, alias: impl Into<String>) -> Self {
        Self {
            source,
            alias: alias.into(),
            joins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: SqlExpr,
    pub descending: bool,
}

/// SELECT fragment owned by one build context while translating
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub columns: Vec<SelectColumn>,
    pub distinct: bool,
    pub from: Vec<TableSource>,
    pub where_: Option<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub having: Option<SqlExpr>,
    pub order_by: Vec<OrderItem>,
    pub take: Option<SqlExpr>,
    pub skip: Option<SqlExpr>,
}

impl SelectQuery {
    pub fn from_source(source: TableSource) -> Self {
        Self {
            from: vec![source],
            ..Default::default()
        }
    }

    /// Append a column, reusing a structurally equal pure one.
    pub fn add_column(&mut self, expr: SqlExpr) -> usize {
        if expr.is_pure() {
            if let Some(idx) = self.columns.iter().position(|c| c.expr == expr) {
                return idx;
            }
        }
        self.columns.push(SelectColumn { expr, alias: None });
        self.columns.len() - 1
    }

    /// Alias of column `index`, assigned on first request and kept unique
    /// within this query.
    pub fn column_alias(&mut self, index: usize, hint: Option<&str>) -> String {
        if let Some(alias) = &self.columns[index].alias {
            return alias.clone();
        }
        let base = match (hint, &self.columns[index].expr) {
            (Some(h), _) => h.to_string(),
            (None, SqlExpr::Column(c)) => c.name.clone(),
            (None, _) => format!("c{}", index + 1),
        };
        let mut alias = base.clone();
        let mut n = 1;
        while self
            .columns
            .iter()
            .any(|c| c.alias.as_deref() == Some(alias.as_str()))
        {
            alias = format!("{}_{}", base, n);
            n += 1;
        }
        self.columns[index].alias = Some(alias.clone());
        alias
    }

    pub fn add_where(&mut self, condition: SqlExpr) {
        self.where_ = Some(match self.where_.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
    }

    pub fn add_having(&mut self, condition: SqlExpr) {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
    }

    pub fn has_filter(&self) -> bool {
        self.where_.is_some()
    }

    pub fn has_limit(&self) -> bool {
        self.take.is_some() || self.skip.is_some()
    }

    /// Single source, no joins and no clause that changes row shape
    pub fn is_simple(&self) -> bool {
        self.from.len() == 1
            && self.from[0].joins.is_empty()
            && !self.distinct
            && !self.has_limit()
            && self.group_by.is_empty()
            && self.having.is_none()
            && self.order_by.is_empty()
    }

    /// Guarantee at least one projected column
    pub fn ensure_column(&mut self) {
        if self.columns.is_empty() {
            self.columns.push(SelectColumn {
                expr: SqlExpr::Value(SqlValue::Int(1)),
                alias: None,
            });
        }
    }

    /// Visit every nested query reference in every clause
    pub fn for_each_query_mut(&mut self, visit: &mut dyn FnMut(&mut QueryRef)) {
        fn source(ts: &mut TableSource, visit: &mut dyn FnMut(&mut QueryRef)) {
            if let SqlSource::SubQuery(q) = &mut ts.source {
                visit(q);
            }
            for join in &mut ts.joins {
                source(&mut join.table, visit);
                if let Some(c) = &mut join.condition {
                    c.for_each_query_mut(visit);
                }
            }
        }

        for c in &mut self.columns {
            c.expr.for_each_query_mut(visit);
        }
        for ts in &mut self.from {
            source(ts, visit);
        }
        if let Some(w) = &mut self.where_ {
            w.for_each_query_mut(visit);
        }
        if let Some(h) = &mut self.having {
            h.for_each_query_mut(visit);
        }
        for g in &mut self.group_by {
            g.for_each_query_mut(visit);
        }
        for o in &mut self.order_by {
            o.expr.for_each_query_mut(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{SqlBinaryOp, SqlFunction};

    fn table(name: &str) -> TableSource {
        TableSource::new(
            SqlSource::Table(SqlTable {
                name: ObjectName::new(name),
                entity: name.to_string(),
            }),
            "t1",
        )
    }

    #[test]
    fn test_add_column_deduplicates() {
        let mut query = SelectQuery::from_source(table("people"));
        let a = query.add_column(SqlExpr::column("t1", "id"));
        let b = query.add_column(SqlExpr::column("t1", "name"));
        let c = query.add_column(SqlExpr::column("t1", "id"));

        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(c, 0);
        assert_eq!(query.columns.len(), 2);
    }

    #[test]
    fn test_impure_columns_are_not_deduplicated() {
        let random = SqlExpr::Function(SqlFunction {
            name: ObjectName::new("RANDOM"),
            args: vec![],
            precedence: 100,
            is_predicate: false,
            is_aggregate: false,
            is_window_function: false,
            is_pure: false,
            can_be_null: false,
        });
        let mut query = SelectQuery::default();
        assert_eq!(query.add_column(random.clone()), 0);
        assert_eq!(query.add_column(random), 1);
    }

    #[test]
    fn test_column_alias_is_unique() {
        let mut query = SelectQuery::default();
        query.add_column(SqlExpr::column("t1", "id"));
        query.add_column(SqlExpr::column("t2", "id"));
        query.add_column(SqlExpr::binary(
            SqlExpr::column("t1", "id"),
            SqlBinaryOp::Add,
            SqlExpr::Value(SqlValue::Int(1)),
        ));

        assert_eq!(query.column_alias(0, None), "id");
        assert_eq!(query.column_alias(1, None), "id_1");
        assert_eq!(query.column_alias(2, None), "c3");
        assert_eq!(query.column_alias(0, Some("other")), "id");
    }

    #[test]
    fn test_add_where_combines_with_and() {
        let mut query = SelectQuery::from_source(table("people"));
        query.add_where(SqlExpr::column("t1", "a"));
        query.add_where(SqlExpr::column("t1", "b"));

        assert!(matches!(
            query.where_,
            Some(SqlExpr::Binary {
                op: SqlBinaryOp::And,
                ..
            })
        ));
        assert!(query.is_simple());
    }
}
