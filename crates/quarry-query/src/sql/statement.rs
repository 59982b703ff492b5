//! Top-level statements.

use super::{QueryRef, SelectQuery, SqlExpr, SqlSource, SqlTable, TableSource, ValuesTable};
use serde::{Deserialize, Serialize};

/// `column = value` assignment, also used for INSERT column/value pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItem {
    pub column: String,
    pub value: SqlExpr,
}

impl SetItem {
    pub fn new(column: impl Into<String>, value: SqlExpr) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InsertSource {
    /// Single `VALUES (...)` row built from the item values
    Values,
    /// `INSERT ... SELECT`; column `i` of the query feeds item `i`
    Query(Box<SelectQuery>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub table: SqlTable,
    pub items: Vec<SetItem>,
    pub source: InsertSource,
}

/// Projected item of an UPDATE output clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputItem {
    pub expr: SqlExpr,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub table: SqlTable,
    pub alias: String,
    pub items: Vec<SetItem>,
    pub where_: Option<SqlExpr>,
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub table: SqlTable,
    pub alias: String,
    pub where_: Option<SqlExpr>,
}

/// Upsert keyed by the primary key columns of the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOrUpdateStatement {
    pub table: SqlTable,
    pub alias: String,
    pub keys: Vec<String>,
    pub insert: Vec<SetItem>,
    pub update: Vec<SetItem>,
}

impl InsertOrUpdateStatement {
    /// Equivalent MERGE against a single-row literal source.
    ///
    /// Insert values move into the source row; the target is matched on
    /// the key columns.
    pub fn to_merge(&self) -> MergeStatement {
        let source = ValuesTable {
            columns: self.insert.iter().map(|i| i.column.clone()).collect(),
            rows: vec![self.insert.iter().map(|i| i.value.clone()).collect()],
        };
        let on = self
            .keys
            .iter()
            .map(|key| {
                SqlExpr::binary(
                    SqlExpr::column(MergeStatement::TARGET_ALIAS, key.as_str()),
                    super::SqlBinaryOp::Equal,
                    SqlExpr::column(MergeStatement::SOURCE_ALIAS, key.as_str()),
                )
            })
            .reduce(SqlExpr::and)
            .unwrap_or(SqlExpr::Value(super::SqlValue::Bool(false)));

        let mut operations = Vec::new();
        if !self.update.is_empty() {
            operations.push(MergeOperationClause::Update {
                items: self
                    .update
                    .iter()
                    .map(|i| SetItem::new(i.column.clone(), retarget(&i.value, &self.alias)))
                    .collect(),
                where_: None,
            });
        }
        operations.push(MergeOperationClause::Insert {
            items: self
                .insert
                .iter()
                .map(|i| {
                    SetItem::new(
                        i.column.clone(),
                        SqlExpr::column(MergeStatement::SOURCE_ALIAS, i.column.as_str()),
                    )
                })
                .collect(),
            where_: None,
        });

        MergeStatement {
            target: self.table.clone(),
            source: TableSource::new(SqlSource::Values(source), MergeStatement::SOURCE_ALIAS),
            on,
            operations,
            hint: None,
        }
    }
}

/// Rewrite columns of `alias` to the merge target alias
fn retarget(expr: &SqlExpr, alias: &str) -> SqlExpr {
    match expr {
        SqlExpr::Column(c) if c.table == alias => {
            let mut c = c.clone();
            c.table = MergeStatement::TARGET_ALIAS.to_string();
            SqlExpr::Column(c)
        }
        SqlExpr::Unary { op, operand } => SqlExpr::unary(*op, retarget(operand, alias)),
        SqlExpr::Binary { left, op, right } => {
            SqlExpr::binary(retarget(left, alias), *op, retarget(right, alias))
        }
        SqlExpr::Function(f) => {
            let mut f = f.clone();
            f.args = f.args.iter().map(|a| retarget(a, alias)).collect();
            SqlExpr::Function(f)
        }
        other => other.clone(),
    }
}

/// One WHEN branch of a MERGE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeOperationClause {
    Insert {
        items: Vec<SetItem>,
        where_: Option<SqlExpr>,
    },
    Update {
        items: Vec<SetItem>,
        where_: Option<SqlExpr>,
    },
    UpdateWithDelete {
        items: Vec<SetItem>,
        where_: Option<SqlExpr>,
        where_delete: Option<SqlExpr>,
    },
    Delete {
        where_: Option<SqlExpr>,
    },
}

impl MergeOperationClause {
    pub fn name(&self) -> &'static str {
        match self {
            MergeOperationClause::Insert { .. } => "Insert",
            MergeOperationClause::Update { .. } => "Update",
            MergeOperationClause::UpdateWithDelete { .. } => "UpdateWithDelete",
            MergeOperationClause::Delete { .. } => "Delete",
        }
    }

    pub fn filter(&self) -> Option<&SqlExpr> {
        match self {
            MergeOperationClause::Insert { where_, .. }
            | MergeOperationClause::Update { where_, .. }
            | MergeOperationClause::UpdateWithDelete { where_, .. }
            | MergeOperationClause::Delete { where_ } => where_.as_ref(),
        }
    }

    pub fn has_filter(&self) -> bool {
        self.filter().is_some()
    }

    fn for_each_expr_mut(&mut self, visit: &mut dyn FnMut(&mut SqlExpr)) {
        let (items, filters): (&mut Vec<SetItem>, Vec<&mut Option<SqlExpr>>) = match self {
            MergeOperationClause::Insert { items, where_ }
            | MergeOperationClause::Update { items, where_ } => (items, vec![where_]),
            MergeOperationClause::UpdateWithDelete {
                items,
                where_,
                where_delete,
            } => (items, vec![where_, where_delete]),
            MergeOperationClause::Delete { where_ } => {
                if let Some(w) = where_ {
                    visit(w);
                }
                return;
            }
        };
        for item in items.iter_mut() {
            visit(&mut item.value);
        }
        for w in filters.into_iter().flatten() {
            visit(w);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStatement {
    pub target: SqlTable,
    /// Table, literal rows or subquery, aliased `Source`
    pub source: TableSource,
    pub on: SqlExpr,
    /// WHEN branches in construction order
    pub operations: Vec<MergeOperationClause>,
    pub hint: Option<String>,
}

impl MergeStatement {
    pub const TARGET_ALIAS: &'static str = "Target";
    pub const SOURCE_ALIAS: &'static str = "Source";

    pub fn add_operation(&mut self, operation: MergeOperationClause) {
        self.operations.push(operation);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlStatement {
    Select(SelectQuery),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Merge(MergeStatement),
    InsertOrUpdate(InsertOrUpdateStatement),
}

impl SqlStatement {
    pub fn kind(&self) -> &'static str {
        match self {
            SqlStatement::Select(_) => "Select",
            SqlStatement::Insert(_) => "Insert",
            SqlStatement::Update(_) => "Update",
            SqlStatement::Delete(_) => "Delete",
            SqlStatement::Merge(_) => "Merge",
            SqlStatement::InsertOrUpdate(_) => "InsertOrUpdate",
        }
    }

    pub fn as_select(&self) -> Option<&SelectQuery> {
        match self {
            SqlStatement::Select(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_merge(&self) -> Option<&MergeStatement> {
        match self {
            SqlStatement::Merge(m) => Some(m),
            _ => None,
        }
    }

    /// Stable serialized form; equal statements always share a key.
    pub fn shape_key(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Visit every nested query reference in the statement
    pub fn for_each_query_mut(&mut self, visit: &mut dyn FnMut(&mut QueryRef)) {
        fn exprs(e: &mut SqlExpr, visit: &mut dyn FnMut(&mut QueryRef)) {
            e.for_each_query_mut(visit);
        }
        match self {
            SqlStatement::Select(q) => q.for_each_query_mut(visit),
            SqlStatement::Insert(s) => {
                s.items.iter_mut().for_each(|i| exprs(&mut i.value, visit));
                if let InsertSource::Query(q) = &mut s.source {
                    q.for_each_query_mut(visit);
                }
            }
            SqlStatement::Update(s) => {
                s.items.iter_mut().for_each(|i| exprs(&mut i.value, visit));
                if let Some(w) = &mut s.where_ {
                    exprs(w, visit);
                }
            }
            SqlStatement::Delete(s) => {
                if let Some(w) = &mut s.where_ {
                    exprs(w, visit);
                }
            }
            SqlStatement::InsertOrUpdate(s) => {
                s.insert.iter_mut().for_each(|i| exprs(&mut i.value, visit));
                s.update.iter_mut().for_each(|i| exprs(&mut i.value, visit));
            }
            SqlStatement::Merge(m) => {
                if let SqlSource::SubQuery(q) = &mut m.source.source {
                    visit(q);
                }
                m.on.for_each_query_mut(visit);
                for op in &mut m.operations {
                    op.for_each_expr_mut(&mut |e| e.for_each_query_mut(visit));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ObjectName;
    use crate::sql::{SqlBinaryOp, SqlValue};

    fn people() -> SqlTable {
        SqlTable {
            name: ObjectName::new("people"),
            entity: "Person".to_string(),
        }
    }

    #[test]
    fn test_merge_operations_keep_order() {
        let mut merge = MergeStatement {
            target: people(),
            source: TableSource::new(SqlSource::Table(people()), MergeStatement::SOURCE_ALIAS),
            on: SqlExpr::Value(SqlValue::Bool(true)),
            operations: vec![],
            hint: None,
        };
        merge.add_operation(MergeOperationClause::Update {
            items: vec![],
            where_: None,
        });
        merge.add_operation(MergeOperationClause::Insert {
            items: vec![],
            where_: None,
        });
        merge.add_operation(MergeOperationClause::Delete {
            where_: Some(SqlExpr::Value(SqlValue::Bool(true))),
        });

        let names: Vec<_> = merge.operations.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["Update", "Insert", "Delete"]);
        assert!(!merge.operations[0].has_filter());
        assert!(merge.operations[2].has_filter());
    }

    #[test]
    fn test_insert_or_update_to_merge() {
        let upsert = InsertOrUpdateStatement {
            table: people(),
            alias: "t1".to_string(),
            keys: vec!["id".to_string()],
            insert: vec![
                SetItem::new("id", SqlExpr::Value(SqlValue::Int(5))),
                SetItem::new("name", SqlExpr::Value("x".into())),
            ],
            update: vec![SetItem::new(
                "name",
                SqlExpr::binary(
                    SqlExpr::column("t1", "name"),
                    SqlBinaryOp::Concat,
                    SqlExpr::Value("!".into()),
                ),
            )],
        };

        let merge = upsert.to_merge();

        assert_eq!(merge.operations.len(), 2);
        assert_eq!(
            merge.on,
            SqlExpr::binary(
                SqlExpr::column("Target", "id"),
                SqlBinaryOp::Equal,
                SqlExpr::column("Source", "id"),
            )
        );
        match &merge.operations[0] {
            MergeOperationClause::Update { items, .. } => assert_eq!(
                items[0].value,
                SqlExpr::binary(
                    SqlExpr::column("Target", "name"),
                    SqlBinaryOp::Concat,
                    SqlExpr::Value("!".into()),
                )
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_shape_key_is_stable() {
        let stmt = SqlStatement::Delete(DeleteStatement {
            table: people(),
            alias: "t1".to_string(),
            where_: None,
        });
        assert_eq!(stmt.shape_key().unwrap(), stmt.clone().shape_key().unwrap());
        assert_eq!(stmt.kind(), "Delete");
    }
}
