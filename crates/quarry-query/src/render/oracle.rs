//! Oracle Database 12c+.
//!
//! MERGE branches take their filters as trailing `WHERE` clauses and an
//! update branch may carry a `DELETE WHERE`. Derived tables cannot name their columns, so literal rows are
//! selected from `sys.dual`.

use super::capabilities::{DialectCapabilities, ParameterStyle};
use super::dialect::{Dialect, MergeHooks, ModifyHooks};
use super::generator::{self, SqlGenerator};
use crate::error::RenderResult;
use crate::sql::{MergeStatement, SetItem, SqlExpr, SqlValue};
use quarry_config::DialectKind;

pub static ORACLE: Dialect = Dialect {
    kind: DialectKind::Oracle,
    capabilities: DialectCapabilities {
        column_aliases_in_source_supported: false,
        empty_values_source_supported: true,
        values_syntax_supported: false,
        fake_table: Some("dual"),
        fake_table_schema: Some("sys"),
        merge_update_with_delete_supported: true,
        merge_delete_supported: false,
        parameter_style: ParameterStyle::Named(':'),
        boolean_literals: false,
        table_alias_keyword: false,
        ..DialectCapabilities::STANDARD
    },
    merge: MergeHooks {
        build_merge_into: merge_into,
        build_merge_operation_insert: merge_operation_insert,
        build_merge_operation_update: merge_operation_update,
        build_merge_operation_update_with_delete: merge_operation_update_with_delete,
        build_merge_operation_delete: generator::merge_operation_delete,
    },
    modify: ModifyHooks::STANDARD,
};

fn merge_into(g: &mut SqlGenerator, merge: &MergeStatement) -> RenderResult<()> {
    g.write("MERGE ");
    if let Some(hint) = &merge.hint {
        g.write("/*+ ");
        g.write(hint);
        g.write(" */ ");
    }
    g.write("INTO ");
    g.object_name(&merge.target.name);
    g.table_alias(MergeStatement::TARGET_ALIAS);
    Ok(())
}

fn filter(g: &mut SqlGenerator, keyword: &str, condition: Option<&SqlExpr>) -> RenderResult<()> {
    if let Some(condition) = condition {
        g.clause(keyword);
        g.condition(condition)?;
    }
    Ok(())
}

fn merge_operation_insert(
    g: &mut SqlGenerator,
    items: &[SetItem],
    condition: Option<&SqlExpr>,
) -> RenderResult<()> {
    g.clause("WHEN NOT MATCHED THEN INSERT ");
    g.insert_columns_values(items)?;
    filter(g, "WHERE ", condition)
}

fn merge_operation_update(
    g: &mut SqlGenerator,
    items: &[SetItem],
    condition: Option<&SqlExpr>,
) -> RenderResult<()> {
    g.clause("WHEN MATCHED THEN UPDATE SET ");
    g.set_items(items)?;
    filter(g, "WHERE ", condition)
}

fn merge_operation_update_with_delete(
    g: &mut SqlGenerator,
    items: &[SetItem],
    condition: Option<&SqlExpr>,
    delete: Option<&SqlExpr>,
) -> RenderResult<()> {
    merge_operation_update(g, items, condition)?;
    let always = SqlExpr::Value(SqlValue::Bool(true));
    filter(g, "DELETE WHERE ", Some(delete.unwrap_or(&always)))
}
