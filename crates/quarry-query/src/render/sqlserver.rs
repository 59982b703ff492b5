//! Microsoft SQL Server 2012+.

use super::capabilities::{DialectCapabilities, LimitStyle, OutputStyle, ParameterStyle};
use super::dialect::{Dialect, MergeHooks, ModifyHooks};
use super::generator::{self, SqlGenerator};
use crate::error::RenderResult;
use crate::sql::{DeleteStatement, MergeStatement, UpdateStatement};
use quarry_config::DialectKind;

pub static SQL_SERVER: Dialect = Dialect {
    kind: DialectKind::SqlServer,
    capabilities: DialectCapabilities {
        empty_values_source_supported: true,
        merge_terminator_required: true,
        limit_style: LimitStyle::Top,
        output_style: OutputStyle::Output,
        parameter_style: ParameterStyle::Named('@'),
        boolean_literals: false,
        identifier_quotes: ('[', ']'),
        concat_operator: "+",
        ..DialectCapabilities::STANDARD
    },
    merge: MergeHooks {
        build_merge_into: merge_into,
        ..MergeHooks::STANDARD
    },
    modify: ModifyHooks {
        build_update: update,
        build_delete: delete,
    },
};

/// `MERGE INTO t WITH (hint) AS Target`
fn merge_into(g: &mut SqlGenerator, merge: &MergeStatement) -> RenderResult<()> {
    g.write("MERGE INTO ");
    g.object_name(&merge.target.name);
    if let Some(hint) = &merge.hint {
        g.write(" WITH (");
        g.write(hint);
        g.write(")");
    }
    g.table_alias(MergeStatement::TARGET_ALIAS);
    Ok(())
}

/// `UPDATE alias SET ... OUTPUT ... FROM table AS alias WHERE ...`
fn update(g: &mut SqlGenerator, update: &UpdateStatement) -> RenderResult<()> {
    if update.alias.is_empty() {
        return generator::update(g, update);
    }
    g.write("UPDATE ");
    g.identifier(&update.alias);
    g.clause("SET ");
    g.set_items(&update.items)?;
    if !update.output.is_empty() {
        g.clause("OUTPUT ");
        g.output_items(&update.output, &update.alias)?;
    }
    g.clause("FROM ");
    g.object_name(&update.table.name);
    g.table_alias(&update.alias);
    if let Some(filter) = &update.where_ {
        g.clause("WHERE ");
        g.condition(filter)?;
    }
    Ok(())
}

fn delete(g: &mut SqlGenerator, delete: &DeleteStatement) -> RenderResult<()> {
    if delete.alias.is_empty() {
        return generator::delete(g, delete);
    }
    g.write("DELETE ");
    g.identifier(&delete.alias);
    g.clause("FROM ");
    g.object_name(&delete.table.name);
    g.table_alias(&delete.alias);
    if let Some(filter) = &delete.where_ {
        g.clause("WHERE ");
        g.condition(filter)?;
    }
    Ok(())
}
