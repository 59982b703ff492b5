//! PostgreSQL 15+.

use super::capabilities::{DialectCapabilities, LimitStyle, OutputStyle, ParameterStyle, UpsertStyle};
use super::dialect::{Dialect, MergeHooks, ModifyHooks};
use quarry_config::DialectKind;

pub static POSTGRESQL: Dialect = Dialect {
    kind: DialectKind::PostgreSql,
    capabilities: DialectCapabilities {
        empty_values_source_supported: true,
        limit_style: LimitStyle::LimitOffset,
        output_style: OutputStyle::Returning,
        upsert_style: UpsertStyle::OnConflict,
        parameter_style: ParameterStyle::Numbered,
        ..DialectCapabilities::STANDARD
    },
    merge: MergeHooks::STANDARD,
    modify: ModifyHooks::STANDARD,
};
