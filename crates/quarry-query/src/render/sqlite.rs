//! SQLite.
//!
//! There is no MERGE; upserts use `ON CONFLICT`. `VALUES` sources cannot be
//! given column names, so literal rows render as selects.

use super::capabilities::{DialectCapabilities, LimitStyle, OutputStyle, ParameterStyle, UpsertStyle};
use super::dialect::{Dialect, MergeHooks, ModifyHooks};
use quarry_config::DialectKind;

pub static SQLITE: Dialect = Dialect {
    kind: DialectKind::Sqlite,
    capabilities: DialectCapabilities {
        merge_supported: false,
        column_aliases_in_source_supported: false,
        values_syntax_supported: false,
        merge_delete_supported: false,
        limit_style: LimitStyle::LimitOffset,
        offset_requires_limit: true,
        output_style: OutputStyle::Returning,
        upsert_style: UpsertStyle::OnConflict,
        parameter_style: ParameterStyle::Named(':'),
        ..DialectCapabilities::STANDARD
    },
    merge: MergeHooks::STANDARD,
    modify: ModifyHooks::STANDARD,
};
