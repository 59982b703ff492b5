//! ISO SQL.

use super::capabilities::DialectCapabilities;
use super::dialect::{Dialect, MergeHooks, ModifyHooks};
use quarry_config::DialectKind;

pub static ANSI: Dialect = Dialect {
    kind: DialectKind::Ansi,
    capabilities: DialectCapabilities::STANDARD,
    merge: MergeHooks::STANDARD,
    modify: ModifyHooks::STANDARD,
};
