//! Dialect records: capabilities plus named override hooks.

use super::capabilities::DialectCapabilities;
use super::generator::{self, SqlGenerator};
use crate::error::RenderResult;
use crate::sql::{DeleteStatement, MergeStatement, SetItem, SqlExpr, UpdateStatement};
use quarry_config::DialectKind;

/// `WHEN` branch with its assignments and optional filter
pub type OperationHook = fn(&mut SqlGenerator, &[SetItem], Option<&SqlExpr>) -> RenderResult<()>;

/// Override points of the shared MERGE algorithm
#[derive(Clone, Copy)]
pub struct MergeHooks {
    /// `MERGE [hint] INTO <target>`
    pub build_merge_into: fn(&mut SqlGenerator, &MergeStatement) -> RenderResult<()>,
    pub build_merge_operation_insert: OperationHook,
    pub build_merge_operation_update: OperationHook,
    /// Update branch followed by its delete condition
    pub build_merge_operation_update_with_delete: fn(
        &mut SqlGenerator,
        &[SetItem],
        Option<&SqlExpr>,
        Option<&SqlExpr>,
    ) -> RenderResult<()>,
    pub build_merge_operation_delete: fn(&mut SqlGenerator, Option<&SqlExpr>) -> RenderResult<()>,
}

impl MergeHooks {
    pub const STANDARD: MergeHooks = MergeHooks {
        build_merge_into: generator::merge_into,
        build_merge_operation_insert: generator::merge_operation_insert,
        build_merge_operation_update: generator::merge_operation_update,
        build_merge_operation_update_with_delete: generator::merge_operation_update_with_delete,
        build_merge_operation_delete: generator::merge_operation_delete,
    };
}

/// Override points for UPDATE and DELETE
#[derive(Clone, Copy)]
pub struct ModifyHooks {
    pub build_update: fn(&mut SqlGenerator, &UpdateStatement) -> RenderResult<()>,
    pub build_delete: fn(&mut SqlGenerator, &DeleteStatement) -> RenderResult<()>,
}

impl ModifyHooks {
    pub const STANDARD: ModifyHooks = ModifyHooks {
        build_update: generator::update,
        build_delete: generator::delete,
    };
}

/// One rendering target
pub struct Dialect {
    pub kind: DialectKind,
    pub capabilities: DialectCapabilities,
    pub merge: MergeHooks,
    pub modify: ModifyHooks,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Static record for `kind`
    pub fn of(kind: DialectKind) -> &'static Dialect {
        match kind {
            DialectKind::Ansi => &super::ansi::ANSI,
            DialectKind::Oracle => &super::oracle::ORACLE,
            DialectKind::SqlServer => &super::sqlserver::SQL_SERVER,
            DialectKind::PostgreSql => &super::postgres::POSTGRESQL,
            DialectKind::Sqlite => &super::sqlite::SQLITE,
        }
    }
}

impl std::fmt::Debug for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialect")
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_dialect() {
        for kind in DialectKind::ALL {
            assert_eq!(Dialect::of(kind).kind, kind);
        }
    }

    #[test]
    fn test_only_sqlite_lacks_merge() {
        let without: Vec<_> = DialectKind::ALL
            .into_iter()
            .filter(|k| !Dialect::of(*k).capabilities.merge_supported)
            .collect();
        assert_eq!(without, vec![DialectKind::Sqlite]);
    }
}
