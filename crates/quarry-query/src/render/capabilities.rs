//! Capability flags consulted by the shared generator.

/// How `take`/`skip` are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
    /// `SELECT TOP (n)`; falls back to `OFFSET ... FETCH` when skipping
    Top,
}

/// How UPDATE output columns are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Unsupported,
    /// `OUTPUT INSERTED.c, DELETED.c` between SET and FROM
    Output,
    /// `RETURNING c`; only new values are visible
    Returning,
}

/// How an insert-or-update statement is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// MERGE against a single-row literal source
    Merge,
    /// `INSERT ... ON CONFLICT (keys) DO UPDATE SET ...`
    OnConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    /// `?`, one parameter per occurrence
    Positional,
    /// Prefix plus parameter name, e.g. `:id` or `@id`
    Named(char),
    /// `$1`, `$2`, ... numbered by first occurrence
    Numbered,
}

/// Fixed record describing what one target engine accepts.
///
/// The generator branches on these flags, never on the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    pub merge_supported: bool,
    /// `Source (a, b)` alias lists after a derived table
    pub column_aliases_in_source_supported: bool,
    /// A literal row source may have zero rows
    pub empty_values_source_supported: bool,
    /// `VALUES (...), (...)` as a row source
    pub values_syntax_supported: bool,
    /// Single-row relation used when a SELECT needs a FROM clause
    pub fake_table: Option<&'static str>,
    pub fake_table_schema: Option<&'static str>,
    /// `WHEN MATCHED THEN UPDATE ... DELETE WHERE ...`
    pub merge_update_with_delete_supported: bool,
    /// `WHEN MATCHED THEN DELETE`
    pub merge_delete_supported: bool,
    /// MERGE must be terminated with `;`
    pub merge_terminator_required: bool,
    pub limit_style: LimitStyle,
    /// OFFSET without a row limit needs `LIMIT -1`
    pub offset_requires_limit: bool,
    pub output_style: OutputStyle,
    pub upsert_style: UpsertStyle,
    pub parameter_style: ParameterStyle,
    /// `TRUE`/`FALSE` literals and boolean-valued columns
    pub boolean_literals: bool,
    /// `AS` between a table reference and its alias
    pub table_alias_keyword: bool,
    pub identifier_quotes: (char, char),
    pub concat_operator: &'static str,
}

impl DialectCapabilities {
    /// ISO SQL:2016
    pub const STANDARD: DialectCapabilities = DialectCapabilities {
        merge_supported: true,
        column_aliases_in_source_supported: true,
        empty_values_source_supported: false,
        values_syntax_supported: true,
        fake_table: None,
        fake_table_schema: None,
        merge_update_with_delete_supported: false,
        merge_delete_supported: true,
        merge_terminator_required: false,
        limit_style: LimitStyle::OffsetFetch,
        offset_requires_limit: false,
        output_style: OutputStyle::Unsupported,
        upsert_style: UpsertStyle::Merge,
        parameter_style: ParameterStyle::Positional,
        boolean_literals: true,
        table_alias_keyword: true,
        identifier_quotes: ('"', '"'),
        concat_operator: "||",
    };

    /// Literal row sources render as `VALUES` only when the alias list that
    /// names their columns can follow them
    pub fn renders_values(&self) -> bool {
        self.values_syntax_supported && self.column_aliases_in_source_supported
    }

    /// `schema.table` of the fake table, if any
    pub fn fake_table_name(&self) -> Option<String> {
        self.fake_table.map(|table| match self.fake_table_schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_need_alias_lists() {
        let caps = DialectCapabilities {
            column_aliases_in_source_supported: false,
            ..DialectCapabilities::STANDARD
        };
        assert!(DialectCapabilities::STANDARD.renders_values());
        assert!(!caps.renders_values());
    }

    #[test]
    fn test_fake_table_name() {
        let caps = DialectCapabilities {
            fake_table: Some("dual"),
            fake_table_schema: Some("sys"),
            ..DialectCapabilities::STANDARD
        };
        assert_eq!(caps.fake_table_name().as_deref(), Some("sys.dual"));
        assert_eq!(DialectCapabilities::STANDARD.fake_table_name(), None);
    }
}
