//! Mapping metadata supplied by the caller.
//!
//! The translator never discovers mappings itself: entity-to-table and
//! member-to-column bindings, plus SQL function descriptors, are registered
//! on a [`MappingSchema`] up front and only read during translation.

use crate::expr::ExprType;
use crate::sql::Precedence;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Qualified identifier (`server.database.schema.name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectName {
    pub server: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Present parts, outermost first
    pub fn parts(&self) -> Vec<&str> {
        [&self.server, &self.database, &self.schema]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .chain(std::iter::once(self.name.as_str()))
            .collect()
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts().join("."))
    }
}

/// How a function's result nullability is derived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nullability {
    /// Use [`FunctionMetadata::can_be_null`]
    #[default]
    Unknown,
    Nullable,
    NotNullable,
    /// Nullable when any argument is
    SameAsArgument,
}

/// Descriptor binding a call-site function id to a SQL function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub name: ObjectName,
    /// Generated argument `i` takes source argument `arg_indices[i]`
    pub arg_indices: Option<Vec<usize>>,
    pub precedence: i32,
    /// Provider configuration this mapping applies to; `None` matches any
    pub configuration: Option<String>,
    pub server_side_only: bool,
    pub prefer_server_side: bool,
    pub inline_parameters: bool,
    pub is_predicate: bool,
    pub is_aggregate: bool,
    pub is_window_function: bool,
    pub is_pure: bool,
    pub can_be_null: bool,
    pub nullability: Nullability,
}

impl FunctionMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: ObjectName::new(name),
            arg_indices: None,
            precedence: Precedence::PRIMARY,
            configuration: None,
            server_side_only: false,
            prefer_server_side: false,
            inline_parameters: false,
            is_predicate: false,
            is_aggregate: false,
            is_window_function: false,
            is_pure: true,
            can_be_null: true,
            nullability: Nullability::Unknown,
        }
    }

    pub fn aggregate(mut self) -> Self {
        self.is_aggregate = true;
        self.server_side_only = true;
        self
    }

    pub fn window(mut self) -> Self {
        self.is_window_function = true;
        self.server_side_only = true;
        self
    }

    pub fn predicate(mut self) -> Self {
        self.is_predicate = true;
        self.can_be_null = false;
        self
    }

    pub fn impure(mut self) -> Self {
        self.is_pure = false;
        self
    }

    pub fn with_arg_indices(mut self, indices: Vec<usize>) -> Self {
        self.arg_indices = Some(indices);
        self
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    pub fn with_nullability(mut self, nullability: Nullability) -> Self {
        self.nullability = nullability;
        self
    }

    pub fn with_inline_parameters(mut self) -> Self {
        self.inline_parameters = true;
        self
    }

    /// Result nullability given the nullability of the arguments
    pub fn result_can_be_null(&self, args_can_be_null: &[bool]) -> bool {
        match self.nullability {
            Nullability::Unknown => self.can_be_null,
            Nullability::Nullable => true,
            Nullability::NotNullable => false,
            Nullability::SameAsArgument => args_can_be_null.iter().any(|n| *n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub member: String,
    pub column: String,
    pub ty: ExprType,
    pub nullable: bool,
    /// Position within the primary key
    pub primary_key: Option<u32>,
    pub identity: bool,
    pub skip_on_update: bool,
}

impl ColumnMapping {
    pub fn new(member: impl Into<String>, ty: ExprType) -> Self {
        let member = member.into();
        Self {
            column: member.clone(),
            member,
            ty,
            nullable: false,
            primary_key: None,
            identity: false,
            skip_on_update: false,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self, order: u32) -> Self {
        self.primary_key = Some(order);
        self
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self.skip_on_update = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMapping {
    pub entity: String,
    pub table: ObjectName,
    pub columns: Vec<ColumnMapping>,
}

impl TableMapping {
    pub fn new(entity: impl Into<String>, table: ObjectName) -> Self {
        Self {
            entity: entity.into(),
            table,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnMapping) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, member: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.member == member)
    }

    /// Primary key columns in key order
    pub fn primary_key(&self) -> Vec<&ColumnMapping> {
        let mut keys: Vec<_> = self
            .columns
            .iter()
            .filter(|c| c.primary_key.is_some())
            .collect();
        keys.sort_by_key(|c| c.primary_key);
        keys
    }
}

/// Read-only mapping lookup shared by every translation
#[derive(Debug, Clone, Default)]
pub struct MappingSchema {
    tables: HashMap<String, TableMapping>,
    functions: HashMap<String, Vec<FunctionMetadata>>,
    configuration: Option<String>,
}

impl MappingSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableMapping) -> Self {
        self.tables.insert(table.entity.clone(), table);
        self
    }

    pub fn with_function(mut self, id: impl Into<String>, metadata: FunctionMetadata) -> Self {
        self.functions.entry(id.into()).or_default().push(metadata);
        self
    }

    pub fn with_configuration(mut self, configuration: Option<String>) -> Self {
        self.configuration = configuration;
        self
    }

    /// Common SQL functions and aggregates
    pub fn with_standard_functions(self) -> Self {
        self.with_function(
            "count",
            FunctionMetadata::new("COUNT")
                .aggregate()
                .with_nullability(Nullability::NotNullable),
        )
        .with_function("sum", FunctionMetadata::new("SUM").aggregate())
        .with_function("min", FunctionMetadata::new("MIN").aggregate())
        .with_function("max", FunctionMetadata::new("MAX").aggregate())
        .with_function("avg", FunctionMetadata::new("AVG").aggregate())
        .with_function(
            "lower",
            FunctionMetadata::new("LOWER").with_nullability(Nullability::SameAsArgument),
        )
        .with_function(
            "upper",
            FunctionMetadata::new("UPPER").with_nullability(Nullability::SameAsArgument),
        )
        .with_function(
            "coalesce",
            FunctionMetadata::new("COALESCE").with_nullability(Nullability::NotNullable),
        )
        .with_function(
            "row_number",
            FunctionMetadata::new("ROW_NUMBER")
                .window()
                .with_nullability(Nullability::NotNullable),
        )
        .with_function("random", FunctionMetadata::new("RANDOM").impure())
    }

    pub fn configuration(&self) -> Option<&str> {
        self.configuration.as_deref()
    }

    pub fn table(&self, entity: &str) -> Option<&TableMapping> {
        self.tables.get(entity)
    }

    /// Mapping for `id`: the candidate tagged with the active configuration
    /// wins over the untagged one.
    pub fn function(&self, id: &str) -> Option<&FunctionMetadata> {
        let candidates = self.functions.get(id)?;
        candidates
            .iter()
            .find(|f| f.configuration.is_some() && f.configuration.as_deref() == self.configuration())
            .or_else(|| candidates.iter().find(|f| f.configuration.is_none()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_display() {
        let name = ObjectName::new("people").with_schema("hr").with_database("main");
        assert_eq!(name.to_string(), "main.hr.people");
        assert_eq!(name.parts(), vec!["main", "hr", "people"]);
    }

    #[test]
    fn test_function_lookup_prefers_configuration() {
        let schema = MappingSchema::new()
            .with_function("len", FunctionMetadata::new("LEN"))
            .with_function(
                "len",
                FunctionMetadata::new("LENGTH").with_configuration("Oracle"),
            );

        assert_eq!(schema.function("len").unwrap().name.name, "LEN");

        let oracle = schema.with_configuration(Some("Oracle".to_string()));
        assert_eq!(oracle.function("len").unwrap().name.name, "LENGTH");
        assert!(oracle.function("missing").is_none());
    }

    #[test]
    fn test_primary_key_order() {
        let mapping = TableMapping::new("Line", ObjectName::new("lines"))
            .with_column(ColumnMapping::new("line", ExprType::Int).primary_key(2))
            .with_column(ColumnMapping::new("text", ExprType::Text))
            .with_column(ColumnMapping::new("order", ExprType::Int).primary_key(1));

        let keys: Vec<_> = mapping.primary_key().iter().map(|c| c.member.as_str()).collect();
        assert_eq!(keys, vec!["order", "line"]);
    }

    #[test]
    fn test_nullability_policies() {
        let same = FunctionMetadata::new("UPPER").with_nullability(Nullability::SameAsArgument);
        assert!(same.result_can_be_null(&[false, true]));
        assert!(!same.result_can_be_null(&[false]));

        let unknown = FunctionMetadata::new("F");
        assert!(unknown.result_can_be_null(&[]));
        assert!(!FunctionMetadata::new("P").predicate().result_can_be_null(&[true]));
    }
}
