//! Loading and validating configuration documents

use crate::config::QuarryConfig;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Document parsed but holds inconsistent values
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl QuarryConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        let config: QuarryConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading quarry configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> ConfigResult<()> {
        let disabled = &self.translation.disabled_builders;
        if let Some(empty) = disabled.iter().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "disabled builder name '{}' is blank",
                empty
            )));
        }
        for (i, name) in disabled.iter().enumerate() {
            if disabled[..i].contains(name) {
                return Err(ConfigError::Invalid(format!(
                    "builder '{}' is disabled twice",
                    name
                )));
            }
        }
        if let Some(tag) = &self.translation.function_configuration {
            if tag.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "function_configuration must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DialectKind;
    use test_case::test_case;

    #[test]
    fn test_empty_document_is_default() {
        let config = QuarryConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuarryConfig::default());
    }

    #[test_case("ansi", DialectKind::Ansi)]
    #[test_case("oracle", DialectKind::Oracle)]
    #[test_case("sqlserver", DialectKind::SqlServer)]
    #[test_case("mssql", DialectKind::SqlServer)]
    #[test_case("postgresql", DialectKind::PostgreSql)]
    #[test_case("postgres", DialectKind::PostgreSql)]
    #[test_case("sqlite", DialectKind::Sqlite)]
    fn test_dialect_names(name: &str, expected: DialectKind) {
        let doc = format!("[render]\ndialect = \"{}\"\n", name);
        let config = QuarryConfig::from_toml_str(&doc).unwrap();
        assert_eq!(config.render.dialect, expected);
    }

    #[test]
    fn test_unknown_dialect_fails() {
        let result = QuarryConfig::from_toml_str("[render]\ndialect = \"db2\"\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_duplicate_disabled_builder_fails() {
        let result = QuarryConfig::from_toml_str(
            "[translation]\ndisabled_builders = [\"join\", \"join\"]\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_blank_function_configuration_fails() {
        let result =
            QuarryConfig::from_toml_str("[translation]\nfunction_configuration = \" \"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = QuarryConfig::default();
        config.render.dialect = DialectKind::PostgreSql;
        config.render.inline_parameters = true;
        config.translation.disabled_builders = vec!["select_many".to_string()];

        let text = config.to_toml_string().unwrap();
        let parsed = QuarryConfig::from_toml_str(&text).unwrap();

        assert_eq!(parsed, config);
    }
}
