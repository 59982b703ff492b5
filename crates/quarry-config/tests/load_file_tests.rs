//! File-based loading tests

use quarry_config::{ConfigError, DialectKind, QuarryConfig};
use std::io::Write;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[translation]
compare_nulls_as_values = true
function_configuration = "Oracle"

[render]
dialect = "oracle"
inline_parameters = false
"#
    )
    .unwrap();

    let config = QuarryConfig::load(file.path()).unwrap();

    assert_eq!(config.render.dialect, DialectKind::Oracle);
    assert!(config.translation.compare_nulls_as_values);
    assert_eq!(
        config.translation.function_configuration.as_deref(),
        Some("Oracle")
    );
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = QuarryConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
