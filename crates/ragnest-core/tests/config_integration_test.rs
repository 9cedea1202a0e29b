//! Integration tests for layered configuration
//!
//! These tests verify that configuration loading follows the correct precedence:
//! Overrides > Environment variables > Config file > Defaults

use ragnest_core::config::{ConfigOverrides, ConfigSource, RagConfig};
use serial_test::serial;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

fn clear_env() {
    for key in [
        "RAGNEST_DATA_DIR",
        "RAGNEST_EMBEDDER",
        "RAGNEST_EMBEDDING_DIM",
        "RAGNEST_TOP_K",
        "RAGNEST_SCORE_THRESHOLD",
        "RAGNEST_QUERY_TIMEOUT_MS",
    ] {
        env::remove_var(key);
    }
}

#[test]
fn test_default_configuration() {
    let config = RagConfig::with_defaults();

    assert_eq!(config.data_dir.value, PathBuf::from(".ragnest"));
    assert_eq!(config.embedding_dim.value, 384);
    assert_eq!(config.generator.value, "echo");
    assert_eq!(config.query_timeout(), Duration::from_secs(60));
    assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(15)));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    env::set_var("RAGNEST_TOP_K", "12");
    env::set_var("RAGNEST_EMBEDDER", "ollama:env-model");

    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
top_k = 3
embedder = "ollama:file-model"
score_threshold = 0.3
"#
    )
    .unwrap();

    let config = RagConfig::with_defaults().load_from_file(file.path()).unwrap().load_from_env();

    assert_eq!(config.top_k.value, 12);
    assert_eq!(config.top_k.source, ConfigSource::Environment);
    assert_eq!(config.embedder.value, "ollama:env-model");
    // Not set in env, so the file wins
    assert_eq!(config.score_threshold.value, 0.3);
    assert_eq!(config.score_threshold.source, ConfigSource::File);

    clear_env();
}

#[test]
#[serial]
fn test_unparseable_env_value_is_ignored() {
    clear_env();
    env::set_var("RAGNEST_EMBEDDING_DIM", "wide");

    let config = RagConfig::with_defaults().load_from_env();

    assert_eq!(config.embedding_dim.value, 384);
    assert_eq!(config.embedding_dim.source, ConfigSource::Default);

    clear_env();
}

#[test]
#[serial]
fn test_overrides_win_over_environment() {
    clear_env();
    env::set_var("RAGNEST_DATA_DIR", "/var/lib/ragnest");

    let mut config = RagConfig::with_defaults().load_from_env();
    assert_eq!(config.data_dir.source, ConfigSource::Environment);

    let temp_dir = TempDir::new().unwrap();
    config.apply_overrides(ConfigOverrides {
        data_dir: Some(temp_dir.path().to_path_buf()),
        top_k: Some(2),
        ..Default::default()
    });

    assert_eq!(config.data_dir.value, temp_dir.path());
    assert_eq!(config.data_dir.source, ConfigSource::Override);
    assert_eq!(config.top_k.value, 2);

    assert!(ConfigSource::Override.precedence() > ConfigSource::Environment.precedence());
    assert!(ConfigSource::Environment.precedence() > ConfigSource::File.precedence());
    assert!(ConfigSource::File.precedence() > ConfigSource::Default.precedence());

    clear_env();
}

#[test]
fn test_invalid_toml_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "invalid toml content [[[").unwrap();

    assert!(RagConfig::with_defaults().load_from_file(file.path()).is_err());
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let non_existent = temp_dir.path().join("does_not_exist.toml");

    assert!(RagConfig::with_defaults().load_from_file(&non_existent).is_err());
}

#[test]
fn test_file_values_are_validated_after_loading() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("ragnest.toml");
    fs::write(&config_path, "embedding_dim = 0\n").unwrap();

    let config = RagConfig::with_defaults().load_from_file(&config_path).unwrap();
    assert!(config.validate().is_err());
}
