//! Tests for configuration loading and resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate WASTEWATCH_* variables are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wastewatch_common::config::{
    resolve_root_folder, TomlConfig, ENV_ROOT_FOLDER, ENV_VISION_MODEL, ENV_VISION_TOKEN,
};

#[test]
fn test_defaults_match_pipeline_contract() {
    let config = TomlConfig::default();

    assert_eq!(config.pipeline.max_attempts, 3);
    assert_eq!(config.pipeline.backoff_ms, 2000);
    assert_eq!(config.pipeline.cluster_radius_km, 0.5);
    assert_eq!(config.pipeline.min_cluster_neighbors, 2);
    assert_eq!(config.pipeline.queue_batch_size, 10);
    assert_eq!(config.vision.timeout_secs, 60);
    assert_eq!(config.vision.max_tokens, 2000);
    assert!(config.vision.bearer_token.is_none());
}

#[test]
fn test_partial_toml_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/wastewatch"

[vision]
model_id = "custom-model"

[pipeline]
backoff_ms = 500
"#,
    )
    .unwrap();

    let config = TomlConfig::from_file(&path).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/wastewatch")));
    assert_eq!(config.vision.model_id, "custom-model");
    assert_eq!(config.vision.top_p, 0.9);
    assert_eq!(config.pipeline.backoff_ms, 500);
    assert_eq!(config.pipeline.max_attempts, 3);
    assert_eq!(config.server.port, 8000);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [unterminated").unwrap();

    let err = TomlConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_database_path_defaults_under_root() {
    let config = TomlConfig::default();
    let path = config.database_path(Path::new("/var/lib/wastewatch"));
    assert_eq!(path, PathBuf::from("/var/lib/wastewatch/wastewatch.db"));
}

#[test]
#[serial]
fn test_root_folder_cli_beats_env_and_toml() {
    env::set_var(ENV_ROOT_FOLDER, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/from-cli")), &config);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));

    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_root_folder_env_beats_toml() {
    env::set_var(ENV_ROOT_FOLDER, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..TomlConfig::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/from-env"));

    env::remove_var(ENV_ROOT_FOLDER);
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/from-toml"));
}

#[test]
#[serial]
fn test_vision_token_env_precedence() {
    env::set_var(ENV_VISION_TOKEN, "env-token");
    let mut config = TomlConfig::default();
    config.vision.bearer_token = Some("toml-token".to_string());

    assert_eq!(config.resolve_vision_token().unwrap(), "env-token");

    env::remove_var(ENV_VISION_TOKEN);
    assert_eq!(config.resolve_vision_token().unwrap(), "toml-token");
}

#[test]
#[serial]
fn test_vision_token_missing_or_blank_is_error() {
    env::set_var(ENV_VISION_TOKEN, "   ");
    let mut config = TomlConfig::default();
    config.vision.bearer_token = Some(String::new());

    assert!(config.resolve_vision_token().is_err());

    env::remove_var(ENV_VISION_TOKEN);
}

#[test]
#[serial]
fn test_env_overrides_model() {
    env::set_var(ENV_VISION_MODEL, "override-model");
    let mut config = TomlConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.vision.model_id, "override-model");
    env::remove_var(ENV_VISION_MODEL);
}
