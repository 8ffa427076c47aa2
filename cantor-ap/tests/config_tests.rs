//! Player configuration loading from TOML files and overrides
//!
//! Tests that manipulate CANTOR_ROOT_FOLDER are marked with #[serial]

use cantor_ap::cache::{SPEECH_NAMESPACE, STREAM_NAMESPACE};
use cantor_ap::config::{Config, ConfigOverrides};
use cantor_common::config::ROOT_FOLDER_ENV;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_full_file_loads() {
    env::remove_var(ROOT_FOLDER_ENV);
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let path = write_config(
        &dir,
        &format!(
            r#"
root_folder = "{}"

[synthesis]
voice = "hi-IN-SwaraNeural"
trusted_client_token = "abc"
timeout_ms = 15000

[cache]
speech_budget_mb = 10

[playback]
progress_interval_ms = 250
default_speed = 1.25

[logging]
level = "debug"
"#,
            root.display()
        ),
    );

    let config = Config::load(ConfigOverrides {
        config_path: Some(path),
        root_folder: None,
    })
    .unwrap();

    assert_eq!(config.root_folder, root);
    assert_eq!(config.cache_namespace_dir(SPEECH_NAMESPACE), root.join("cache").join("speech"));
    assert_eq!(config.cache_namespace_dir(STREAM_NAMESPACE), root.join("cache").join("stream"));
    assert_eq!(config.synthesis.voice, "hi-IN-SwaraNeural");
    assert_eq!(config.synthesis.trusted_client_token.as_deref(), Some("abc"));
    assert_eq!(config.synthesis.timeout().as_millis(), 15000);
    assert_eq!(config.cache.speech_budget_bytes(), 10 * 1024 * 1024);
    assert_eq!(config.playback.default_speed, 1.25);
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_root_folder_priority() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "root_folder = \"/tmp/cantor-file\"\n");

    env::set_var(ROOT_FOLDER_ENV, "/tmp/cantor-env");
    let from_env = Config::load(ConfigOverrides {
        config_path: Some(path.clone()),
        root_folder: None,
    })
    .unwrap();
    assert_eq!(from_env.root_folder, PathBuf::from("/tmp/cantor-env"));

    let from_cli = Config::load(ConfigOverrides {
        config_path: Some(path.clone()),
        root_folder: Some(PathBuf::from("/tmp/cantor-cli")),
    })
    .unwrap();
    assert_eq!(from_cli.root_folder, PathBuf::from("/tmp/cantor-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
    let from_file = Config::load(ConfigOverrides {
        config_path: Some(path),
        root_folder: None,
    })
    .unwrap();
    assert_eq!(from_file.root_folder, PathBuf::from("/tmp/cantor-file"));
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    env::remove_var(ROOT_FOLDER_ENV);
    let dir = TempDir::new().unwrap();

    let path = write_config(&dir, "[playback]\ndefault_speed = 3.0\n");
    assert!(Config::load(ConfigOverrides {
        config_path: Some(path),
        root_folder: None,
    })
    .is_err());

    let path = write_config(&dir, "[synthesis]\ntimeout_ms = 0\n");
    assert!(Config::load(ConfigOverrides {
        config_path: Some(path),
        root_folder: None,
    })
    .is_err());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let result = Config::load(ConfigOverrides {
        config_path: Some(PathBuf::from("/nonexistent/cantor/config.toml")),
        root_folder: Some(PathBuf::from("/tmp/cantor")),
    });
    assert!(result.is_err());
}
