//! Configuration system integration tests for Parley.
//!
//! Exercises loading, saving and migrating config files through the public
//! path-based API, using temporary files to avoid touching the real config.

use parley_lib::config::{
    load_from_path, save_to_path, Config, RecordingMode, CURRENT_VERSION, DEFAULT_BASE_URL,
};
use std::fs;
use tempfile::TempDir;

// =============================================================================
// Config File Operations Tests
// =============================================================================

#[test]
fn test_save_and_load_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.json");

    let mut config = Config::default();
    config.backend.base_url = "http://localhost:5000".to_string();
    config.dialog.recording_mode = RecordingMode::FixedDuration;
    config.dialog.max_retries = None;
    config.speech.remote_synthesis = true;

    save_to_path(&config_path, &config).expect("Failed to save config");
    let loaded = load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(loaded.backend.base_url, "http://localhost:5000");
    assert_eq!(loaded.dialog.recording_mode, RecordingMode::FixedDuration);
    assert_eq!(loaded.dialog.max_retries, None);
    assert!(loaded.speech.remote_synthesis);
}

#[test]
fn test_load_nonexistent_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent.json");

    let config = load_from_path(&config_path).expect("Should return defaults");

    assert_eq!(config.version, CURRENT_VERSION);
    assert_eq!(config.backend.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.dialog.recording_mode, RecordingMode::SilenceTimeout);
    // Loading does not create the file
    assert!(!config_path.exists());
}

#[test]
fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("dir").join("config.json");

    save_to_path(&config_path, &Config::default()).expect("Failed to save");
    assert!(config_path.exists());
}

#[test]
fn test_config_file_persistence() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("persistent.json");

    let mut config = Config::default();
    config.dialog.auto_continue = true;
    save_to_path(&config_path, &config).expect("Failed to save");

    config.prompts.reply_sent = "Done.".to_string();
    save_to_path(&config_path, &config).expect("Failed to save");

    let loaded = load_from_path(&config_path).expect("Failed to load");
    assert!(loaded.dialog.auto_continue);
    assert_eq!(loaded.prompts.reply_sent, "Done.");
}

#[test]
fn test_reset_by_saving_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("reset.json");

    let mut config = Config::default();
    config.dialog.silence_timeout_ms = 1500;
    config.backend.session_cookie = Some("session=abc".to_string());
    save_to_path(&config_path, &config).expect("Failed to save");

    save_to_path(&config_path, &Config::default()).expect("Failed to save defaults");

    let loaded = load_from_path(&config_path).expect("Failed to load");
    assert_eq!(loaded.dialog.silence_timeout_ms, 5000);
    assert!(loaded.backend.session_cookie.is_none());
}

// =============================================================================
// Config Version and Migration Tests
// =============================================================================

#[test]
fn test_old_version_is_migrated_and_written_back() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("old.json");
    fs::write(
        &config_path,
        r#"{"version": 0, "backend": {"base_url": "http://old.example"}}"#,
    )
    .expect("Failed to write");

    let loaded = load_from_path(&config_path).expect("Failed to load");
    assert_eq!(loaded.version, CURRENT_VERSION);
    assert_eq!(loaded.backend.base_url, "http://old.example");
    // Sections missing from the old file take defaults
    assert_eq!(loaded.dialog.max_retries, Some(3));

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).expect("Failed to read"))
            .expect("Failed to parse");
    assert_eq!(on_disk["version"], CURRENT_VERSION);
}

#[test]
fn test_future_version_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("future.json");
    fs::write(&config_path, r#"{"version": 99}"#).expect("Failed to write");

    let err = load_from_path(&config_path).unwrap_err();
    assert!(err.contains("Unknown config version"));
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_invalid_json_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("broken.json");
    fs::write(&config_path, "{ not json").expect("Failed to write");

    let err = load_from_path(&config_path).unwrap_err();
    assert!(err.contains("Failed to parse config"));
}

#[test]
fn test_unknown_fields_are_ignored() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("extra.json");
    fs::write(
        &config_path,
        r#"{"version": 1, "dialog": {"recording_mode": "fixed_duration", "colour": "blue"}}"#,
    )
    .expect("Failed to write");

    let loaded = load_from_path(&config_path).expect("Failed to load");
    assert_eq!(loaded.dialog.recording_mode, RecordingMode::FixedDuration);
}
