//! Configuration management for Parley
//!
//! Provides persistent settings storage with schema versioning and migrations.
//! Configuration is stored in `~/.parley/config.json`. A cached global instance
//! backs the binary; the path-based helpers exist for `--config` and tests.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Current config schema version
pub const CURRENT_VERSION: u32 = 1;

/// Backend address the hosted deployment uses
pub const DEFAULT_BASE_URL: &str = "https://basic-gmail-login.onrender.com";

/// Global config instance for caching
static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Backend service settings
    pub backend: BackendConfig,
    /// Hands-free dialog settings
    pub dialog: DialogConfig,
    /// Speech output/input settings
    pub speech: SpeechConfig,
    /// Spoken prompt strings
    pub prompts: PromptConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            backend: BackendConfig::default(),
            dialog: DialogConfig::default(),
            speech: SpeechConfig::default(),
            prompts: PromptConfig::default(),
        }
    }
}

/// Backend service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the email/reply backend
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Session cookie sent with every request (None when unauthenticated)
    pub session_cookie: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            session_cookie: None,
        }
    }
}

/// How a spoken turn is endpointed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    /// Stop capture after a fixed wall-clock window
    FixedDuration,
    /// Stop capture once no transcript chunk arrives for the silence timeout
    #[default]
    SilenceTimeout,
}

/// Hands-free dialog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Recording endpointing strategy
    pub recording_mode: RecordingMode,
    /// Window length for fixed-duration recording, in milliseconds
    pub fixed_duration_ms: u64,
    /// Idle gap that ends a silence-timeout recording, in milliseconds
    pub silence_timeout_ms: u64,
    /// Optional hard cap on silence-timeout recordings (None = uncapped)
    pub max_recording_ms: Option<u64>,
    /// Re-prompts allowed per state before giving up (None = unbounded)
    pub max_retries: Option<u32>,
    /// Start a new session on the next message once one is disposed of
    pub auto_continue: bool,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            recording_mode: RecordingMode::default(),
            fixed_duration_ms: 6000,
            silence_timeout_ms: 5000,
            max_recording_ms: None,
            max_retries: Some(3),
            auto_continue: false,
        }
    }
}

impl DialogConfig {
    /// Fixed recording window as a `Duration`
    pub fn fixed_duration(&self) -> Duration {
        Duration::from_millis(self.fixed_duration_ms)
    }

    /// Silence timeout as a `Duration`
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }
}

/// Speech port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Synthesise prompts through the backend instead of printing them
    pub remote_synthesis: bool,
    /// Audio player command override (defaults to afplay/paplay)
    pub player_command: Option<String>,
    /// Recorder writing a WAV clip to stdout; answers are then transcribed
    /// by the backend instead of typed
    pub record_command: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            remote_synthesis: false,
            player_command: None,
            record_command: None,
        }
    }
}

/// Spoken prompts used by the dialog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub ask_replay_summary: String,
    pub ask_record_reply: String,
    pub start_recording_reply: String,
    pub confirm_read_reply: String,
    pub ask_edit_or_send: String,
    pub start_recording_edit: String,
    pub confirm_send_final: String,
    pub not_understood: String,
    pub no_speech: String,
    pub reply_sent: String,
    pub reply_skipped: String,
    pub queue_complete: String,
    pub service_error: String,
    pub gave_up: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            ask_replay_summary: "Would you like me to read the summary of this email? Say yes or no."
                .to_string(),
            ask_record_reply: "Would you like to record a reply? Say yes, no, or next.".to_string(),
            start_recording_reply: "Please say your reply after the tone.".to_string(),
            confirm_read_reply: "Your reply is ready. Would you like me to read it? Say yes or no."
                .to_string(),
            ask_edit_or_send: "Would you like to send, edit, read, or skip this reply?"
                .to_string(),
            start_recording_edit: "Please say how you would like to change the reply.".to_string(),
            confirm_send_final: "Do you want to send this email? Say yes or no.".to_string(),
            not_understood: "Sorry, I didn't understand.".to_string(),
            no_speech: "I didn't hear anything. Let's try that again.".to_string(),
            reply_sent: "Email sent successfully.".to_string(),
            reply_skipped: "Email not sent. Moving on.".to_string(),
            queue_complete: "There are no more emails to reply to.".to_string(),
            service_error: "Something went wrong while talking to the email service.".to_string(),
            gave_up: "I couldn't understand you, so I'll stop here.".to_string(),
        }
    }
}

/// Get the path to the config file (~/.parley/config.json)
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Get the path to the config directory (~/.parley)
pub fn get_config_dir() -> PathBuf {
    home_dir_or_fallback().join(".parley")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Load configuration from a specific file
///
/// A missing file yields the defaults. Older schema versions are migrated and
/// written back.
pub fn load_from_path(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        tracing::info!("Config file {:?} not found, using defaults", path);
        return Ok(Config::default());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

    let config: Config =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse config: {}", e))?;

    let original_version = config.version;
    let migrated = migrate_config(config)?;
    if migrated.version != original_version {
        save_to_path(path, &migrated)?;
    }

    Ok(migrated)
}

/// Save configuration to a specific file, creating parent directories
pub fn save_to_path(path: &Path, config: &Config) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
    }

    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialise config: {}", e))?;

    fs::write(path, contents).map_err(|e| format!("Failed to write config file: {}", e))?;

    tracing::info!("Config saved to {:?}", path);
    Ok(())
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, String> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version > CURRENT_VERSION {
        return Err(format!("Unknown config version: {}", config.version));
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, String> {
    match config.version {
        // Version 0 predates the dialog section; serde defaults already filled it
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(format!("Unknown config version: {}", v)),
    }
}

/// Get the global config instance
fn get_config_instance() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| {
        let config = load_from_path(&get_config_path()).unwrap_or_else(|e| {
            tracing::error!("Failed to load config, using defaults: {}", e);
            Config::default()
        });
        tracing::info!("Config loaded (backend: {})", config.backend.base_url);
        RwLock::new(config)
    })
}

/// Get the current configuration
///
/// The config is cached in memory and loaded from disk on first access.
pub fn get_config() -> Config {
    get_config_instance().read().clone()
}

/// Replace the cached configuration and persist it
pub fn set_config(mut config: Config) -> Result<(), String> {
    config.version = CURRENT_VERSION;
    save_to_path(&get_config_path(), &config)?;

    let mut cached = get_config_instance().write();
    *cached = config;

    tracing::info!("Configuration updated");
    Ok(())
}

/// Reset configuration to defaults and persist
pub fn reset_config() -> Result<Config, String> {
    let default_config = Config::default();
    save_to_path(&get_config_path(), &default_config)?;

    let mut cached = get_config_instance().write();
    *cached = default_config.clone();

    tracing::info!("Configuration reset to defaults");
    Ok(default_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_current_version() {
        let config = Config::default();
        assert_eq!(config.version, CURRENT_VERSION);
    }

    #[test]
    fn test_dialog_config_defaults() {
        let dialog = DialogConfig::default();
        assert_eq!(dialog.recording_mode, RecordingMode::SilenceTimeout);
        assert_eq!(dialog.fixed_duration(), Duration::from_secs(6));
        assert_eq!(dialog.silence_timeout(), Duration::from_secs(5));
        assert_eq!(dialog.max_recording_ms, None);
        assert_eq!(dialog.max_retries, Some(3));
        assert!(!dialog.auto_continue);
    }

    #[test]
    fn test_backend_config_defaults() {
        let backend = BackendConfig::default();
        assert_eq!(backend.base_url, DEFAULT_BASE_URL);
        assert_eq!(backend.timeout_secs, 30);
        assert!(backend.session_cookie.is_none());
    }

    #[test]
    fn test_recording_mode_serialisation() {
        assert_eq!(
            serde_json::to_string(&RecordingMode::FixedDuration).unwrap(),
            "\"fixed_duration\""
        );
        assert_eq!(
            serde_json::from_str::<RecordingMode>("\"silence_timeout\"").unwrap(),
            RecordingMode::SilenceTimeout
        );
    }

    #[test]
    fn test_partial_config_deserialisation() {
        let json = r#"{"version": 1, "dialog": {"max_retries": null, "fixed_duration_ms": 3000}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.dialog.max_retries, None);
        assert_eq!(config.dialog.fixed_duration_ms, 3000);
        assert_eq!(config.dialog.silence_timeout_ms, 5000);
        assert!(!config.speech.remote_synthesis);
        assert!(!config.prompts.ask_replay_summary.is_empty());
    }

    #[test]
    fn test_migration_from_version_0() {
        let old_config = Config {
            version: 0,
            ..Default::default()
        };

        let migrated = migrate_config(old_config).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_rejects_future_version() {
        let future_config = Config {
            version: 999,
            ..Default::default()
        };

        let result = migrate_config(future_config);
        assert!(result.unwrap_err().contains("Unknown config version"));
    }

    #[test]
    fn test_config_path_format() {
        let path = get_config_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains(".parley"));
        assert!(path_str.ends_with("config.json"));
    }
}
