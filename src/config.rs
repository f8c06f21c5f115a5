//! Bridge configuration
//!
//! Loaded once at startup from a JSON file in the per-user data directory,
//! with environment variables filling in anything the file does not set.
//! Precedence: file > environment > built-in default.
//!
//! Conversation history is deliberately NOT part of this struct - it lives
//! in the orchestrator for the lifetime of the process and is never written
//! to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_WEBAPP_URL: &str = "http://localhost:3001";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_MAX_RESPONSE_LENGTH: usize = 1500;
const DEFAULT_MAX_HISTORY_PER_USER: usize = 20;
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant responding via Signal messages. \
    Keep responses concise and mobile-friendly. Use plain text formatting (no markdown).";

/// Bridge configuration, persisted as camelCase JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Bot account phone number in E.164 format (e.g. +15551234567)
    pub signal_phone: String,

    /// Path to the signal-cli binary (bare name = resolved via PATH)
    pub signal_cli_path: String,

    /// Chat backend base URL
    pub webapp_url: String,

    /// LLM model identifier sent with every chat request
    pub model_id: String,

    /// Delay between poll cycles in milliseconds
    pub poll_interval_ms: u64,

    /// System prompt sent with every chat request
    pub system_prompt: String,

    /// Max response length requested from the backend
    pub max_response_length: usize,

    /// Allowed sender phone numbers; empty = accept all senders
    pub allowed_numbers: Vec<String>,

    /// Rolling per-sender history window (turns)
    pub max_history_per_user: usize,
}

/// Partial view of the config file for per-field merging.
///
/// Unknown keys (including a legacy `conversationHistory` blob) are ignored,
/// so stale runtime state in an old file can never leak back in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedConfig {
    signal_phone: Option<String>,
    signal_cli_path: Option<String>,
    webapp_url: Option<String>,
    model_id: Option<String>,
    poll_interval_ms: Option<u64>,
    system_prompt: Option<String>,
    max_response_length: Option<usize>,
    allowed_numbers: Option<Vec<String>>,
    max_history_per_user: Option<usize>,
}

impl Default for Config {
    /// Built-in defaults with environment overrides applied
    fn default() -> Self {
        Self {
            signal_phone: std::env::var("SIGNAL_PHONE").unwrap_or_default(),
            signal_cli_path: std::env::var("SIGNAL_CLI_PATH")
                .unwrap_or_else(|_| "signal-cli".to_string()),
            webapp_url: std::env::var("WEBAPP_URL")
                .unwrap_or_else(|_| DEFAULT_WEBAPP_URL.to_string()),
            model_id: std::env::var("SIGNAL_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            poll_interval_ms: std::env::var("SIGNAL_POLL_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_response_length: DEFAULT_MAX_RESPONSE_LENGTH,
            allowed_numbers: Vec::new(),
            max_history_per_user: DEFAULT_MAX_HISTORY_PER_USER,
        }
    }
}

impl Config {
    /// Default config file location: `<data dir>/signal-bridge/config.json`
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("signal-bridge")
            .join("config.json")
    }

    /// Load from the default path
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from an explicit path.
    ///
    /// Fails soft: a missing or corrupt file logs a warning and falls back
    /// to environment/built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<SavedConfig>(&raw) {
                Ok(saved) => config.merge(saved),
                Err(e) => warn!("Ignoring corrupt config file {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read config file {}: {}", path.display(), e),
        }

        config
    }

    /// Apply file values over the env-seeded defaults
    fn merge(&mut self, saved: SavedConfig) {
        if let Some(v) = saved.signal_phone {
            self.signal_phone = v;
        }
        if let Some(v) = saved.signal_cli_path {
            self.signal_cli_path = v;
        }
        if let Some(v) = saved.webapp_url {
            self.webapp_url = v;
        }
        if let Some(v) = saved.model_id {
            self.model_id = v;
        }
        if let Some(v) = saved.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = saved.system_prompt {
            self.system_prompt = v;
        }
        if let Some(v) = saved.max_response_length {
            self.max_response_length = v;
        }
        if let Some(v) = saved.allowed_numbers {
            self.allowed_numbers = v;
        }
        if let Some(v) = saved.max_history_per_user {
            self.max_history_per_user = v;
        }
    }

    /// Save to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Serialize to pretty JSON, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("nope.json"));
        assert_eq!(config.webapp_url, DEFAULT_WEBAPP_URL);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.max_history_per_user, DEFAULT_MAX_HISTORY_PER_USER);
        assert!(config.allowed_numbers.is_empty());
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.model_id, DEFAULT_MODEL);
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        let mut config = Config::default();
        config.signal_phone = "+15551234567".to_string();
        config.model_id = "llama-3.1-70b".to_string();
        config.poll_interval_ms = 500;
        config.allowed_numbers = vec!["+15550001111".to_string()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.signal_phone, config.signal_phone);
        assert_eq!(loaded.model_id, config.model_id);
        assert_eq!(loaded.poll_interval_ms, 500);
        assert_eq!(loaded.allowed_numbers, config.allowed_numbers);
        assert_eq!(loaded.system_prompt, config.system_prompt);
    }

    #[test]
    fn test_file_uses_camel_case_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        let mut config = Config::default();
        config.signal_phone = "+15551234567".to_string();
        config.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"signalPhone\""));
        assert!(raw.contains("\"maxHistoryPerUser\""));
        assert!(!raw.contains("signal_phone"));
    }

    #[test]
    fn test_legacy_history_key_ignored() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "signalPhone": "+15551234567",
                "conversationHistory": {"+1555": [{"role": "user", "content": "stale"}]}
            }"#,
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.signal_phone, "+15551234567");

        // History never round-trips through the file
        config.save_to(&path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("conversationHistory"));
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"modelId": "custom-model"}"#).unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.model_id, "custom-model");
        assert_eq!(config.max_response_length, DEFAULT_MAX_RESPONSE_LENGTH);
    }
}
