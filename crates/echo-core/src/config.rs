//! Configuration system for Echo.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ECHO_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/echo/config.toml
//!   3. ~/.config/echo/config.toml
//!
//! Matching weights, the acceptance threshold and the reconnection grace
//! period are business rules and deliberately not configurable.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    pub server: ServerConfig,
    pub backup: BackupConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Allowed CORS origins. Empty or containing "*" = any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Mirror session state to Redis. Off = in-memory only.
    pub enabled: bool,
    pub redis_url: String,
    pub session_ttl_secs: u64,
    pub messages_ttl_secs: u64,
    pub disconnect_ttl_secs: u64,
    pub waiting_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: bool,
    /// Text-analysis endpoint; receives `{"text": …}` as JSON.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Analyze every relayed text message in the background.
    pub moderate_messages: bool,
    /// Toxicity above this is flagged.
    pub flag_threshold: f32,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            session_ttl_secs: 60 * 60,
            messages_ttl_secs: 60 * 60,
            disconnect_ttl_secs: 30,
            waiting_ttl_secs: 5 * 60,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:8000/api/analysis/message".to_string(),
            timeout_secs: 30,
            moderate_messages: false,
            flag_threshold: 0.7,
        }
    }
}

impl ServerConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("echo")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn env_flag(v: &str) -> bool {
    v == "true" || v == "1"
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl EchoConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            EchoConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ECHO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&EchoConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply ECHO_* overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ECHO_SERVER__BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("ECHO_SERVER__PORT") {
            if let Ok(p) = v.parse() {
                self.server.port = p;
            }
        }
        if let Some(v) = lookup("ECHO_SERVER__CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(v) = lookup("ECHO_BACKUP__ENABLED") {
            self.backup.enabled = env_flag(&v);
        }
        if let Some(v) = lookup("ECHO_BACKUP__REDIS_URL") {
            self.backup.redis_url = v;
        }
        if let Some(v) = lookup("ECHO_ANALYSIS__ENABLED") {
            self.analysis.enabled = env_flag(&v);
        }
        if let Some(v) = lookup("ECHO_ANALYSIS__ENDPOINT") {
            self.analysis.endpoint = v;
        }
        if let Some(v) = lookup("ECHO_ANALYSIS__MODERATE_MESSAGES") {
            self.analysis.moderate_messages = env_flag(&v);
        }
    }
}
