// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub club: ClubConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub records: RecordsConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub sms: SmsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Base URL of the SMS gateway wrapper.
    pub base_url: String,
    pub token_env: String,
    /// Sender name shown on the recipient's phone.
    pub from: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8710".into(),
            token_env: "REGISTA_SMS_TOKEN".into(),
            from: "Regista".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubConfig {
    /// Club name, interpolated into routine templates.
    pub name: String,
    /// Active season as it appears in registration codes, e.g. "2526".
    pub season: String,
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            name: "the club".into(),
            season: "2526".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum retained conversation turns per session. Oldest evicted first;
    /// a leading system message is exempt.
    pub max_history: usize,
    /// Per-turn deadline applied by the API layer, in seconds.
    pub turn_timeout_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: 40,
            turn_timeout_seconds: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Base URL of the remote record store API.
    pub base_url: String,
    /// Environment variable holding the record store token.
    pub token_env: String,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8700".into(),
            token_env: "REGISTA_RECORDS_TOKEN".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// SQLite database path. Empty string = default data dir.
    #[serde(default)]
    pub db_path: String,
    /// Seconds between processor passes.
    pub poll_interval_seconds: u64,
    /// Retry ceiling before a record is marked failed.
    pub max_retries: u32,
    /// Records older than this (processed or failed) are removed by cleanup.
    pub retention_days: i64,
    /// Backoff between retries of the same record.
    pub backoff_initial_ms: u64,
    pub backoff_factor: f64,
    pub backoff_max_ms: u64,
    /// Records stuck in-flight longer than this are released back to pending.
    pub stale_claim_seconds: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            poll_interval_seconds: 30,
            max_retries: 5,
            retention_days: 14,
            backoff_initial_ms: 5_000,
            backoff_factor: 2.0,
            backoff_max_ms: 300_000,
            stale_claim_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    /// Optional bearer token. None = no auth (local development).
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8720,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// "local" executes tool handlers in-process; "remote" forwards calls
    /// to `executor_url`.
    pub execution: String,
    #[serde(default)]
    pub executor_url: Option<String>,
    /// Maximum model-call/tool-call round trips per turn.
    pub max_rounds: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            execution: "local".into(),
            executor_url: None,
            max_rounds: 8,
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
