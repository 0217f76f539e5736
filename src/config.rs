use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecollectConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub memory: MemoryConfig,
    pub persona: PersonaConfig,
    pub openai: OpenAiConfig,
    pub delivery: DeliveryConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    /// Window size N. A window of N turns triggers compaction.
    pub limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub collection: String,
    pub top_k: usize,
    pub keywords: Vec<String>,
}

/// What the pipeline does when the tone store cannot be reached.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LookupFaultPolicy {
    /// Log the inbound turn as ignored and send nothing.
    Pause,
    /// Continue with the configured fallback instruction.
    Fallback,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PersonaConfig {
    pub on_lookup_fault: LookupFaultPolicy,
    pub fallback_text: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeliveryConfig {
    pub base_url: String,
    pub instance_id: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimeoutConfig {
    pub external_call_secs: u64,
}

impl Default for RecollectConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            history: HistoryConfig::default(),
            memory: MemoryConfig::default(),
            persona: PersonaConfig::default(),
            openai: OpenAiConfig::default(),
            delivery: DeliveryConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_recollect_dir()
            .join("recollect.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 15 }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            collection: "agent_memory".into(),
            top_k: 3,
            keywords: vec!["prefer".into(), "always".into(), "remember".into()],
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            on_lookup_fault: LookupFaultPolicy::Pause,
            fallback_text: crate::memory::persona::FALLBACK_INSTRUCTION.into(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.ultramsg.com".into(),
            instance_id: String::new(),
            token: String::new(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            external_call_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn external_call(&self) -> Duration {
        Duration::from_secs(self.external_call_secs)
    }
}

/// Returns `~/.recollect/`
pub fn default_recollect_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".recollect")
}

/// Returns the default config file path: `~/.recollect/config.toml`
pub fn default_config_path() -> PathBuf {
    default_recollect_dir().join("config.toml")
}

impl RecollectConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RecollectConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides. Credentials use the names the
    /// upstream providers document.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RECOLLECT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("RECOLLECT_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid RECOLLECT_PORT"),
            }
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            self.openai.api_key = val;
        }
        if let Ok(val) = std::env::var("ULTRAMSG_INSTANCE_ID") {
            self.delivery.instance_id = val;
        }
        if let Ok(val) = std::env::var("ULTRAMSG_TOKEN") {
            self.delivery.token = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
