//! Configuration management for the casting concierge
//!
//! Priority is environment > TOML file > built-in default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::assistant::{DEFAULT_ANSWER_THRESHOLD, DEFAULT_CLARIFY_THRESHOLD, DEFAULT_RECENT_WINDOW, DecisionPolicy};
use crate::{Error, Result};
use file::ConciergeConfigFile;

/// 30 days
const DEFAULT_RETENTION_SECS: u64 = 30 * 24 * 60 * 60;
/// 24 hours
const DEFAULT_DEDUPE_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PLATFORM_API: &str = "https://api.line.me";
const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 10;

/// Casting concierge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, catalog cache)
    pub data_dir: PathBuf,

    /// `SQLite` database file
    pub database_path: PathBuf,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Chat platform credentials
    pub platform: PlatformConfig,

    /// Decision thresholds
    pub policy: PolicyConfig,

    /// Retention and dedupe windows
    pub memory: MemoryConfig,

    /// Classifier selection
    pub classifier: ClassifierConfig,

    /// Directory of catalog CSV files; built-in topics when unset
    pub catalog_dir: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Bearer key for admin endpoints (from `CONCIERGE_API_KEY`)
    pub api_key: Option<String>,
}

/// Chat platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Webhook signing secret; verification is skipped when unset
    pub channel_secret: Option<SecretString>,

    /// Bearer token for the reply API; replies are dropped when unset
    pub access_token: Option<SecretString>,

    /// Reply API base URL
    pub api_base: String,
}

/// Decision thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub answer_threshold: f32,
    pub clarify_threshold: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            answer_threshold: DEFAULT_ANSWER_THRESHOLD,
            clarify_threshold: DEFAULT_CLARIFY_THRESHOLD,
        }
    }
}

impl PolicyConfig {
    /// Validated decision policy
    ///
    /// # Errors
    ///
    /// Returns error unless `0 <= clarify <= answer <= 1`
    pub fn decision_policy(&self) -> Result<DecisionPolicy> {
        DecisionPolicy::new(self.answer_threshold, self.clarify_threshold)
    }
}

/// Where dedupe records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupeBackend {
    #[default]
    Sqlite,
    Memory,
}

impl DedupeBackend {
    fn from_str_value(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Retention and dedupe windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    pub retention_secs: u64,
    pub dedupe_ttl_secs: u64,
    /// Past turns given to the classifier
    pub recent_window: usize,
    pub sweep_interval_secs: u64,
    pub dedupe_backend: DedupeBackend,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            dedupe_ttl_secs: DEFAULT_DEDUPE_TTL_SECS,
            recent_window: DEFAULT_RECENT_WINDOW,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            dedupe_backend: DedupeBackend::Sqlite,
        }
    }
}

impl MemoryConfig {
    #[must_use]
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    #[must_use]
    pub const fn dedupe_ttl(&self) -> Duration {
        Duration::from_secs(self.dedupe_ttl_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Which classifier answers first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierMode {
    /// Local keyword heuristics only
    #[default]
    Keyword,
    /// Hosted model, keyword heuristics as fallback
    Remote,
}

impl ClassifierMode {
    fn from_str_value(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" | "heuristic" => Some(Self::Keyword),
            "remote" | "llm" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub mode: ClassifierMode,
    /// OpenAI-compatible base URL
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

/// Parse an environment value, ignoring malformed input
fn parse_env<T, F>(env: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(key).and_then(|s| s.trim().parse().ok())
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or fails validation
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::from_sources(fc, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from a file overlay and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if an enumerated value is not recognised
    pub fn from_sources<F>(fc: ConciergeConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Determine data directory (~/.local/share/casting-concierge on Linux)
        let data_dir = env("CONCIERGE_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(
                || {
                    directories::BaseDirs::new()
                        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("casting-concierge"))
                },
                PathBuf::from,
            );
        let database_path = env("CONCIERGE_DB_PATH")
            .or(fc.database_path)
            .map_or_else(|| data_dir.join("concierge.db"), PathBuf::from);

        let server = ServerConfig {
            port: parse_env(&env, "CONCIERGE_PORT")
                .or_else(|| parse_env(&env, "PORT"))
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            api_key: env("CONCIERGE_API_KEY").or(fc.server.api_key),
        };

        let platform = PlatformConfig {
            channel_secret: env("CHANNEL_SECRET")
                .or(fc.platform.channel_secret)
                .map(SecretString::from),
            access_token: env("CHANNEL_ACCESS_TOKEN")
                .or(fc.platform.access_token)
                .map(SecretString::from),
            api_base: env("CONCIERGE_PLATFORM_API")
                .or(fc.platform.api_base)
                .unwrap_or_else(|| DEFAULT_PLATFORM_API.to_string()),
        };

        let policy = PolicyConfig {
            answer_threshold: parse_env(&env, "CONCIERGE_ANSWER_THRESHOLD")
                .or(fc.policy.answer_threshold)
                .unwrap_or(DEFAULT_ANSWER_THRESHOLD),
            clarify_threshold: parse_env(&env, "CONCIERGE_CLARIFY_THRESHOLD")
                .or(fc.policy.clarify_threshold)
                .unwrap_or(DEFAULT_CLARIFY_THRESHOLD),
        };

        let dedupe_backend = match env("CONCIERGE_DEDUPE_BACKEND").or(fc.memory.dedupe_backend) {
            Some(value) => DedupeBackend::from_str_value(&value)
                .ok_or_else(|| Error::Config(format!("unknown dedupe backend: {value}")))?,
            None => DedupeBackend::default(),
        };
        let memory = MemoryConfig {
            retention_secs: parse_env(&env, "CONCIERGE_RETENTION_SECS")
                .or(fc.memory.retention_secs)
                .unwrap_or(DEFAULT_RETENTION_SECS),
            dedupe_ttl_secs: parse_env(&env, "CONCIERGE_DEDUPE_TTL_SECS")
                .or(fc.memory.dedupe_ttl_secs)
                .unwrap_or(DEFAULT_DEDUPE_TTL_SECS),
            recent_window: parse_env(&env, "CONCIERGE_RECENT_WINDOW")
                .or(fc.memory.recent_window)
                .unwrap_or(DEFAULT_RECENT_WINDOW),
            sweep_interval_secs: parse_env(&env, "CONCIERGE_SWEEP_INTERVAL_SECS")
                .or(fc.memory.sweep_interval_secs)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            dedupe_backend,
        };

        let mode = match env("CONCIERGE_CLASSIFIER").or(fc.classifier.mode) {
            Some(value) => ClassifierMode::from_str_value(&value)
                .ok_or_else(|| Error::Config(format!("unknown classifier mode: {value}")))?,
            None => ClassifierMode::default(),
        };
        let classifier = ClassifierConfig {
            mode,
            api_url: env("LLM_API_URL")
                .or(fc.classifier.api_url)
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            api_key: env("LLM_API_KEY").or(fc.classifier.api_key).map(SecretString::from),
            model: env("LLM_MODEL")
                .or(fc.classifier.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout_secs: fc.classifier.timeout_secs.unwrap_or(DEFAULT_CLASSIFIER_TIMEOUT_SECS),
        };

        let catalog_dir = env("CONCIERGE_CATALOG_DIR")
            .or(fc.catalog_dir)
            .map(PathBuf::from);

        Ok(Self {
            data_dir,
            database_path,
            server,
            platform,
            policy,
            memory,
            classifier,
            catalog_dir,
        })
    }

    /// Check cross-field invariants
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violation
    pub fn validate(&self) -> Result<()> {
        self.policy.decision_policy()?;

        if self.memory.recent_window == 0 {
            return Err(Error::Config("recent_window must be at least 1".to_string()));
        }
        if self.memory.retention_secs == 0 {
            return Err(Error::Config("retention_secs must be positive".to_string()));
        }
        if self.memory.dedupe_ttl_secs == 0 {
            return Err(Error::Config("dedupe_ttl_secs must be positive".to_string()));
        }
        if self.memory.sweep_interval_secs == 0 {
            return Err(Error::Config("sweep_interval_secs must be positive".to_string()));
        }
        if self.classifier.timeout_secs == 0 {
            return Err(Error::Config("classifier timeout_secs must be positive".to_string()));
        }

        if self.classifier.mode == ClassifierMode::Remote && self.classifier.api_key.is_none() {
            tracing::warn!(api_url = %self.classifier.api_url, "remote classifier configured without an API key");
        }
        Ok(())
    }
}
