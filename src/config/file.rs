//! TOML configuration file loading
//!
//! Supports `~/.config/casting-concierge/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConciergeConfigFile {
    /// Data directory override
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Database file override
    #[serde(default)]
    pub database_path: Option<String>,

    /// Directory holding catalog CSV files
    #[serde(default)]
    pub catalog_dir: Option<String>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Chat platform credentials
    #[serde(default)]
    pub platform: PlatformFileConfig,

    /// Decision thresholds
    #[serde(default)]
    pub policy: PolicyFileConfig,

    /// Retention and dedupe windows
    #[serde(default)]
    pub memory: MemoryFileConfig,

    /// Classifier selection
    #[serde(default)]
    pub classifier: ClassifierFileConfig,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub api_key: Option<String>,
}

/// Chat platform configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlatformFileConfig {
    pub channel_secret: Option<String>,
    pub access_token: Option<String>,
    pub api_base: Option<String>,
}

/// Threshold configuration
#[derive(Debug, Default, Deserialize)]
pub struct PolicyFileConfig {
    pub answer_threshold: Option<f32>,
    pub clarify_threshold: Option<f32>,
}

/// Memory configuration
#[derive(Debug, Default, Deserialize)]
pub struct MemoryFileConfig {
    pub retention_secs: Option<u64>,
    pub dedupe_ttl_secs: Option<u64>,
    pub recent_window: Option<usize>,
    pub sweep_interval_secs: Option<u64>,
    /// "sqlite" or "memory"
    pub dedupe_backend: Option<String>,
}

/// Classifier configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClassifierFileConfig {
    /// "keyword" or "remote"
    pub mode: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConciergeConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConciergeConfigFile {
    config_file_path().map_or_else(ConciergeConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> ConciergeConfigFile {
    if !path.exists() {
        return ConciergeConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConciergeConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConciergeConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/casting-concierge/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("casting-concierge").join("config.toml"))
}
