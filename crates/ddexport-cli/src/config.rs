//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ddexport_core::pipeline::DEFAULT_CHANNEL_CAPACITY;
use ddexport_core::stats::DEFAULT_REPORT_EVERY;
use ddexport_datadog::{API_KEY_VAR, APP_KEY_VAR, DEFAULT_PAGE_SIZE, DEFAULT_SITE, SITE_VAR};
use serde::Deserialize;

/// Global configuration for ddexport
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub datadog: DatadogConfig,
    pub export: ExportConfig,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatadogConfig {
    pub site: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub app_key: Option<String>,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            site: std::env::var(SITE_VAR).unwrap_or_else(|_| DEFAULT_SITE.to_string()),
            api_key: std::env::var(API_KEY_VAR).ok(),
            app_key: std::env::var(APP_KEY_VAR).ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Records buffered between fetcher and writer
    pub channel_capacity: usize,
    /// Log a throughput line every N records
    pub report_every: u64,
    pub page_size: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            report_every: DEFAULT_REPORT_EVERY,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Seconds
    pub connect_timeout: u64,
    /// Seconds; unset means no per-request limit
    pub request_timeout: Option<u64>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: 30,
            request_timeout: None,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./ddexport.toml (current directory)
    /// 2. ~/.config/ddexport/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("ddexport.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "ddexport") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
