//! Configuration loading for the `huginn` CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! When no file exists the built-in defaults apply.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.huginn/secrets.toml` (user, must be 0600)
//! 2. `/etc/huginn/secrets.toml` (system, must be 0600)
//!
//! and fall back to the `GEMINI_API_KEY` environment variable.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pipeline::{
    DEFAULT_ANNOTATION_MODELS, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_LANGUAGE,
    DEFAULT_SUMMARY_MODELS, PollConfig,
};
use crate::providers::RetryConfig;
use crate::{HuginnError, Result};

/// Environment variable consulted when no secrets file carries a key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Batch-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum items annotated in parallel (default: 15).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Annotation cache file (default: analysis_cache.json).
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Disable every external call (default: false).
    #[serde(default)]
    pub offline: bool,
    /// Language for annotations and summaries.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cache_path: default_cache_path(),
            offline: false,
            language: default_language(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("analysis_cache.json")
}

fn default_language() -> String {
    DEFAULT_OUTPUT_LANGUAGE.to_string()
}

/// Retry coordinator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Full passes over the model list (default: 3).
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// First backoff delay in seconds (default: 2).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    /// Upper bound for any backoff delay in seconds (default: 60).
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_rounds(self.max_rounds)
            .initial_delay(Duration::from_secs(self.initial_delay_secs))
            .max_delay(Duration::from_secs(self.max_delay_secs))
    }
}

fn default_max_rounds() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    2
}

fn default_max_delay() -> u64 {
    60
}

/// Remote processing poll settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PollSettings {
    /// Seconds between state checks (default: 5).
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Total wait before giving up (default: 180).
    #[serde(default = "default_poll_max_wait")]
    pub max_wait_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_wait_secs: default_poll_max_wait(),
        }
    }
}

impl PollSettings {
    pub fn to_poll_config(&self) -> PollConfig {
        PollConfig::new()
            .interval(Duration::from_secs(self.interval_secs))
            .max_wait(Duration::from_secs(self.max_wait_secs))
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_max_wait() -> u64 {
    180
}

/// Candidate model lists, in preference order.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_annotation_models")]
    pub annotation: Vec<String>,
    #[serde(default = "default_summary_models")]
    pub summary: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            annotation: default_annotation_models(),
            summary: default_summary_models(),
        }
    }
}

fn default_annotation_models() -> Vec<String> {
    DEFAULT_ANNOTATION_MODELS.map(String::from).to_vec()
}

fn default_summary_models() -> Vec<String> {
    DEFAULT_SUMMARY_MODELS.map(String::from).to_vec()
}

/// Gemini endpoint configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiConfig {
    /// Override the API base URL (default: the public endpoint).
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Report output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Where the JSON report is written (default: huginn_report.json).
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: default_report_path(),
        }
    }
}

fn default_report_path() -> PathBuf {
    PathBuf::from("huginn_report.json")
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub gemini: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path that does not exist is an error; otherwise a
    /// missing file means defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".huginn").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/huginn/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(HuginnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The Gemini key from the secrets file, else from `GEMINI_API_KEY`.
    ///
    /// Blank values count as missing.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.gemini
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(GEMINI_API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
