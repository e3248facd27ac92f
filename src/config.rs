//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section and field has a default, so a missing file (or a file
//! that only overrides a few values) is valid. CLI flags are applied on
//! top by `main`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::llm::Provider;
use crate::llm::dispatch::RetryPolicy;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub llm: LlmConfig,
    pub detection: DetectionConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub polymarket: PolymarketConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one timestamp-named directory per snapshot.
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Raw newline-delimited credential list.
    pub keys_file: PathBuf,
    /// Cache of credentials that passed the last probe.
    pub working_keys_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            keys_file: PathBuf::from("openai_keys.txt"),
            working_keys_file: PathBuf::from("working_keys.txt"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    /// Overrides the provider's default primary model.
    pub model: Option<String>,
    /// Overrides the provider's default larger-context model.
    pub large_context_model: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: None,
            large_context_model: None,
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    /// Slack below 1.0 a price sum must clear before it counts.
    pub threshold: Decimal,
    /// Records per category sent to the semantic detector.
    pub semantic_max_records: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: dec!(0.01),
            semantic_max_records: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Category files analysed at once.
    pub files: usize,
    /// Validations in flight per category file.
    pub validations: usize,
    /// Bounds for the global in-flight LLM call limit.
    pub llm_floor: usize,
    pub llm_ceiling: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            files: 50,
            validations: 50,
            llm_floor: 5,
            llm_ceiling: 50,
        }
    }
}

impl ConcurrencyConfig {
    /// In-flight LLM call limit for a pool of `working` credentials:
    /// `max(floor, min(2 * working, ceiling))`.
    pub fn llm_limit(&self, working: usize) -> usize {
        self.llm_floor
            .max(working.saturating_mul(2).min(self.llm_ceiling))
            .max(1)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub rate_limit_backoff_ms: u64,
    pub retry_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_backoff_ms: 500,
            retry_backoff_ms: 0,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PolymarketConfig {
    pub gamma_url: String,
    pub timeout_secs: u64,
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}
