//! Configuration loading and defaults for the proxy.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_MODEL: &str = "MiniMax-M2";
const DEFAULT_BASE_URL: &str = "https://api.minimaxi.com";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_PACING_MS: u64 = 10;
const CONFIG_FILE_NAME: &str = "minimax-proxy.toml";

// === Types ===

/// Raw retry configuration loaded from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub initial_delay: Option<f64>,
    pub max_delay: Option<f64>,
    pub exponential_base: Option<f64>,
}

/// Resolved retry policy with defaults applied.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_delay: f64,
    pub max_delay: f64,
    pub exponential_base: f64,
}

impl RetryPolicy {
    /// Compute the backoff delay for a retry attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay * self.exponential_base.powi(exponent);
        let delay = delay.min(self.max_delay);
        // Guard against NaN/negative from misconfigured values
        let delay = delay.clamp(0.0, 300.0);
        Duration::from_secs_f64(delay)
    }
}

/// Resolved proxy configuration, including defaults and environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub static_dir: Option<String>,
    /// Delay in milliseconds inserted after each emitted stream frame.
    pub pacing_ms: Option<u64>,
    pub retry: Option<RetryConfig>,
}

// === Config Loading ===

impl Config {
    /// Load configuration from an optional TOML file. A missing file is not
    /// an error; environment overrides are applied by the accessors below.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Read the MiniMax API key from the environment or config file.
    pub fn minimax_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var("MINIMAX_API_KEY")
            && !key.trim().is_empty()
        {
            return Ok(key);
        }

        if let Some(configured) = self.api_key.clone()
            && !configured.trim().is_empty()
        {
            return Ok(configured);
        }

        anyhow::bail!(
            "MiniMax API key not found. Set it using one of these methods:\n\
             1. Set the MINIMAX_API_KEY environment variable (recommended)\n\
             2. Add 'api_key = \"...\"' to {CONFIG_FILE_NAME}"
        )
    }

    #[must_use]
    pub fn minimax_base_url(&self) -> String {
        let base = std::env::var("MINIMAX_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        normalize_base_url(&base)
    }

    #[must_use]
    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    #[must_use]
    pub fn static_dir(&self) -> PathBuf {
        PathBuf::from(
            self.static_dir
                .clone()
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
        )
    }

    /// Pacing delay between emitted frames. Purely a UX smoothing knob.
    #[must_use]
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms.unwrap_or(DEFAULT_PACING_MS))
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy {
            enabled: true,
            max_retries: 3,
            initial_delay: 1.0,
            max_delay: 60.0,
            exponential_base: 2.0,
        };

        let Some(cfg) = &self.retry else {
            return defaults;
        };

        RetryPolicy {
            enabled: cfg.enabled.unwrap_or(defaults.enabled),
            max_retries: cfg.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: cfg.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: cfg.max_delay.unwrap_or(defaults.max_delay),
            exponential_base: cfg.exponential_base.unwrap_or(defaults.exponential_base),
        }
    }
}

/// Strip a trailing slash and a trailing `/v1` segment: the client appends
/// the full `/v1/...` path itself.
fn normalize_base_url(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/v1").unwrap_or(trimmed);
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_apply_without_config_file() {
        let config = Config::default();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.static_dir(), PathBuf::from("static"));
        assert_eq!(config.pacing(), Duration::from_millis(10));
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(normalize_base_url("https://api.minimaxi.com/v1/"), "https://api.minimaxi.com");
        assert_eq!(normalize_base_url("https://api.minimaxi.com/"), "https://api.minimaxi.com");
        assert_eq!(normalize_base_url("http://localhost:9000"), "http://localhost:9000");
    }

    #[test]
    fn retry_delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            enabled: true,
            max_retries: 5,
            initial_delay: 1.0,
            max_delay: 4.0,
            exponential_base: 2.0,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs_f64(1.0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs_f64(2.0));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs_f64(4.0));
    }

    #[test]
    fn loads_values_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "model = \"MiniMax-M2\"\npacing_ms = 0\n\n[retry]\nmax_retries = 1"
        )
        .unwrap();
        let config = Config::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.pacing(), Duration::ZERO);
        assert_eq!(config.retry_policy().max_retries, 1);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = Config::load(Some(PathBuf::from("/nonexistent/minimax-proxy.toml"))).unwrap();
        assert!(config.api_key.is_none());
    }
}
