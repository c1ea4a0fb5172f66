//! Limiter settings loadable from YAML.
//!
//! Applications that prefer declaring their limits in configuration files
//! over constructing algorithms in code can load a [`RatelimitConfig`] and
//! hand it to [`RateLimiter::from_config`](crate::ratelimit::RateLimiter::from_config).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::duration::parse_duration;
use crate::error::{RatelimitError, Result};
use crate::ratelimit::{Algorithm, FixedWindow, SlidingWindow, TokenBucket, DEFAULT_PREFIX};

/// Algorithm selection with its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    /// Fixed window: `tokens` requests per aligned `window`.
    FixedWindow { tokens: u64, window: String },
    /// Sliding window: `tokens` requests per rolling `window`.
    SlidingWindow { tokens: u64, window: String },
    /// Token bucket: `refill_rate` tokens per `interval`, capped at
    /// `max_tokens`.
    TokenBucket {
        refill_rate: u64,
        interval: String,
        max_tokens: u64,
    },
}

/// A complete limiter declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatelimitConfig {
    /// Algorithm and its parameters.
    #[serde(flatten)]
    pub algorithm: AlgorithmConfig,

    /// Key prefix isolating this limiter's state.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Watchdog timeout as a duration string; `"0"` disables fail-open.
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_timeout() -> String {
    "5s".to_string()
}

impl RatelimitConfig {
    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RatelimitError::Config(format!("failed to parse limiter config: {}", e)))
    }

    /// Build the configured algorithm.
    pub fn build_algorithm(&self) -> Result<Box<dyn Algorithm>> {
        Ok(match &self.algorithm {
            AlgorithmConfig::FixedWindow { tokens, window } => {
                Box::new(FixedWindow::new(*tokens, window)?)
            }
            AlgorithmConfig::SlidingWindow { tokens, window } => {
                Box::new(SlidingWindow::new(*tokens, window)?)
            }
            AlgorithmConfig::TokenBucket {
                refill_rate,
                interval,
                max_tokens,
            } => Box::new(TokenBucket::new(*refill_rate, interval, *max_tokens)?),
        })
    }

    /// The parsed watchdog timeout; `None` when disabled.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let duration = parse_duration(&self.timeout)?;
        Ok((!duration.is_zero()).then_some(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_window_with_defaults() {
        let yaml = r#"
algorithm: fixed_window
tokens: 10
window: 10s
"#;
        let config = RatelimitConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.algorithm,
            AlgorithmConfig::FixedWindow { tokens: 10, .. }
        ));
        assert_eq!(config.prefix, "@hummn/ratelimit");
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(5)));
        config.build_algorithm().unwrap();
    }

    #[test]
    fn parses_token_bucket_with_overrides() {
        let yaml = r#"
algorithm: token_bucket
refill_rate: 5
interval: 1s
max_tokens: 100
prefix: myapp
timeout: 250ms
"#;
        let config = RatelimitConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.prefix, "myapp");
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_millis(250)));
        config.build_algorithm().unwrap();
    }

    #[test]
    fn zero_timeout_disables_watchdog() {
        let yaml = r#"
algorithm: sliding_window
tokens: 3
window: 2s
timeout: "0"
"#;
        let config = RatelimitConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.timeout().unwrap(), None);
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let yaml = r#"
algorithm: leaky_bucket
tokens: 3
window: 2s
"#;
        assert!(matches!(
            RatelimitConfig::from_yaml(yaml),
            Err(RatelimitError::Config(_))
        ));
    }

    #[test]
    fn rejects_bad_window_at_build() {
        let yaml = r#"
algorithm: fixed_window
tokens: 3
window: nonsense
"#;
        let config = RatelimitConfig::from_yaml(yaml).unwrap();
        assert!(config.build_algorithm().is_err());
    }
}
