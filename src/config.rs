//! Configuration management for Ratewarden.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{LimiterError, Result};

/// Configuration for a single limiter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Which strategy to run and its parameters
    #[serde(flatten)]
    pub strategy: StrategyConfig,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
        }
    }
}

/// Rate limiting strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// At most `max_requests` actions in any trailing window
    SlidingWindow {
        /// Window length in seconds
        #[serde(default = "default_window_size")]
        window_size_secs: f64,
        /// Maximum actions per window
        #[serde(default = "default_max_requests")]
        max_requests: usize,
    },
    /// At most one action per `min_interval_secs`
    Throttle {
        /// Cooldown between admissions in seconds
        #[serde(default = "default_min_interval")]
        min_interval_secs: f64,
        /// Idle time after which a caller is evicted (disabled if unset)
        #[serde(default)]
        retention_secs: Option<f64>,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::sliding_window()
    }
}

impl StrategyConfig {
    /// Sliding window with default parameters.
    pub fn sliding_window() -> Self {
        StrategyConfig::SlidingWindow {
            window_size_secs: default_window_size(),
            max_requests: default_max_requests(),
        }
    }

    /// Throttle with default parameters.
    pub fn throttle() -> Self {
        StrategyConfig::Throttle {
            min_interval_secs: default_min_interval(),
            retention_secs: None,
        }
    }
}

fn default_window_size() -> f64 {
    10.0
}

fn default_max_requests() -> usize {
    1
}

fn default_min_interval() -> f64 {
    10.0
}

impl LimiterConfig {
    /// Load configuration from a file path.
    ///
    /// The format (YAML, TOML or JSON) is picked from the file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        if !path.exists() {
            return Err(LimiterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("configuration file not found: {}", path.display()),
            )));
        }

        let config: LimiterConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LimiterConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse limiter config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges without building a limiter.
    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            StrategyConfig::SlidingWindow {
                window_size_secs,
                max_requests,
            } => {
                if !window_size_secs.is_finite() || window_size_secs <= 0.0 {
                    return Err(LimiterError::Config(format!(
                        "window_size_secs must be positive, got {}",
                        window_size_secs
                    )));
                }
                if max_requests == 0 {
                    return Err(LimiterError::Config(
                        "max_requests must be greater than zero".to_string(),
                    ));
                }
            }
            StrategyConfig::Throttle {
                min_interval_secs,
                retention_secs,
            } => {
                if !min_interval_secs.is_finite() || min_interval_secs <= 0.0 {
                    return Err(LimiterError::Config(format!(
                        "min_interval_secs must be positive, got {}",
                        min_interval_secs
                    )));
                }
                if let Some(retention) = retention_secs {
                    if !retention.is_finite() || retention < min_interval_secs {
                        return Err(LimiterError::Config(format!(
                            "retention_secs ({}) must not be shorter than min_interval_secs ({})",
                            retention, min_interval_secs
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
