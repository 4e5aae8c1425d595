//! Configuration management for the window cache
//!
//! This module provides configuration file support with TOML format,
//! environment variable overrides, and sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::DEFAULT_STEP_DIVISORS;
use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Cache behaviour
    #[serde(default)]
    pub cache: CacheConfig,

    /// Worker execution limits
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Logging
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Serve cacheable requests through the cache
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Divisors used to derive finer compatible steps
    #[serde(default = "default_step_divisors")]
    pub step_divisors: Vec<i64>,

    /// Capacity of the in-memory cache store
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Workers running at once per request
    #[serde(default = "default_max_parallel_workers")]
    pub max_parallel_workers: usize,

    /// Worker execution deadline in milliseconds, 0 disables it
    #[serde(default)]
    pub request_timeout_ms: u64,

    /// Maximum windows a request may span
    #[serde(default = "default_max_windows")]
    pub max_windows: u64,
}

/// Monitoring configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level (trace, debug, info, warn, error) or an env-filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_ttl_secs() -> u64 { 300 }
fn default_step_divisors() -> Vec<i64> { DEFAULT_STEP_DIVISORS.to_vec() }
fn default_max_entries() -> usize { 1_000_000 }
fn default_max_parallel_workers() -> usize { 8 }
fn default_max_windows() -> u64 { 100_000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: default_ttl_secs(),
            step_divisors: default_step_divisors(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_parallel_workers: default_max_parallel_workers(),
            request_timeout_ms: 0,
            max_windows: default_max_windows(),
        }
    }
}

impl ExecutionConfig {
    /// Worker execution deadline, if any
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        // Cache
        if let Ok(enabled) = std::env::var("TSDB_CACHE_ENABLED") {
            if let Ok(v) = enabled.parse() {
                self.cache.enabled = v;
            }
        }
        if let Ok(ttl) = std::env::var("TSDB_CACHE_TTL_SECS") {
            if let Ok(v) = ttl.parse() {
                self.cache.ttl_secs = v;
            }
        }

        // Execution
        if let Ok(workers) = std::env::var("TSDB_MAX_PARALLEL_WORKERS") {
            if let Ok(v) = workers.parse() {
                self.execution.max_parallel_workers = v;
            }
        }
        if let Ok(timeout) = std::env::var("TSDB_REQUEST_TIMEOUT_MS") {
            if let Ok(v) = timeout.parse() {
                self.execution.request_timeout_ms = v;
            }
        }

        // Monitoring
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            return Err(Error::Configuration("Cache TTL must be > 0".to_string()));
        }
        if self.cache.step_divisors.is_empty() {
            return Err(Error::Configuration(
                "At least one step divisor is required".to_string(),
            ));
        }
        if let Some(d) = self.cache.step_divisors.iter().find(|&&d| d < 2) {
            return Err(Error::Configuration(format!(
                "Step divisors must be >= 2, got {}",
                d
            )));
        }
        if self.cache.max_entries == 0 {
            return Err(Error::Configuration("Cache max entries must be > 0".to_string()));
        }

        if self.execution.max_parallel_workers == 0 {
            return Err(Error::Configuration(
                "Max parallel workers must be > 0".to_string(),
            ));
        }
        if self.execution.max_windows == 0 {
            return Err(Error::Configuration("Max windows must be > 0".to_string()));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }
}
