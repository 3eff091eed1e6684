//! Configuration for worker pools
//!
//! A [`PoolConfig`] describes the bounded worker pool behind a manager
//! service. It can be built in code or loaded from disk:
//!
//! - `*.json` files are parsed as JSON
//! - any other extension is parsed as TOML
//!
//! # Example
//!
//! ```ignore
//! use qpipe::config::PoolConfig;
//!
//! // pool.toml:
//! //   worker_threads = 8
//! //   thread_name_prefix = "fetch"
//! let config = PoolConfig::load("pool.toml")?;
//! let pool = qpipe::WorkerPool::from_config(&config)?;
//! ```

use crate::error::{QpipeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default thread name prefix for pool workers
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "qpipe-worker";

/// Configuration of a bounded worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Prefix for worker thread names (`{prefix}-{index}`)
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_thread_name_prefix() -> String {
    DEFAULT_THREAD_NAME_PREFIX.to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl PoolConfig {
    /// Configuration with a fixed number of threads and the default prefix
    pub fn with_threads(worker_threads: usize) -> Self {
        Self {
            worker_threads,
            ..Default::default()
        }
    }

    /// Set the thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Check the configuration for values a pool cannot be built from
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(QpipeError::Configuration(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(QpipeError::Configuration(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration file (JSON or TOML by extension)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: Self = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                QpipeError::Serialization(format!("Failed to parse {:?}: {}", path, e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                QpipeError::Serialization(format!("Failed to parse {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        tracing::debug!(
            "Loaded pool config from {:?}: {} threads",
            path,
            config.worker_threads
        );
        Ok(config)
    }

    /// Save the configuration (JSON or TOML by extension)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let content = if is_json {
            serde_json::to_string_pretty(self)
                .map_err(|e| QpipeError::Serialization(format!("Failed to serialize: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| QpipeError::Serialization(format!("Failed to serialize: {}", e)))?
        };

        std::fs::write(path, content)?;
        Ok(())
    }
}
