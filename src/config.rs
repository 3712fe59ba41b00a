//! Configuration for gatekeeper.

use serde::{Deserialize, Serialize};

/// Gate service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Cache store connection URL.
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Issuer identity every ticket token must carry.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Shared secret verifying ticket token signatures. Must be set before
    /// the gate can start.
    #[serde(default)]
    pub token_secret: String,

    /// Number of background queue workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bound on queued verification jobs.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            issuer: default_issuer(),
            token_secret: String::new(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            log_level: default_log_level(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_issuer() -> String {
    "gatekeeper".to_string()
}

const fn default_workers() -> usize {
    4
}

const fn default_queue_capacity() -> usize {
    crate::queue::DEFAULT_QUEUE_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GateConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
