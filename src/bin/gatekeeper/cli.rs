//! Command-line interface definition.

use clap::{Parser, ValueEnum};
use gatekeeper::GateConfig;
use std::path::PathBuf;

/// Log output format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text lines.
    Text,
    /// One JSON object per line, for log collectors.
    Json,
}

/// Event-gate ticket verification service.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Cache store connection URL.
    #[arg(long, env = "GATE_STORE_URL")]
    pub store_url: Option<String>,

    /// Issuer identity every ticket token must carry.
    #[arg(long, env = "GATE_ISSUER")]
    pub issuer: Option<String>,

    /// Shared secret verifying ticket token signatures.
    #[arg(long, env = "GATE_TOKEN_SECRET")]
    pub token_secret: Option<String>,

    /// Number of background queue workers.
    #[arg(long, short, env = "GATE_WORKERS")]
    pub workers: Option<usize>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text", env = "GATE_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Convert CLI arguments into a `GateConfig`.
    ///
    /// Precedence: CLI/env flags override the config file, which overrides
    /// defaults. Without an explicit `--config`, the per-user config file is
    /// used when it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<GateConfig> {
        let mut config = if let Some(ref path) = self.config {
            GateConfig::from_file(path)?
        } else if let Some(path) = default_config_path() {
            if path.exists() {
                GateConfig::from_file(&path)?
            } else {
                GateConfig::default()
            }
        } else {
            GateConfig::default()
        };

        if let Some(store_url) = self.store_url {
            config.store_url = store_url;
        }
        if let Some(issuer) = self.issuer {
            config.issuer = issuer;
        }
        if let Some(token_secret) = self.token_secret {
            config.token_secret = token_secret;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.log_level = self.log_level;

        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "gatekeeper")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
