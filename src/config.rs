//! Server configuration
//!
//! Priority: CLI flags > `DAGENIE_*` environment > config file > defaults.
//! CLI flags are applied by the binaries on top of what [`ServerConfig::load`] returns.

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config files probed in order; the first existing one is used.
pub const CONFIG_PATHS: [&str; 2] = ["./dagenie.toml", "/etc/dagenie/dagenie.toml"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Namespace every new session starts in
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    /// Logged operations between snapshots
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: usize,
    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log")]
    pub log: String,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 9090 }
fn default_data_dir() -> PathBuf { PathBuf::from("./data") }
fn default_namespace() -> String { "default".to_string() }
fn default_snapshot_threshold() -> usize { crate::storage::disk::DEFAULT_SNAPSHOT_THRESHOLD }
fn default_log() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            default_namespace: default_namespace(),
            snapshot_threshold: default_snapshot_threshold(),
            log: default_log(),
        }
    }
}

impl ServerConfig {
    /// Load from the first existing file in [`CONFIG_PATHS`] plus the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = CONFIG_PATHS.iter().map(Path::new).find(|p| p.exists());
        Self::load_from(file)
    }

    /// Load from an explicit file (if any) plus the environment.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "loading config file");
            builder = builder.add_source(File::from(path));
        }
        // DAGENIE_DATA_DIR -> data_dir
        builder = builder.add_source(Environment::with_prefix("DAGENIE").try_parsing(true));
        builder.build()?.try_deserialize()
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
