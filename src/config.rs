//! Configuration System
//!
//! Hierarchical configuration loading from:
//! - config.toml (base configuration)
//! - an explicit `--config` file, when given
//! - Environment variables (`BEINGDB_*` prefix, `__` section separator)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [pack]
//! dir = "/var/lib/beingdb/pack"
//!
//! [query]
//! timeout_ms = 5000
//! max_intermediate_results = 10000
//!
//! [server]
//! port = 8080
//! max_results = 1000
//! max_concurrent = 20
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! BEINGDB_PACK__DIR=/custom/pack
//! BEINGDB_SERVER__PORT=9090
//! ```

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::execution::{ExecutionConfig, ResourceLimits};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pack: PackConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pack snapshot location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackConfig {
    /// Directory of the served pack snapshot
    #[serde(default = "default_pack_dir")]
    pub dir: PathBuf,
}

/// Query execution guards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Query deadline in milliseconds. 0 = no deadline.
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,

    /// Cap on candidate bindings produced during a join. 0 = no cap.
    #[serde(default = "default_max_intermediate_results")]
    pub max_intermediate_results: usize,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Ceiling on results returned per request
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Admission gate: concurrent query handlers allowed before 503
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Allowed CORS origins (empty = permissive)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_pack_dir() -> PathBuf {
    PathBuf::from("./pack")
}
fn default_query_timeout_ms() -> u64 {
    5_000
}
fn default_max_intermediate_results() -> usize {
    10_000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_results() -> usize {
    1_000
}
fn default_max_concurrent() -> usize {
    20
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for PackConfig {
    fn default() -> Self {
        PackConfig {
            dir: default_pack_dir(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            timeout_ms: default_query_timeout_ms(),
            max_intermediate_results: default_max_intermediate_results(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            max_results: default_max_results(),
            max_concurrent: default_max_concurrent(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pack: PackConfig::default(),
            query: QueryConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Merges in order: `config.toml`, then `BEINGDB_*` environment
    /// variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("BEINGDB_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BEINGDB_").split("__"))
            .extract()
    }
}

impl QueryConfig {
    /// The execution guards this configuration describes.
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            timeout: match self.timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            limits: match self.max_intermediate_results {
                0 => ResourceLimits::unlimited(),
                cap => ResourceLimits::default().with_max_intermediate_results(cap),
            },
        }
    }
}
