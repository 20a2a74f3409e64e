//! Client settings

use std::path::PathBuf;

use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};

/// Config file read when no other is given
pub const DEFAULT_CONFIG_FILE: &str = "galaxy.toml";

/// Galaxy server
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Galaxy {
    /// Base URL of the Galaxy server
    pub url: String,
    /// API key sent as `x-api-key`
    pub api_key: String,
}

/// HTTP behaviour
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Http {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Retries for failed calls
    pub retry: Option<u32>,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: Option<u64>,
    /// Proxy URL
    pub proxy: Option<String>,
    /// Only hosts matching this pattern go through the proxy
    pub proxy_pattern: Option<String>,
    /// Accept invalid TLS certificates
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

/// Galaxy client settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Galaxy server
    pub galaxy: Galaxy,
    /// HTTP behaviour
    #[serde(default)]
    pub http: Http,
}

impl Settings {
    /// Read settings from `config_file_name`, or [`DEFAULT_CONFIG_FILE`]
    ///
    /// A missing file leaves the defaults in place.
    pub fn new<P>(config_file_name: Option<P>) -> Result<Self, ConfigError>
    where
        P: Into<PathBuf>,
    {
        let config_file: String = match config_file_name {
            Some(value) => value.into().to_string_lossy().to_string(),
            None => DEFAULT_CONFIG_FILE.to_string(),
        };

        let config = Config::builder()
            // use defaults
            .add_source(Config::try_from(&Settings::default())?)
            // override with file contents
            .add_source(File::with_name(&config_file).required(false))
            .build()?;

        config.try_deserialize()
    }
}
