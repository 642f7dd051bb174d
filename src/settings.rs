use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Process-wide settings, loaded once from a file (JSON or TOML, by
/// extension) with a `DYNDNS_`-prefixed environment overlay.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub api_key: String,
    pub api_password: String,
    pub customer_id: String,

    /// Address of a local FRITZ!Box. When set, the external IP is read
    /// from the router instead of the public echo service.
    pub fritzbox_ip: Option<String>,

    /// Default log filter for server mode.
    pub log_level: Option<String>,

    /// Path of the subdomain mapping used by server mode, relative to
    /// the settings file.
    pub subdomains: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("DYNDNS"))
            .build()?;

        cfg.try_deserialize()
    }
}
