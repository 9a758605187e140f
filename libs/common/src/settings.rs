//! HTTP server settings loaded through the `config` crate

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

/// Address a service binds to
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load `<PREFIX>_HOST` / `<PREFIX>_PORT`, falling back to
    /// `0.0.0.0:<default_port>`.
    pub fn load(prefix: &str, default_port: u16) -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", default_port)?
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
