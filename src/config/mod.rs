//! Configuration management
//!
//! Static controller configuration read from a TOML file.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::topology::BridgeTable;
use crate::{Error, Result};
use std::path::Path;
use std::time::Duration;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

impl Config {
    pub fn session_ttl(&self) -> Option<Duration> {
        self.auth.session_ttl_secs.map(Duration::from_secs)
    }

    pub fn bridge_table(&self) -> Result<BridgeTable> {
        BridgeTable::from_config(&self.stp.bridges)
    }
}
