//! Connection configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, StowError};

/// Default database name
pub const DEFAULT_DB_NAME: &str = "stow";

/// Which database a [`Connection`](crate::Connection) opens, and at which schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Database name
    pub name: String,
    /// Schema version; raising it triggers the upgrade callback on next open
    pub version: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DB_NAME.to_string(),
            version: 1,
        }
    }
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse and validate a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject what every engine would refuse to open. Any string, including
    /// the empty one, is a valid database name.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(StowError::Config("version must be greater than 0".into()));
        }
        Ok(())
    }
}
