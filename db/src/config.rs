//! Datasource settings.
//!
//! Settings arrive as the JSON object the host stores per datasource. Every
//! field takes part in equality: two configs compare equal only when all fields
//! match, and that equality alone decides whether a cached connection is reused.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors. Fatal to the current request and never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not unmarshal settings json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read settings file '{path}': {message}")]
    ReadFailed { path: String, message: String },

    #[error("pool capacity '{value}' is not a positive integer: {reason}")]
    InvalidPoolCapacity { value: String, reason: String },
}

/// Connection settings for one datasource.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// Server address, `host:port`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Kept as text so a malformed value is reported at connect time.
    pub pool_capacity: String,
    pub autologin: bool,
    pub verbose: bool,
    pub python: bool,
}

impl ConnectionConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        pool_capacity: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            pool_capacity: pool_capacity.into(),
            ..Self::default()
        }
    }

    /// Parse settings from the datasource JSON object.
    pub fn from_json(json: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(json)?)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Parsed pool capacity. Must be a positive integer.
    pub fn pool_size(&self) -> Result<usize, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPoolCapacity {
            value: self.pool_capacity.clone(),
            reason,
        };
        let size: usize = self
            .pool_capacity
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
        if size == 0 {
            return Err(invalid("must be greater than zero".to_string()));
        }
        Ok(size)
    }

    /// Copy of this config with the password replaced, safe to print.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        if !masked.password.is_empty() {
            masked.password = "******".to_string();
        }
        masked
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"******")
            .field("pool_capacity", &self.pool_capacity)
            .field("autologin", &self.autologin)
            .field("verbose", &self.verbose)
            .field("python", &self.python)
            .finish()
    }
}
