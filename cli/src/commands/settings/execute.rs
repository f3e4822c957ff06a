use std::error::Error;

use ddb::ConnectionConfig;
use serde::Serialize;
use tracing::debug;

use super::SettingsCmd;
use crate::commands::Execute;

/// Result of the settings command execution
#[derive(Debug, Serialize)]
pub struct SettingsResult {
    pub source: String,
    pub config: ConnectionConfig,
    pub pool_size: usize,
}

impl Execute for SettingsCmd {
    type Output = SettingsResult;

    fn execute(self) -> Result<Self::Output, Box<dyn Error>> {
        let config = ConnectionConfig::load(&self.path)?;
        let pool_size = config.pool_size()?;
        debug!(path = %self.path.display(), url = %config.url, pool_size, "settings validated");
        Ok(SettingsResult {
            source: self.path.display().to_string(),
            config: config.masked(),
            pool_size,
        })
    }
}
