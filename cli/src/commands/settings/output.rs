//! Output formatting for settings command results.

use super::execute::SettingsResult;
use crate::output::Outputable;

impl Outputable for SettingsResult {
    fn to_table(&self) -> String {
        let config = &self.config;
        let flag = |on: bool| if on { "yes" } else { "no" };

        [
            format!("Settings: {}", self.source),
            String::new(),
            format!("  url:       {}", config.url),
            format!("  username:  {}", config.username),
            format!("  password:  {}", config.password),
            format!("  pool size: {}", self.pool_size),
            format!("  autologin: {}", flag(config.autologin)),
            format!("  verbose:   {}", flag(config.verbose)),
            format!("  python:    {}", flag(config.python)),
        ]
        .join("\n")
    }
}
