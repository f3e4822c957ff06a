mod execute;
mod output;

use std::path::PathBuf;

use clap::Args;

/// Validate a datasource settings file
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  ddb-frames settings datasource.json          # Check settings and pool capacity
  ddb-frames settings datasource.json -o json  # Normalised settings, password masked")]
pub struct SettingsCmd {
    /// Path to the datasource settings JSON
    pub path: PathBuf,
}
