//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `Execute` impl producing a serializable result
//! - An `Outputable` impl for the table format

mod frame;
mod settings;
mod values;

pub use frame::FrameCmd;
pub use settings::SettingsCmd;
pub use values::ValuesCmd;

use clap::Subcommand;
use std::error::Error;
use std::fs;
use std::path::Path;

use ddb::DataForm;
use thiserror::Error;
use tracing::debug;

use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute(self) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a dataform dump as a typed frame
    Frame(FrameCmd),

    /// Render a dataform dump as text/value pairs
    Values(ValuesCmd),

    /// Validate a datasource settings file
    Settings(SettingsCmd),
}

impl Command {
    /// Execute the command and return formatted output
    pub fn run(self, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Frame(cmd) => {
                let result = cmd.execute()?;
                Ok(result.format(format))
            }
            Command::Values(cmd) => {
                let result = cmd.execute()?;
                Ok(result.format(format))
            }
            Command::Settings(cmd) => {
                let result = cmd.execute()?;
                Ok(result.format(format))
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("failed to read dump '{path}': {message}")]
    ReadFailed { path: String, message: String },

    #[error("failed to parse dump '{path}': {message}")]
    ParseFailed { path: String, message: String },
}

/// Load a dataform previously dumped as JSON.
pub fn load_dataform(path: &Path) -> Result<DataForm, DumpError> {
    let content = fs::read(path).map_err(|e| DumpError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let dataform: DataForm = serde_json::from_slice(&content).map_err(|e| DumpError::ParseFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!(path = %path.display(), bytes = content.len(), form = dataform.form_name(), "loaded dump");
    Ok(dataform)
}
