mod execute;
mod output;

use std::path::PathBuf;

use clap::Args;

/// Render a dataform dump as text/value pairs
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  ddb-frames values symbols.json          # One line per element
  ddb-frames values symbols.json -o json  # [{\"text\": ..., \"value\": ...}]")]
pub struct ValuesCmd {
    /// Path to a JSON dataform dump
    pub dump: PathBuf,
}
