mod execute;
mod output;

use std::path::PathBuf;

use clap::Args;

/// Render a dataform dump as a typed frame
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  ddb-frames frame result.json                     # Columns of a dumped table
  ddb-frames frame result.json --label 'Response B'
  ddb-frames frame result.json -o json             # Frame as JSON")]
pub struct FrameCmd {
    /// Path to a JSON dataform dump
    pub dump: PathBuf,

    /// Frame name
    #[arg(short, long, default_value = "Response A")]
    pub label: String,
}
