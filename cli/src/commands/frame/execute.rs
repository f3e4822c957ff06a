use std::error::Error;

use ddb::{Frame, transform_to_table};
use serde::Serialize;

use super::FrameCmd;
use crate::commands::{Execute, load_dataform};

/// Result of the frame command execution
#[derive(Debug, Serialize)]
pub struct FrameResult {
    pub source: String,
    pub frame: Frame,
    /// Columns present in the dump but dropped during conversion
    pub dropped: Vec<String>,
}

impl Execute for FrameCmd {
    type Output = FrameResult;

    fn execute(self) -> Result<Self::Output, Box<dyn Error>> {
        let dataform = load_dataform(&self.dump)?;
        let frame = transform_to_table(&dataform, &self.label)?;

        let dropped = dataform
            .as_table()
            .map(|table| {
                table
                    .columns()
                    .map(|(name, _)| name)
                    .filter(|name| frame.field(name).is_none())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(FrameResult {
            source: self.dump.display().to_string(),
            frame,
            dropped,
        })
    }
}
