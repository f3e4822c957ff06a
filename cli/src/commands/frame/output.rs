//! Output formatting for frame command results.

use ddb::types::stringify;

use super::execute::FrameResult;
use crate::output::{Outputable, render_grid};

impl Outputable for FrameResult {
    fn to_table(&self) -> String {
        let frame = &self.frame;
        let mut lines = Vec::new();

        lines.push(format!("Frame: {} ({})", frame.name, self.source));
        lines.push(String::new());

        if frame.fields.is_empty() {
            lines.push("No columns.".to_string());
        } else {
            lines.push(format!(
                "Columns ({}), rows ({}):",
                frame.fields.len(),
                frame.row_count()
            ));
            lines.push(String::new());

            let header: Vec<String> = frame
                .fields
                .iter()
                .map(|f| format!("{} [{}]", f.name, f.host_type().name()))
                .collect();
            let rows: Vec<Vec<String>> = (0..frame.row_count())
                .map(|i| {
                    frame
                        .fields
                        .iter()
                        .map(|f| stringify(f.values.get(i).flatten().as_ref()))
                        .collect()
                })
                .collect();
            lines.push(render_grid(&header, &rows));
        }

        if !self.dropped.is_empty() {
            lines.push(String::new());
            lines.push(format!("Dropped columns: {}", self.dropped.join(", ")));
        }

        lines.join("\n")
    }
}
