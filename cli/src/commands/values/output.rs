//! Output formatting for values command results.

use super::execute::ValuesResult;
use crate::output::Outputable;

impl Outputable for ValuesResult {
    fn to_table(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Values: {} ({})", self.source, self.form));
        lines.push(String::new());

        if self.values.is_empty() {
            lines.push("No values.".to_string());
        } else {
            lines.push(format!("Found {} value(s):", self.values.len()));
            for pair in &self.values {
                match &pair.value {
                    Some(value) => lines.push(format!("  {} [{}]", pair.text, value.host_type().name())),
                    None => lines.push("  (null)".to_string()),
                }
            }
        }

        lines.join("\n")
    }
}
