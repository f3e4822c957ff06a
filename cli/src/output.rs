//! Output formatting for command results.
//!
//! Supports multiple output formats: table (human-readable), JSON, and toon.

use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Token-efficient toon format
    Toon,
}

/// Trait for types that can be formatted for output
pub trait Outputable: Serialize {
    /// Format as a human-readable table
    fn to_table(&self) -> String;

    /// Format according to the specified output format
    fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => self.to_table(),
            OutputFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Toon => {
                let json_value = serde_json::to_value(self).unwrap_or_default();
                toon::encode(&json_value, None)
            }
        }
    }
}

/// Render rows under a header with every column padded to its widest cell.
pub fn render_grid(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![line(header)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| line(row.as_slice())));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Serialize)]
    struct Sample {
        name: String,
    }

    impl Outputable for Sample {
        fn to_table(&self) -> String {
            format!("Sample: {}", self.name)
        }
    }

    #[rstest]
    fn test_format_dispatch() {
        let sample = Sample { name: "x".to_string() };
        assert_eq!(sample.format(OutputFormat::Table), "Sample: x");
        assert_eq!(sample.format(OutputFormat::Json), "{\n  \"name\": \"x\"\n}");
        assert!(sample.format(OutputFormat::Toon).contains("name"));
    }

    #[rstest]
    fn test_render_grid_pads_columns() {
        let header = vec!["sym".to_string(), "price".to_string()];
        let rows = vec![
            vec!["IBM".to_string(), "1.5".to_string()],
            vec!["GOOGL".to_string(), "".to_string()],
        ];
        let expected = "\
sym    price
-----  -----
IBM    1.5
GOOGL";
        assert_eq!(render_grid(&header, &rows), expected);
    }
}
