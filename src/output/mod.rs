//! Rendering of analysis results.
//!
//! - [`render_report`] / [`render_all`]: human-readable text
//! - [`to_json`]: structured data
//! - [`summary_table`]: one line per cached host

mod json;
mod table;
mod text;

pub use json::{print_json, to_json};
pub use table::{print_summary, summary_table};
pub use text::{render_all, render_report};

use crate::model::Report;
use anyhow::Result;

/// Output format for a single report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text report
    Text,
    /// JSON as returned by the provider
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'text' or 'json'", s)),
        }
    }
}

/// Format a report to string for printing or file output
pub fn format_report(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_report(report)),
        OutputFormat::Json => to_json(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReportStatus;
    use std::str::FromStr;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::from_str("TXT").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_format_report_json_uses_provider_field_names() {
        let report = Report::new("example.com", ReportStatus::Ready);
        let json = format_report(&report, OutputFormat::Json).unwrap();
        assert!(json.contains("\"startTime\""));
        assert!(json.contains("\"status\": \"READY\""));
    }
}
