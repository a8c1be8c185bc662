//! Output formatters for reqtrace
//!
//! Human output is colored text for terminals; JSON output is the serialized
//! report or diagnostic collection, for tooling.

pub mod human;

use anyhow::{
    Context,
    Result,
};
use reqtrace_core::{
    CoverageReport,
    diagnostics::DiagnosticCollection,
};

pub use human::HumanFormatter;

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored text
    Human,
    /// Pretty-printed JSON
    Json,
}

impl OutputFormat {
    /// Render a coverage report
    pub fn render_report(self, report: &CoverageReport, verbose: bool) -> Result<String> {
        match self {
            OutputFormat::Human => Ok(HumanFormatter::new(verbose).format_report(report)),
            OutputFormat::Json => {
                serde_json::to_string_pretty(report).context("Failed to serialize coverage report")
            },
        }
    }

    /// Render a diagnostic collection
    pub fn render_collection(self, collection: &DiagnosticCollection, verbose: bool) -> Result<String> {
        match self {
            OutputFormat::Human => Ok(HumanFormatter::new(verbose).format_collection(collection)),
            OutputFormat::Json => serde_json::to_string_pretty(collection)
                .context("Failed to serialize diagnostics"),
        }
    }
}
