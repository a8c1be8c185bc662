//! Human-readable report output

use std::fmt::Write;

use colored::Colorize;
use reqtrace_core::{
    CoverageReport,
    FinalStatus,
    aggregate::CoverageCounts,
    diagnostics::{
        Diagnostic,
        DiagnosticCollection,
        Findings,
        Severity,
    },
};

/// Formats reports as colored text
///
/// Coloring follows `colored`'s global override, which `main` sets from the
/// output format and terminal detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanFormatter {
    /// List every requirement, not only the ones needing attention
    verbose: bool,
}

impl HumanFormatter {
    /// Create a formatter
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Format a full coverage report
    pub fn format_report(&self, report: &CoverageReport) -> String {
        let mut out = String::new();
        let stats = &report.statistics;

        let _ = writeln!(out, "{}", "Requirement coverage".bold());
        let _ = writeln!(
            out,
            "  {} requirements: {} to verify, {} not to verify, {} deleted",
            stats.total, stats.leaf.to_verify, stats.not_to_verify, stats.deleted
        );
        self.write_counts(&mut out, "Leaf level", &stats.leaf);
        self.write_counts(&mut out, "With derivation", &stats.with_derivation);
        let _ = writeln!(out);

        let listed: Vec<_> = report
            .requirements
            .iter()
            .filter(|r| self.verbose || matches!(r.status, FinalStatus::Partial | FinalStatus::Unverified))
            .collect();
        if !listed.is_empty() {
            let title = if self.verbose { "Requirements" } else { "Requirements needing coverage" };
            let _ = writeln!(out, "{}", title.bold());
            for requirement in listed {
                let _ = writeln!(
                    out,
                    "  {:<24} {}{}",
                    requirement.id.as_str(),
                    status_label(requirement.status),
                    requirement
                        .timestamp
                        .as_deref()
                        .map(|ts| format!("  ({ts})"))
                        .unwrap_or_default()
                );
            }
            let _ = writeln!(out);
        }

        write_findings(&mut out, "Validation", &report.validation);
        write_findings(&mut out, "Inconsistencies", &report.inconsistencies);
        write_summary(&mut out, report.diagnostics.summary.errors, report.diagnostics.summary.warnings);
        out
    }

    /// Format a diagnostic collection (used by `check`)
    ///
    /// Errors come before warnings; verbose output groups them by requirement.
    pub fn format_collection(&self, collection: &DiagnosticCollection) -> String {
        let mut out = String::new();
        if self.verbose {
            for (requirement, diagnostics) in collection.group_by_requirement() {
                let _ = writeln!(out, "{}", requirement.as_str().bold());
                for diagnostic in diagnostics {
                    let _ = writeln!(out, "  {}", diagnostic_line(diagnostic));
                }
            }
        } else {
            for severity in [Severity::Error, Severity::Warning] {
                for diagnostic in collection.by_severity(severity) {
                    let _ = writeln!(out, "{}", diagnostic_line(diagnostic));
                }
            }
        }
        if !collection.diagnostics.is_empty() {
            let _ = writeln!(out);
        }
        if self.verbose {
            let _ = writeln!(
                out,
                "{} requirements with findings",
                collection.summary.requirements_with_diagnostics
            );
        }
        write_summary(&mut out, collection.summary.errors, collection.summary.warnings);
        out
    }

    fn write_counts(&self, out: &mut String, label: &str, counts: &CoverageCounts) {
        let _ = writeln!(
            out,
            "  {:<16} {} verified, {} partial, {} unverified of {}",
            format!("{label}:"),
            counts.verified.to_string().green(),
            counts.partial.to_string().yellow(),
            counts.unverified.to_string().red(),
            counts.to_verify
        );
    }
}

fn status_label(status: FinalStatus) -> String {
    match status {
        FinalStatus::Verified => status.to_string().green().to_string(),
        FinalStatus::Partial => status.to_string().yellow().to_string(),
        FinalStatus::Unverified => status.to_string().red().to_string(),
        FinalStatus::NotApplicable => status.to_string().dimmed().to_string(),
    }
}

fn diagnostic_line(diagnostic: &Diagnostic) -> String {
    let severity = match diagnostic.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
    };
    format!(
        "{}[{}] {}: {}",
        severity, diagnostic.kind, diagnostic.requirement, diagnostic.message
    )
}

fn write_findings(out: &mut String, title: &str, findings: &Findings) {
    if findings.is_empty() {
        return;
    }
    let _ = writeln!(
        out,
        "{} ({} errors, {} warnings)",
        title.bold(),
        findings.errors.len(),
        findings.warnings.len()
    );
    for diagnostic in findings.iter() {
        let _ = writeln!(out, "  {}", diagnostic_line(diagnostic));
    }
    let _ = writeln!(out);
}

fn write_summary(out: &mut String, errors: usize, warnings: usize) {
    if errors == 0 && warnings == 0 {
        let _ = writeln!(out, "{}", "No findings".green());
    } else {
        let _ = writeln!(out, "{} errors, {} warnings", errors, warnings);
    }
}
