//! Recorded (non-fatal) findings
//!
//! Structural rule violations found while classifying and building the
//! derivation graph, and mismatches between the table and the test logs found
//! while aggregating, are collected as [`Diagnostic`] values. They are
//! reported alongside the coverage result and never abort a run.

use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    fmt,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::requirements::RequirementId;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Rule violation or contradiction between table and logs
    Error,
    /// Suspicious but acceptable input
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Every condition the engine records instead of failing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    /// Out-of-scope requirement marked Adapter or Test Case
    OutOfScopeButTestable,
    /// Derivation names a requirement that does not exist
    DeriveFromNonExist,
    /// Derivation names a deleted requirement
    DeriveFromDeleted,
    /// Derivation names an informative requirement
    DeriveFromInformative,
    /// Derivation names a normative requirement marked Unverified
    DeriveFromUnverified,
    /// Derived requirement is informative
    DerivedIsInformative,
    /// Derived requirement is out of scope
    DerivedOutOfScope,
    /// Derived requirement is deleted
    DerivedIsDeleted,
    /// Derived requirement is non-testable
    DerivedIsNonTestable,
    /// Derived requirement is marked Unverified
    DerivedIsUnverified,
    /// The same derivation edge is declared more than once
    DuplicateDerivation,
    /// Logs cover a requirement the table marks Unverified
    VerifiedButUnverifiable,
    /// Logs cover a requirement that is not in any table
    NonExist,
    /// Logs cover a deleted requirement
    CoveredDeleted,
    /// Logs cover a non-testable requirement
    CoveredNonTestable,
    /// Logs cover an informative requirement
    CoveredInformative,
    /// Logs cover an out-of-scope requirement
    CoveredOutOfScope,
    /// Testable requirement with no coverage at all
    NotCovered,
}

impl IssueKind {
    /// Stable code string
    pub fn code(self) -> &'static str {
        match self {
            IssueKind::OutOfScopeButTestable => "OutOfScopeButTestable",
            IssueKind::DeriveFromNonExist => "DeriveFromNonExist",
            IssueKind::DeriveFromDeleted => "DeriveFromDeleted",
            IssueKind::DeriveFromInformative => "DeriveFromInformative",
            IssueKind::DeriveFromUnverified => "DeriveFromUnverified",
            IssueKind::DerivedIsInformative => "DerivedIsInformative",
            IssueKind::DerivedOutOfScope => "DerivedOutOfScope",
            IssueKind::DerivedIsDeleted => "DerivedIsDeleted",
            IssueKind::DerivedIsNonTestable => "DerivedIsNonTestable",
            IssueKind::DerivedIsUnverified => "DerivedIsUnverified",
            IssueKind::DuplicateDerivation => "DuplicateDerivation",
            IssueKind::VerifiedButUnverifiable => "VerifiedButUnverifiable",
            IssueKind::NonExist => "NonExist",
            IssueKind::CoveredDeleted => "CoveredDeleted",
            IssueKind::CoveredNonTestable => "CoveredNonTestable",
            IssueKind::CoveredInformative => "CoveredInformative",
            IssueKind::CoveredOutOfScope => "CoveredOutOfScope",
            IssueKind::NotCovered => "NotCovered",
        }
    }

    /// Severity the kind is always reported with
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::DeriveFromUnverified
            | IssueKind::DuplicateDerivation
            | IssueKind::CoveredInformative
            | IssueKind::CoveredOutOfScope
            | IssueKind::NotCovered => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Analysis stage that raises the kind
    pub fn source(self) -> &'static str {
        match self {
            IssueKind::OutOfScopeButTestable => "classifier",
            IssueKind::DeriveFromNonExist
            | IssueKind::DeriveFromDeleted
            | IssueKind::DeriveFromInformative
            | IssueKind::DeriveFromUnverified
            | IssueKind::DerivedIsInformative
            | IssueKind::DerivedOutOfScope
            | IssueKind::DerivedIsDeleted
            | IssueKind::DerivedIsNonTestable
            | IssueKind::DerivedIsUnverified
            | IssueKind::DuplicateDerivation => "derivation",
            _ => "coverage",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Individual diagnostic item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Requirement the finding is about
    pub requirement: RequirementId,
    /// Severity level
    pub severity:    Severity,
    /// Classification
    pub kind:        IssueKind,
    /// Human-readable message
    pub message:     String,
    /// Stage that generated this diagnostic
    pub source:      String,
    /// Other requirements involved (e.g. the original of an edge)
    pub related:     Vec<RequirementId>,
}

impl Diagnostic {
    /// Create a new diagnostic; severity and source follow from `kind`
    pub fn new(requirement: RequirementId, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            requirement,
            severity: kind.severity(),
            kind,
            message: message.into(),
            source: kind.source().to_string(),
            related: Vec::new(),
        }
    }

    /// Add a related requirement
    pub fn with_related(mut self, related: RequirementId) -> Self {
        self.related.push(related);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity, self.kind, self.requirement, self.message
        )
    }
}

/// Errors and warnings produced by one stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Findings {
    /// Error-severity diagnostics, in discovery order
    pub errors:   Vec<Diagnostic>,
    /// Warning-severity diagnostics, in discovery order
    pub warnings: Vec<Diagnostic>,
}

impl Findings {
    /// Create an empty set of findings
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic in the list matching its severity
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    /// Record a diagnostic built from its parts
    pub fn record(&mut self, requirement: &RequirementId, kind: IssueKind, message: impl Into<String>) {
        self.push(Diagnostic::new(requirement.clone(), kind, message));
    }

    /// Append another stage's findings
    pub fn extend(&mut self, other: Findings) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Whether a diagnostic of `kind` was recorded for `requirement`
    pub fn contains(&self, requirement: &str, kind: IssueKind) -> bool {
        self.iter().any(|d| d.kind == kind && d.requirement.as_str() == requirement)
    }

    /// Iterate errors, then warnings
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Summary statistics for a diagnostic collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    /// Total number of diagnostics
    pub total:                         usize,
    /// Number of errors
    pub errors:                        usize,
    /// Number of warnings
    pub warnings:                      usize,
    /// Number of distinct requirements with diagnostics
    pub requirements_with_diagnostics: usize,
}

impl DiagnosticSummary {
    /// Create summary from diagnostic collection
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        let mut errors = 0;
        let mut warnings = 0;
        let mut requirements = BTreeSet::new();

        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
            }
            requirements.insert(&diagnostic.requirement);
        }

        Self {
            total: diagnostics.len(),
            errors,
            warnings,
            requirements_with_diagnostics: requirements.len(),
        }
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Collection of diagnostics with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticCollection {
    /// Version of diagnostic format
    pub version:     String,
    /// Timestamp when diagnostics were generated
    pub timestamp:   String,
    /// Command that generated these diagnostics
    pub command:     String,
    /// Individual diagnostics
    pub diagnostics: Vec<Diagnostic>,
    /// Summary statistics
    pub summary:     DiagnosticSummary,
}

impl DiagnosticCollection {
    /// Create a new diagnostic collection
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            version:     "1.0".to_string(),
            timestamp:   chrono::Utc::now().to_rfc3339(),
            command:     command.into(),
            diagnostics: Vec::new(),
            summary:     DiagnosticSummary::from_diagnostics(&[]),
        }
    }

    /// Add every diagnostic of a stage
    pub fn add_findings(&mut self, findings: &Findings) {
        self.diagnostics.extend(findings.iter().cloned());
    }

    /// Finalize the collection, computing the summary
    pub fn finalize(mut self) -> Self {
        self.summary = DiagnosticSummary::from_diagnostics(&self.diagnostics);
        self
    }

    /// Get diagnostics by severity
    pub fn by_severity(&self, severity: Severity) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == severity).collect()
    }

    /// Group diagnostics by requirement
    pub fn group_by_requirement(&self) -> BTreeMap<&RequirementId, Vec<&Diagnostic>> {
        let mut groups = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            groups.entry(&diagnostic.requirement).or_insert_with(Vec::new).push(diagnostic);
        }
        groups
    }

    /// Check if collection has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.has_errors()
    }
}
