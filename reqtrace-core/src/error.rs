//! Error types for the coverage analysis engine
//!
//! Every variant here is fatal: it aborts the whole run and no coverage
//! result is produced. Rule violations that still allow a result to be
//! computed are reported as [`crate::diagnostics::Diagnostic`] values instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library
pub type CoverageResult<T> = Result<T, CoverageError>;

/// Fatal analysis errors
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Two rows share the same requirement ID after prefix normalization
    #[error("duplicate requirement ID '{id}' (first defined in {first}, again in {second})")]
    DuplicateRequirement {
        /// Normalized requirement ID
        id:     String,
        /// Table that defined the ID first
        first:  String,
        /// Table that defined it again
        second: String,
    },

    /// A row lacks the scope or actor column required by the table format
    #[error("requirement '{requirement}' in {table} is missing the required '{column}' column")]
    MissingColumn {
        /// Offending requirement
        requirement: String,
        /// Table the row came from
        table:       String,
        /// Column name (scope or actor)
        column:      &'static str,
    },

    /// Verification method text could not be recognized
    #[error("requirement '{requirement}' has unknown verification method '{value}'")]
    UnknownVerification {
        /// Offending requirement
        requirement: String,
        /// Raw verification text
        value:       String,
    },

    /// Actor text could not be recognized
    #[error("requirement '{requirement}' has unknown actor '{value}'")]
    UnknownActor {
        /// Offending requirement
        requirement: String,
        /// Raw actor text
        value:       String,
    },

    /// Scope configuration is inconsistent
    #[error("scope configuration error: {0}")]
    ScopeConfig(String),

    /// A feature was requested that the table format cannot support
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Derivation text could not be parsed
    #[error("requirement '{requirement}' has malformed derivation term '{term}': {reason}")]
    MalformedDerivation {
        /// Requirement owning the derivation text
        requirement: String,
        /// Offending term
        term:        String,
        /// What is wrong with it
        reason:      String,
    },

    /// A requirement lists itself as its own original
    #[error("requirement '{0}' derives from itself")]
    SelfDerivation(String),

    /// The derivation graph contains a cycle
    #[error("derivation cycle detected: {}", .path.join(" --> "))]
    CycleDetected {
        /// Cycle path, first and last element are the same requirement
        path: Vec<String>,
    },

    /// An engine invariant was violated
    #[error("internal error: {0}")]
    Internal(String),

    /// Requirement table or log file could not be parsed
    #[error("invalid format in {}: {message}", .path.display())]
    Format {
        /// File being read
        path:    PathBuf,
        /// Parser message
        message: String,
    },

    /// I/O failure while reading inputs
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File or directory being read
        path:   PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl CoverageError {
    /// Build an I/O error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a format error for the given path
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path:    path.into(),
            message: message.into(),
        }
    }

    /// Build a malformed-derivation error
    pub fn malformed(
        requirement: impl Into<String>,
        term: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedDerivation {
            requirement: requirement.into(),
            term:        term.into(),
            reason:      reason.into(),
        }
    }
}
