//! reqtrace core - requirement coverage for protocol conformance test suites
//!
//! Given specification tables listing requirements (optionally derived from
//! one another) and test logs recording which requirement checkpoints
//! passing test cases hit, this library decides for every requirement
//! whether it is Verified, Partial or Unverified, and reports structural
//! problems in the tables and mismatches between tables and logs.
//!
//! # Architecture
//!
//! One analysis runs these stages strictly in order:
//!
//! - **Classification** ([`classify`]): every row becomes deleted, to-verify
//!   or not-to-verify
//! - **Graph building** ([`derivation::build_graph`]): derivation text
//!   becomes typed edges, each checked against the legality rules
//! - **Cycle detection** ([`derivation::find_cycle`]): a cyclic derivation
//!   aborts the run
//! - **Propagation** ([`propagate`]): direct evidence flows from derived
//!   requirements to their originals
//! - **Aggregation** ([`aggregate`]): counts without double counting, and
//!   inconsistencies between the tables and the logs
//!
//! [`CoverageAnalyzer`] wires the stages together. Fatal input problems are
//! [`CoverageError`] values; everything else is recorded as a
//! [`diagnostics::Diagnostic`] next to the result.

#![forbid(unsafe_code)]

use std::path::{
    Path,
    PathBuf,
};

pub mod aggregate;
pub mod analysis;
pub mod classify;
pub mod config;
pub mod derivation;
pub mod diagnostics;
pub mod error;
pub mod evidence;
pub mod propagate;
pub mod requirements;

// Public API
pub use aggregate::{
    FinalStatus,
    RequirementCoverage,
    Statistics,
};
pub use analysis::{
    CoverageAnalyzer,
    CoverageReport,
};
pub use config::{
    AnalysisConfig,
    ScopeConfig,
};
pub use error::{
    CoverageError,
    CoverageResult,
};
pub use evidence::{
    CoverageEvidence,
    DirectCoverage,
    EvidenceLoader,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration file name looked up by [`find_config`]
pub const CONFIG_FILE: &str = "reqtrace.toml";

/// Search `start` and its ancestors for a configuration file
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start.ancestors().map(|dir| dir.join(CONFIG_FILE)).find(|candidate| candidate.is_file())
}
