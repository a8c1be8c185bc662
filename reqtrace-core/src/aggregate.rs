//! Coverage aggregation and inconsistency detection
//!
//! Counts are reported at two levels. The leaf level looks only at the
//! to-verify bucket and direct evidence. The derivation level rolls derived
//! requirements into their root originals; requirements that are both a
//! standalone to-verify entry and a graph node are subtracted once so
//! nothing is counted twice.

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};
use tracing::info;

use crate::{
    classify::Classification,
    derivation::{
        CoverageStatus,
        DerivationGraph,
    },
    diagnostics::{
        Findings,
        IssueKind,
    },
    evidence::DirectCoverage,
    requirements::{
        RequirementId,
        RequirementTable,
        VerificationMethod,
    },
};

/// Final status reported for one requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// Directly covered, or fully covered through derivation
    Verified,
    /// Partially covered through derivation
    Partial,
    /// Counted but not covered
    Unverified,
    /// Not part of the coverage count
    NotApplicable,
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalStatus::Verified => write!(f, "Verified"),
            FinalStatus::Partial => write!(f, "Partial"),
            FinalStatus::Unverified => write!(f, "Unverified"),
            FinalStatus::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl From<CoverageStatus> for FinalStatus {
    fn from(status: CoverageStatus) -> Self {
        match status {
            CoverageStatus::Verified => FinalStatus::Verified,
            CoverageStatus::Partial => FinalStatus::Partial,
            CoverageStatus::Unverified => FinalStatus::Unverified,
        }
    }
}

/// Coverage of one requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCoverage {
    /// Requirement ID
    pub id:        RequirementId,
    /// Final status
    pub status:    FinalStatus,
    /// Time of the evidence that decided the status
    pub timestamp: Option<String>,
    /// Log the direct evidence came from
    pub source:    Option<String>,
}

/// Counts at one level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCounts {
    /// Requirements to verify
    pub to_verify:  usize,
    /// Verified requirements
    pub verified:   usize,
    /// Partially verified requirements
    pub partial:    usize,
    /// Unverified requirements
    pub unverified: usize,
}

/// Aggregate coverage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Non-deleted requirements
    pub total:                  usize,
    /// Requirements in the not-to-verify bucket
    pub not_to_verify:          usize,
    /// Deleted requirements
    pub deleted:                usize,
    /// Leaf level: to-verify bucket against direct evidence
    pub leaf:                   CoverageCounts,
    /// Non-informative graph roots
    pub total_original:         usize,
    /// Verified graph roots
    pub verified_original:      usize,
    /// Partial graph roots
    pub partial_original:       usize,
    /// Graph nodes that are also in the to-verify bucket
    pub duplicate_requirements: usize,
    /// Verified graph nodes that are also directly verified
    pub duplicate_verified:     usize,
    /// Including derivation
    pub with_derivation:        CoverageCounts,
}

/// Result of [`aggregate`]
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Counts
    pub statistics:      Statistics,
    /// Per-requirement status, in ID order
    pub requirements:    Vec<RequirementCoverage>,
    /// Mismatches between the table and the logs
    pub inconsistencies: Findings,
}

/// Combine classification, propagated graph and evidence.
///
/// `evidence` is keyed by raw log IDs; IDs that match no table row are
/// reported as `NonExist`.
pub fn aggregate(
    table: &RequirementTable,
    classification: &Classification,
    graph: &DerivationGraph,
    evidence: &DirectCoverage,
) -> Aggregation {
    let (direct, unknown) = evidence.resolve(table);
    let mut inconsistencies = Findings::new();

    for raw in &unknown {
        inconsistencies.record(raw, IssueKind::NonExist, "covered in the logs but not in any table");
    }
    check_covered(table, classification, &direct, &mut inconsistencies);

    let directly_verified: Vec<&RequirementId> = classification
        .to_verify
        .iter()
        .filter(|id| direct.contains(id))
        .collect();

    for id in &classification.to_verify {
        let Some(record) = table.get(id) else {
            continue;
        };
        let graph_status = graph.status(id).unwrap_or_default();
        if record.verification.is_test_backed()
            && !direct.contains(id)
            && graph_status < CoverageStatus::Partial
        {
            inconsistencies.record(id, IssueKind::NotCovered, "no direct or derived coverage");
        }
    }

    let roots: Vec<_> = graph
        .roots()
        .filter(|node| !classification.is_informative(&node.id))
        .collect();
    let total_original = roots.len();
    let verified_original = roots.iter().filter(|n| n.status == CoverageStatus::Verified).count();
    let partial_original = roots.iter().filter(|n| n.status == CoverageStatus::Partial).count();
    let duplicate_requirements = graph.ids().filter(|id| classification.is_to_verify(id)).count();
    let duplicate_verified = directly_verified
        .iter()
        .filter(|id| graph.status(id) == Some(CoverageStatus::Verified))
        .count();

    let to_verify = classification.to_verify.len();
    let leaf = CoverageCounts {
        to_verify,
        verified: directly_verified.len(),
        partial: 0,
        unverified: to_verify.saturating_sub(directly_verified.len()),
    };

    let final_to_verify = (total_original + to_verify).saturating_sub(duplicate_requirements);
    let final_verified = (verified_original + directly_verified.len())
        .saturating_sub(duplicate_verified)
        .min(final_to_verify);
    let final_partial = partial_original.min(final_to_verify - final_verified);
    let with_derivation = CoverageCounts {
        to_verify:  final_to_verify,
        verified:   final_verified,
        partial:    final_partial,
        unverified: final_to_verify - final_verified - final_partial,
    };

    let statistics = Statistics {
        total: table.len() - classification.deleted.len(),
        not_to_verify: classification.not_to_verify.len(),
        deleted: classification.deleted.len(),
        leaf,
        total_original,
        verified_original,
        partial_original,
        duplicate_requirements,
        duplicate_verified,
        with_derivation,
    };
    info!(
        to_verify = final_to_verify,
        verified = final_verified,
        partial = final_partial,
        unverified = with_derivation.unverified,
        "Aggregated coverage"
    );

    Aggregation {
        statistics,
        requirements: requirement_statuses(table, classification, graph, &direct),
        inconsistencies,
    }
}

fn check_covered(
    table: &RequirementTable,
    classification: &Classification,
    direct: &DirectCoverage,
    out: &mut Findings,
) {
    for (id, evidence) in direct.iter() {
        let Some(record) = table.get(id) else {
            continue;
        };
        let seen = format!("covered in {}", evidence.source);

        if record.is_deleted() {
            out.record(id, IssueKind::CoveredDeleted, format!("{seen}, but the requirement is deleted"));
            continue;
        }
        if record.verification == VerificationMethod::NonTestable {
            out.record(id, IssueKind::CoveredNonTestable, format!("{seen}, but marked Non-testable"));
        }
        if record.verification == VerificationMethod::Unverified && classification.is_to_verify(id) {
            out.record(
                id,
                IssueKind::VerifiedButUnverifiable,
                format!("{seen}, but marked Unverified"),
            );
        }
        if classification.is_informative(id) {
            out.record(id, IssueKind::CoveredInformative, format!("{seen}, but informative"));
        }
        if classification.is_out_of_scope(id) {
            out.record(id, IssueKind::CoveredOutOfScope, format!("{seen}, but out of scope"));
        }
    }
}

fn requirement_statuses(
    table: &RequirementTable,
    classification: &Classification,
    graph: &DerivationGraph,
    direct: &DirectCoverage,
) -> Vec<RequirementCoverage> {
    let mut statuses: Vec<RequirementCoverage> = table
        .iter()
        .filter(|record| !classification.deleted.contains(&record.id))
        .map(|record| {
            let id = &record.id;
            let node = graph.node(id);
            let counted = classification.is_to_verify(id)
                || node.is_some_and(|n| n.is_root() && !classification.is_informative(id));

            if let Some(evidence) = direct.get(id) {
                return RequirementCoverage {
                    id:        id.clone(),
                    status:    if counted { FinalStatus::Verified } else { FinalStatus::NotApplicable },
                    timestamp: Some(evidence.timestamp.clone()),
                    source:    Some(evidence.source.clone()),
                };
            }

            let status = match (counted, node) {
                (false, _) => FinalStatus::NotApplicable,
                (true, Some(node)) => node.status.into(),
                (true, None) => FinalStatus::Unverified,
            };
            RequirementCoverage {
                id: id.clone(),
                status,
                timestamp: node.and_then(|n| n.timestamp.clone()),
                source: None,
            }
        })
        .collect();

    statuses.sort_by(|a, b| a.id.cmp(&b.id));
    statuses
}
