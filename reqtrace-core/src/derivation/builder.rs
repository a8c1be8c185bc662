//! Derivation graph construction
//!
//! Walks every row carrying derivation text, validates both ends of each
//! edge and records rule violations as findings. Only malformed derivation
//! text and self-derivation abort the build.

use tracing::{
    debug,
    warn,
};

use super::{
    graph::DerivationGraph,
    parse::parse_derivation,
};
use crate::{
    classify::Classification,
    diagnostics::{
        Diagnostic,
        Findings,
        IssueKind,
    },
    error::{
        CoverageError,
        CoverageResult,
    },
    requirements::{
        RequirementRecord,
        RequirementTable,
        VerificationMethod,
    },
};

/// Outcome of [`build_graph`]
#[derive(Debug, Clone)]
pub struct GraphBuild {
    /// Pristine derivation graph
    pub graph:    DerivationGraph,
    /// Rule violations found while building
    pub findings: Findings,
}

/// Build the derivation graph for `table`.
///
/// Requirements excluded by the delta filter lose every relationship they
/// take part in as an original; nodes orphaned by that are removed and
/// demoted out of `classification.to_verify`.
pub fn build_graph(
    table: &RequirementTable,
    classification: &mut Classification,
) -> CoverageResult<GraphBuild> {
    let mut graph = DerivationGraph::new();
    let mut findings = Findings::new();

    for record in table.iter().filter(|r| r.has_derivation()) {
        if !validate_derived(record, classification, &mut findings) {
            continue;
        }

        for term in parse_derivation(&record.id, &record.derivation)? {
            let Some(original) = table.resolve(&term.original) else {
                findings.record(
                    &record.id,
                    IssueKind::DeriveFromNonExist,
                    format!("derives from '{}', which is not in any table", term.original),
                );
                continue;
            };
            if original.id == record.id {
                return Err(CoverageError::SelfDerivation(record.id.to_string()));
            }
            if !validate_original(record, original, classification, &mut findings) {
                continue;
            }

            if let Some(previous) = graph.add_edge(&record.id, &original.id, term.kind) {
                warn!(
                    derived = %record.id,
                    original = %original.id,
                    %previous,
                    kind = %term.kind,
                    "Duplicate derivation, keeping the last type"
                );
                findings.push(
                    Diagnostic::new(
                        record.id.clone(),
                        IssueKind::DuplicateDerivation,
                        format!(
                            "derives from {} more than once ({} replaced by {})",
                            original.id, previous, term.kind
                        ),
                    )
                    .with_related(original.id.clone()),
                );
            }
        }
    }

    sever_delta_excluded(&mut graph, classification);

    debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        findings = findings.errors.len() + findings.warnings.len(),
        "Built derivation graph"
    );
    Ok(GraphBuild { graph, findings })
}

/// Check the derived end of an edge; `false` means its edges are skipped
fn validate_derived(
    record: &RequirementRecord,
    classification: &Classification,
    findings: &mut Findings,
) -> bool {
    let id = &record.id;

    if record.is_deleted() {
        findings.record(id, IssueKind::DerivedIsDeleted, "deleted requirement carries a derivation");
        return false;
    }
    if classification.is_informative(id) {
        findings.record(id, IssueKind::DerivedIsInformative, "informative requirement is derived");
    }
    if classification.is_out_of_scope(id) {
        findings.record(id, IssueKind::DerivedOutOfScope, "out-of-scope requirement is derived");
    }
    match record.verification {
        VerificationMethod::NonTestable => {
            findings.record(id, IssueKind::DerivedIsNonTestable, "non-testable requirement is derived");
        },
        VerificationMethod::Unverified => {
            findings.record(id, IssueKind::DerivedIsUnverified, "derived requirement is marked Unverified");
        },
        _ => {},
    }
    true
}

/// Check the original end of an edge; `false` means the edge is dropped
fn validate_original(
    derived: &RequirementRecord,
    original: &RequirementRecord,
    classification: &Classification,
    findings: &mut Findings,
) -> bool {
    let issue = |kind: IssueKind, message: String| {
        Diagnostic::new(derived.id.clone(), kind, message).with_related(original.id.clone())
    };

    if original.is_deleted() {
        findings.push(issue(
            IssueKind::DeriveFromDeleted,
            format!("derives from deleted requirement {}", original.id),
        ));
        return false;
    }

    let unverified = original.verification == VerificationMethod::Unverified;
    if classification.is_informative(&original.id) {
        if !unverified {
            findings.push(issue(
                IssueKind::DeriveFromInformative,
                format!("derives from informative requirement {}", original.id),
            ));
        }
    } else if unverified {
        findings.push(issue(
            IssueKind::DeriveFromUnverified,
            format!("derives from {}, which is marked Unverified", original.id),
        ));
    }
    true
}

fn sever_delta_excluded(graph: &mut DerivationGraph, classification: &mut Classification) {
    let excluded: Vec<_> = classification.delta_excluded.iter().cloned().collect();
    for id in excluded {
        for removed in graph.remove_requirement(&id) {
            if classification.demote(&removed) {
                debug!(requirement = %removed, via = %id, "Orphaned by delta filter");
            }
        }
    }
}
