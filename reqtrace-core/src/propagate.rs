//! Coverage propagation
//!
//! Directly covered graph nodes are marked Verified, then status flows
//! upward from child to original according to the edge type. Upward flow
//! uses an explicit worklist; a parent is revisited only when its status or
//! timestamp actually changed, which bounds the work and makes a second run
//! over the same evidence a no-op.

use std::collections::BTreeSet;

use tracing::{
    debug,
    trace,
};

use crate::{
    derivation::{
        CoverageStatus,
        DerivationGraph,
        DerivationType,
    },
    error::{
        CoverageError,
        CoverageResult,
    },
    evidence::DirectCoverage,
    requirements::{
        RequirementId,
        RequirementTable,
        VerificationMethod,
    },
};

/// Propagates direct coverage through a derivation graph
#[derive(Debug, Clone, Default)]
pub struct Propagator {
    /// Originals whose status is never transitioned by derived coverage
    ineligible: BTreeSet<RequirementId>,
}

impl Propagator {
    /// Propagator treating every original as eligible
    pub fn new() -> Self {
        Self::default()
    }

    /// Propagator that never transitions requirements the table marks
    /// Unverified
    pub fn for_table(table: &RequirementTable) -> Self {
        Self {
            ineligible: table
                .iter()
                .filter(|r| r.verification == VerificationMethod::Unverified)
                .map(|r| r.id.clone())
                .collect(),
        }
    }

    /// Apply `evidence` to `graph`.
    ///
    /// Statuses only ever increase. Cases edges resolved by a Verified child
    /// are removed from `graph`, so callers that need the pristine graph
    /// propagate on a clone.
    pub fn propagate(&self, graph: &mut DerivationGraph, evidence: &DirectCoverage) -> CoverageResult<()> {
        let mut seeds = Vec::new();
        for (id, entry) in evidence.iter() {
            if let Some(node) = graph.node_mut(id) {
                node.status = CoverageStatus::Verified;
                node.timestamp = Some(entry.timestamp.clone());
                seeds.push(id.clone());
            }
        }
        debug!(seeds = seeds.len(), "Propagating direct coverage");

        for seed in seeds {
            self.propagate_from(graph, seed)?;
        }
        Ok(())
    }

    fn propagate_from(&self, graph: &mut DerivationGraph, seed: RequirementId) -> CoverageResult<()> {
        let mut worklist = vec![seed];

        while let Some(child_id) = worklist.pop() {
            let Some(child) = graph.node(&child_id) else {
                continue;
            };
            let child_status = child.status;
            let child_timestamp = child.timestamp.clone();
            let originals: Vec<RequirementId> = child.originals.iter().cloned().collect();

            for parent_id in originals {
                if self.ineligible.contains(&parent_id) {
                    trace!(original = %parent_id, "Original marked Unverified, not transitioned");
                    continue;
                }
                let Some(parent) = graph.node_mut(&parent_id) else {
                    continue;
                };
                let Some(&kind) = parent.derived.get(&child_id) else {
                    continue;
                };
                if parent.status == CoverageStatus::Verified {
                    continue;
                }

                let computed = match kind {
                    DerivationType::Inferred => match child_status {
                        CoverageStatus::Verified => CoverageStatus::Verified,
                        CoverageStatus::Partial => CoverageStatus::Partial,
                        CoverageStatus::Unverified => {
                            return Err(unverified_child(&child_id, &parent_id));
                        },
                    },
                    DerivationType::Partial => {
                        if child_status == CoverageStatus::Unverified {
                            return Err(unverified_child(&child_id, &parent_id));
                        }
                        CoverageStatus::Partial
                    },
                    DerivationType::Cases => {
                        let remaining = parent.case_count();
                        let status = if remaining == 1 && child_status == CoverageStatus::Verified {
                            CoverageStatus::Verified
                        } else {
                            CoverageStatus::Partial
                        };
                        if child_status == CoverageStatus::Verified {
                            parent.derived.remove(&child_id);
                        }
                        status
                    },
                };

                let status = parent.status.max(computed);
                let changed = status != parent.status || parent.timestamp != child_timestamp;
                trace!(
                    original = %parent_id,
                    derived = %child_id,
                    %kind,
                    from = %parent.status,
                    to = %status,
                    "Propagated"
                );
                parent.status = status;
                parent.timestamp = child_timestamp.clone();

                if changed && !parent.is_root() {
                    worklist.push(parent_id);
                }
            }
        }

        Ok(())
    }
}

fn unverified_child(child: &RequirementId, parent: &RequirementId) -> CoverageError {
    CoverageError::Internal(format!(
        "unverified requirement {child} would drive coverage of {parent}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::CoverageEvidence;

    fn id(s: &str) -> RequirementId {
        RequirementId::new(s)
    }

    fn evidence(ids: &[&str]) -> DirectCoverage {
        let mut coverage = DirectCoverage::new();
        for (i, req) in ids.iter().enumerate() {
            coverage.insert(
                id(req),
                CoverageEvidence::new("test.log", format!("2024-01-01T00:00:0{i}Z")),
            );
        }
        coverage
    }

    #[test]
    fn test_inferred_edge() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R2"), &id("R1"), DerivationType::Inferred);

        Propagator::new().propagate(&mut graph, &evidence(&["R2"])).unwrap();

        assert_eq!(graph.status(&id("R1")), Some(CoverageStatus::Verified));
        assert_eq!(graph.status(&id("R2")), Some(CoverageStatus::Verified));
        assert_eq!(
            graph.node(&id("R1")).unwrap().timestamp.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_partial_edge() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R2"), &id("R1"), DerivationType::Partial);

        Propagator::new().propagate(&mut graph, &evidence(&["R2"])).unwrap();

        assert_eq!(graph.status(&id("R1")), Some(CoverageStatus::Partial));
    }

    #[test]
    fn test_cases_edges() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R3"), &id("R1"), DerivationType::Cases);
        graph.add_edge(&id("R4"), &id("R1"), DerivationType::Cases);

        let mut once = graph.clone();
        Propagator::new().propagate(&mut once, &evidence(&["R3"])).unwrap();
        assert_eq!(once.status(&id("R1")), Some(CoverageStatus::Partial));
        assert_eq!(once.node(&id("R1")).unwrap().case_count(), 1);

        let mut both = graph.clone();
        Propagator::new().propagate(&mut both, &evidence(&["R3", "R4"])).unwrap();
        assert_eq!(both.status(&id("R1")), Some(CoverageStatus::Verified));
        assert_eq!(both.node(&id("R1")).unwrap().case_count(), 0);
    }

    #[test]
    fn test_multi_level_chain() {
        // R1 <-i- R2 <-p- R3 <-i- R4
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R2"), &id("R1"), DerivationType::Inferred);
        graph.add_edge(&id("R3"), &id("R2"), DerivationType::Partial);
        graph.add_edge(&id("R4"), &id("R3"), DerivationType::Inferred);

        Propagator::new().propagate(&mut graph, &evidence(&["R4"])).unwrap();

        assert_eq!(graph.status(&id("R3")), Some(CoverageStatus::Verified));
        assert_eq!(graph.status(&id("R2")), Some(CoverageStatus::Partial));
        assert_eq!(graph.status(&id("R1")), Some(CoverageStatus::Partial));
    }

    #[test]
    fn test_never_downgrades() {
        // R1 has one Partial path and one Inferred path
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R2"), &id("R1"), DerivationType::Inferred);
        graph.add_edge(&id("R3"), &id("R1"), DerivationType::Partial);

        Propagator::new().propagate(&mut graph, &evidence(&["R2", "R3"])).unwrap();

        assert_eq!(graph.status(&id("R1")), Some(CoverageStatus::Verified));
    }

    #[test]
    fn test_ineligible_original_stays_unverified() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R2"), &id("R1"), DerivationType::Inferred);
        graph.add_edge(&id("R1"), &id("R0"), DerivationType::Inferred);
        let propagator = Propagator {
            ineligible: [id("R1")].into_iter().collect(),
        };

        propagator.propagate(&mut graph, &evidence(&["R2"])).unwrap();

        assert_eq!(graph.status(&id("R1")), Some(CoverageStatus::Unverified));
        assert_eq!(graph.status(&id("R0")), Some(CoverageStatus::Unverified));
    }

    #[test]
    fn test_idempotent() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R3"), &id("R1"), DerivationType::Cases);
        graph.add_edge(&id("R4"), &id("R1"), DerivationType::Cases);
        graph.add_edge(&id("R1"), &id("R0"), DerivationType::Inferred);
        let coverage = evidence(&["R3"]);

        Propagator::new().propagate(&mut graph, &coverage).unwrap();
        let first = graph.clone();
        Propagator::new().propagate(&mut graph, &coverage).unwrap();

        assert_eq!(graph, first);
        assert_eq!(graph.status(&id("R0")), Some(CoverageStatus::Partial));
    }
}
