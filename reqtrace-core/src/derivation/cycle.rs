//! Cycle detection over the derivation graph

use std::collections::BTreeMap;

use super::graph::DerivationGraph;
use crate::{
    error::{
        CoverageError,
        CoverageResult,
    },
    requirements::RequirementId,
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Fail with [`CoverageError::CycleDetected`] if any derivation cycle exists.
///
/// The reported path starts and ends with the same requirement. Traversal
/// is iterative and visits IDs in order, so the reported cycle is stable.
pub fn find_cycle(graph: &DerivationGraph) -> CoverageResult<()> {
    let mut marks: BTreeMap<&RequirementId, Mark> = BTreeMap::new();

    for start in graph.ids() {
        if marks.contains_key(start) {
            continue;
        }

        marks.insert(start, Mark::OnPath);
        let mut stack = vec![(start, children(graph, start))];

        loop {
            let Some((_, pending)) = stack.last_mut() else {
                break;
            };
            match pending.pop() {
                Some(child) => match marks.get(child) {
                    Some(Mark::OnPath) => {
                        let from = stack.iter().position(|(id, _)| *id == child).unwrap_or(0);
                        let mut path: Vec<String> =
                            stack[from..].iter().map(|(id, _)| id.to_string()).collect();
                        path.push(child.to_string());
                        return Err(CoverageError::CycleDetected { path });
                    },
                    Some(Mark::Done) => {},
                    None => {
                        marks.insert(child, Mark::OnPath);
                        stack.push((child, children(graph, child)));
                    },
                },
                None => {
                    if let Some((finished, _)) = stack.pop() {
                        marks.insert(finished, Mark::Done);
                    }
                },
            }
        }
    }

    Ok(())
}

/// Children in reverse order, so popping yields them sorted
fn children<'g>(graph: &'g DerivationGraph, id: &RequirementId) -> Vec<&'g RequirementId> {
    graph
        .node(id)
        .map(|node| node.derived.keys().rev().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::parse::DerivationType;

    fn id(s: &str) -> RequirementId {
        RequirementId::new(s)
    }

    #[test]
    fn test_acyclic_graph() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R2"), &id("R1"), DerivationType::Inferred);
        graph.add_edge(&id("R3"), &id("R1"), DerivationType::Cases);
        graph.add_edge(&id("R3"), &id("R2"), DerivationType::Partial);
        assert!(find_cycle(&graph).is_ok());
    }

    #[test]
    fn test_two_node_cycle() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R7"), &id("R8"), DerivationType::Inferred);
        graph.add_edge(&id("R8"), &id("R7"), DerivationType::Inferred);

        let err = find_cycle(&graph).unwrap_err();
        assert_eq!(err.to_string(), "derivation cycle detected: R7 --> R8 --> R7");
    }

    #[test]
    fn test_cycle_below_root() {
        let mut graph = DerivationGraph::new();
        graph.add_edge(&id("R2"), &id("R1"), DerivationType::Inferred);
        graph.add_edge(&id("R3"), &id("R2"), DerivationType::Inferred);
        graph.add_edge(&id("R4"), &id("R3"), DerivationType::Inferred);
        graph.add_edge(&id("R2"), &id("R4"), DerivationType::Inferred);

        match find_cycle(&graph).unwrap_err() {
            CoverageError::CycleDetected { path } => {
                assert_eq!(path, vec!["R2", "R3", "R4", "R2"]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
