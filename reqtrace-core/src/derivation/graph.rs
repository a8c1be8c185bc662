//! Derivation graph storage
//!
//! Nodes live in one ID-keyed arena; parent and child links are ID sets
//! rather than references, so edge removal and traversal are plain map
//! operations.

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

use super::parse::DerivationType;
use crate::requirements::RequirementId;

/// Coverage status carried by a graph node
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    /// No evidence
    #[default]
    Unverified,
    /// Some but not all evidence
    Partial,
    /// Fully verified
    Verified,
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageStatus::Unverified => write!(f, "Unverified"),
            CoverageStatus::Partial => write!(f, "Partial"),
            CoverageStatus::Verified => write!(f, "Verified"),
        }
    }
}

/// One requirement taking part in at least one derivation edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedNode {
    /// Requirement ID
    pub id:        RequirementId,
    /// Requirements this one derives from
    pub originals: BTreeSet<RequirementId>,
    /// Requirements derived from this one, with the edge type
    pub derived:   BTreeMap<RequirementId, DerivationType>,
    /// Current coverage status
    pub status:    CoverageStatus,
    /// Evidence time that last changed this node
    pub timestamp: Option<String>,
}

impl DerivedNode {
    fn new(id: RequirementId) -> Self {
        Self {
            id,
            originals: BTreeSet::new(),
            derived: BTreeMap::new(),
            status: CoverageStatus::Unverified,
            timestamp: None,
        }
    }

    /// Number of remaining Cases-type children
    pub fn case_count(&self) -> usize {
        self.derived.values().filter(|kind| **kind == DerivationType::Cases).count()
    }

    /// Whether the node derives from nothing
    pub fn is_root(&self) -> bool {
        self.originals.is_empty()
    }
}

/// Derivation graph keyed by requirement ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationGraph {
    nodes: BTreeMap<RequirementId, DerivedNode>,
}

impl DerivationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `child` derived from `parent`, creating nodes as needed.
    ///
    /// Returns the previous edge type if the edge already existed; the new
    /// type replaces it.
    pub fn add_edge(
        &mut self,
        child: &RequirementId,
        parent: &RequirementId,
        kind: DerivationType,
    ) -> Option<DerivationType> {
        self.ensure_node(child).originals.insert(parent.clone());
        self.ensure_node(parent).derived.insert(child.clone(), kind)
    }

    fn ensure_node(&mut self, id: &RequirementId) -> &mut DerivedNode {
        self.nodes
            .entry(id.clone())
            .or_insert_with(|| DerivedNode::new(id.clone()))
    }

    /// Remove a requirement and every relationship it takes part in.
    ///
    /// Children left without any original are removed as well, recursively.
    /// Returns every removed ID, starting with `id`.
    pub fn remove_requirement(&mut self, id: &RequirementId) -> Vec<RequirementId> {
        let mut removed = Vec::new();
        let mut pending = vec![id.clone()];

        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.remove(&current) else {
                continue;
            };

            for parent in &node.originals {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.derived.remove(&current);
                }
            }
            for child_id in node.derived.keys() {
                if let Some(child) = self.nodes.get_mut(child_id) {
                    child.originals.remove(&current);
                    if child.originals.is_empty() {
                        pending.push(child_id.clone());
                    }
                }
            }
            removed.push(current);
        }

        removed
    }

    /// Look up a node
    pub fn node(&self, id: &RequirementId) -> Option<&DerivedNode> {
        self.nodes.get(id)
    }

    /// Look up a node for mutation
    pub fn node_mut(&mut self, id: &RequirementId) -> Option<&mut DerivedNode> {
        self.nodes.get_mut(id)
    }

    /// Whether a requirement takes part in the graph
    pub fn contains(&self, id: &RequirementId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Coverage status of a node, if present
    pub fn status(&self, id: &RequirementId) -> Option<CoverageStatus> {
        self.nodes.get(id).map(|node| node.status)
    }

    /// Iterate nodes in ID order
    pub fn nodes(&self) -> impl Iterator<Item = &DerivedNode> {
        self.nodes.values()
    }

    /// Iterate node IDs in order
    pub fn ids(&self) -> impl Iterator<Item = &RequirementId> {
        self.nodes.keys()
    }

    /// Nodes that derive from nothing
    pub fn roots(&self) -> impl Iterator<Item = &DerivedNode> {
        self.nodes.values().filter(|node| node.is_root())
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.originals.len()).sum()
    }
}
