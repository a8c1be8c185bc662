//! Requirement derivation graph
//!
//! A derived requirement substantiates one or more original requirements.
//! This module parses derivation text, builds and validates the graph and
//! rejects cyclic derivations before any coverage is propagated.

pub mod builder;
pub mod cycle;
pub mod graph;
pub mod parse;

pub use builder::{
    GraphBuild,
    build_graph,
};
pub use cycle::find_cycle;
pub use graph::{
    CoverageStatus,
    DerivationGraph,
    DerivedNode,
};
pub use parse::{
    DerivationTerm,
    DerivationType,
    parse_derivation,
};
