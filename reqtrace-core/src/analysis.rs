//! Analysis pipeline
//!
//! [`CoverageAnalyzer`] is the context object for one set of tables: it
//! classifies the rows, builds the derivation graph and rejects cycles once,
//! then answers any number of [`CoverageAnalyzer::analyze`] calls. Each call
//! propagates on its own copy of the graph, so calls are independent.

use std::path::PathBuf;

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};

use crate::{
    aggregate::{
        RequirementCoverage,
        Statistics,
        aggregate,
    },
    classify::{
        Classification,
        classify,
    },
    config::{
        AnalysisConfig,
        ScopeConfig,
    },
    derivation::{
        DerivationGraph,
        build_graph,
        find_cycle,
    },
    diagnostics::{
        DiagnosticCollection,
        Findings,
    },
    error::CoverageResult,
    evidence::{
        DirectCoverage,
        EvidenceLoader,
    },
    propagate::Propagator,
    requirements::{
        RequirementTable,
        load_tables,
    },
};

/// Outcome of one coverage analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Per-requirement status, in ID order
    pub requirements:    Vec<RequirementCoverage>,
    /// Aggregate counts
    pub statistics:      Statistics,
    /// Structural findings from classification and graph building
    pub validation:      Findings,
    /// Mismatches between the table and the logs
    pub inconsistencies: Findings,
    /// Every finding, with summary
    pub diagnostics:     DiagnosticCollection,
}

impl CoverageReport {
    /// Whether any error-severity finding was recorded
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Coverage analyzer for one merged requirement table
#[derive(Debug, Clone)]
pub struct CoverageAnalyzer {
    table:          RequirementTable,
    scope:          ScopeConfig,
    classification: Classification,
    graph:          DerivationGraph,
    validation:     Findings,
    propagator:     Propagator,
}

impl CoverageAnalyzer {
    /// Classify `table`, build its derivation graph and check it for cycles
    pub fn new(table: RequirementTable, scope: ScopeConfig) -> CoverageResult<Self> {
        let mut classification = classify(&table, &scope)?;
        let build = build_graph(&table, &mut classification)?;
        find_cycle(&build.graph)?;

        let mut validation = std::mem::take(&mut classification.findings);
        validation.extend(build.findings);
        debug!(
            errors = validation.errors.len(),
            warnings = validation.warnings.len(),
            "Validated requirement table"
        );

        let propagator = Propagator::for_table(&table);
        Ok(Self {
            table,
            scope,
            classification,
            graph: build.graph,
            validation,
            propagator,
        })
    }

    /// Load the configured tables and prepare an analyzer
    pub fn from_config(config: &AnalysisConfig) -> CoverageResult<Self> {
        let table = load_tables(&config.input.tables, &config.scope.requirement_prefix)?;
        Self::new(table, config.scope.clone())
    }

    /// Merged requirement table
    pub fn table(&self) -> &RequirementTable {
        &self.table
    }

    /// Scope settings in use
    pub fn scope(&self) -> &ScopeConfig {
        &self.scope
    }

    /// Bucket assignment
    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    /// Derivation graph before any propagation
    pub fn graph(&self) -> &DerivationGraph {
        &self.graph
    }

    /// Structural findings
    pub fn validation(&self) -> &Findings {
        &self.validation
    }

    /// Structural findings as a diagnostic collection
    pub fn check(&self) -> DiagnosticCollection {
        let mut collection = DiagnosticCollection::new("check");
        collection.add_findings(&self.validation);
        collection.finalize()
    }

    /// Compute coverage for `evidence`, keyed by the IDs found in the logs
    pub fn analyze(&self, evidence: &DirectCoverage) -> CoverageResult<CoverageReport> {
        let (direct, _) = evidence.resolve(&self.table);
        let mut graph = self.graph.clone();
        self.propagator.propagate(&mut graph, &direct)?;

        let aggregation = aggregate(&self.table, &self.classification, &graph, evidence);

        let mut diagnostics = DiagnosticCollection::new("analyze");
        diagnostics.add_findings(&self.validation);
        diagnostics.add_findings(&aggregation.inconsistencies);

        Ok(CoverageReport {
            requirements:    aggregation.requirements,
            statistics:      aggregation.statistics,
            validation:      self.validation.clone(),
            inconsistencies: aggregation.inconsistencies,
            diagnostics:     diagnostics.finalize(),
        })
    }

    /// Read test logs under `paths` and compute coverage
    pub fn analyze_logs(&self, paths: &[PathBuf]) -> CoverageResult<CoverageReport> {
        let evidence = EvidenceLoader::new()?.load_paths(paths)?;
        let report = self.analyze(&evidence)?;
        info!(
            requirements = report.requirements.len(),
            findings = report.diagnostics.summary.total,
            "Coverage analysis complete"
        );
        Ok(report)
    }
}
