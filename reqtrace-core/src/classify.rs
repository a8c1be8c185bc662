//! Requirement classification
//!
//! Every row of the merged table lands in exactly one bucket: deleted,
//! to-verify (normative, in scope, testable) or not-to-verify (informative,
//! out of scope or non-testable). Scope-based and legacy actor-based tables
//! follow different rules; the format is detected from the first row.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{
    debug,
    info,
};

use crate::{
    config::{
        ScopeConfig,
        ScopeMembership,
    },
    diagnostics::{
        Findings,
        IssueKind,
    },
    error::{
        CoverageError,
        CoverageResult,
    },
    requirements::{
        Actor,
        RequirementId,
        RequirementRecord,
        RequirementTable,
        TableFormat,
    },
};

/// Bucket assignment for every loaded requirement
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Detected table format
    pub format:         TableFormat,
    /// Normative, in-scope, testable requirements
    pub to_verify:      BTreeSet<RequirementId>,
    /// Informative, out-of-scope or non-testable requirements
    pub not_to_verify:  BTreeSet<RequirementId>,
    /// Deleted requirements, excluded from everything else
    pub deleted:        BTreeSet<RequirementId>,
    /// Non-normative requirements
    pub informative:    BTreeSet<RequirementId>,
    /// Requirements whose scope (or actor) is excluded
    pub out_of_scope:   BTreeSet<RequirementId>,
    /// Requirements dropped by the delta filter that carry no derivation;
    /// their derivation relationships are severed when the graph is built
    pub delta_excluded: BTreeSet<RequirementId>,
    /// Recorded rule violations
    pub findings:       Findings,
}

impl Classification {
    fn new(format: TableFormat) -> Self {
        Self {
            format,
            to_verify: BTreeSet::new(),
            not_to_verify: BTreeSet::new(),
            deleted: BTreeSet::new(),
            informative: BTreeSet::new(),
            out_of_scope: BTreeSet::new(),
            delta_excluded: BTreeSet::new(),
            findings: Findings::new(),
        }
    }

    /// Move a requirement from to-verify to not-to-verify
    pub fn demote(&mut self, id: &RequirementId) -> bool {
        if self.to_verify.remove(id) {
            self.not_to_verify.insert(id.clone());
            true
        } else {
            false
        }
    }

    /// Whether the requirement is in the to-verify bucket
    pub fn is_to_verify(&self, id: &RequirementId) -> bool {
        self.to_verify.contains(id)
    }

    /// Whether the requirement is informative
    pub fn is_informative(&self, id: &RequirementId) -> bool {
        self.informative.contains(id)
    }

    /// Whether the requirement is out of scope
    pub fn is_out_of_scope(&self, id: &RequirementId) -> bool {
        self.out_of_scope.contains(id)
    }
}

/// Assign every requirement of `table` to a bucket
pub fn classify(table: &RequirementTable, scope: &ScopeConfig) -> CoverageResult<Classification> {
    scope.validate()?;

    let format = match table.format() {
        Ok(format) => format,
        Err(_) if !scope.check_scope => TableFormat::ScopeBased,
        Err(e) => return Err(e),
    };

    let mut classification = Classification::new(format);
    match format {
        TableFormat::ScopeBased => {
            for record in table.iter() {
                classify_scoped(record, scope, &mut classification)?;
            }
        },
        TableFormat::Legacy => {
            if scope.delta_filter_active() {
                return Err(CoverageError::UnsupportedFeature(
                    "delta filtering requires a table with a scope column".to_string(),
                ));
            }
            for record in table.iter() {
                classify_legacy(record, &mut classification)?;
            }
        },
    }

    info!(
        to_verify = classification.to_verify.len(),
        not_to_verify = classification.not_to_verify.len(),
        deleted = classification.deleted.len(),
        "Classified requirements"
    );
    Ok(classification)
}

fn classify_scoped(
    record: &RequirementRecord,
    scope: &ScopeConfig,
    out: &mut Classification,
) -> CoverageResult<()> {
    let id = &record.id;

    if record.is_deleted() {
        out.deleted.insert(id.clone());
        return Ok(());
    }
    if !record.normative {
        out.informative.insert(id.clone());
    }

    let membership = if scope.check_scope {
        let value = record.scope.as_deref().ok_or_else(|| CoverageError::MissingColumn {
            requirement: id.to_string(),
            table:       record.source.clone(),
            column:      "scope",
        })?;
        scope.membership(value).ok_or_else(|| {
            CoverageError::ScopeConfig(format!(
                "scope value '{value}' of requirement '{id}' is neither in-scope nor out-of-scope"
            ))
        })?
    } else {
        ScopeMembership::InScope
    };

    if membership == ScopeMembership::OutOfScope {
        out.out_of_scope.insert(id.clone());
        out.not_to_verify.insert(id.clone());
        if record.verification.is_test_backed() {
            out.findings.record(
                id,
                IssueKind::OutOfScopeButTestable,
                format!("out-of-scope requirement is marked '{}'", record.verification),
            );
        }
        return Ok(());
    }

    if !record.normative || !record.verification.is_testable() {
        out.not_to_verify.insert(id.clone());
        return Ok(());
    }

    if !scope.delta_included(&record.delta) && !record.has_derivation() {
        debug!(requirement = %id, delta = %record.delta, "Excluded by delta filter");
        out.not_to_verify.insert(id.clone());
        out.delta_excluded.insert(id.clone());
        return Ok(());
    }

    out.to_verify.insert(id.clone());
    Ok(())
}

fn classify_legacy(record: &RequirementRecord, out: &mut Classification) -> CoverageResult<()> {
    let id = &record.id;
    if record.is_deleted() {
        out.deleted.insert(id.clone());
        return Ok(());
    }

    let actor = record.actor.ok_or_else(|| CoverageError::MissingColumn {
        requirement: id.to_string(),
        table:       record.source.clone(),
        column:      "actor",
    })?;
    if !record.normative {
        out.informative.insert(id.clone());
    }
    if actor == Actor::Client {
        out.out_of_scope.insert(id.clone());
    }

    if record.normative && actor != Actor::Client && record.verification.is_testable() {
        out.to_verify.insert(id.clone());
    } else {
        out.not_to_verify.insert(id.clone());
    }
    Ok(())
}
