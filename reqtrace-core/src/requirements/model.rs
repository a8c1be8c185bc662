//! Requirement model shared by every analysis stage
//!
//! A [`RequirementTable`] is the merged, de-duplicated view of all loaded
//! specification tables. Rows keep the order in which they were loaded, which
//! makes table-format detection and every later stage deterministic.

use std::{
    collections::BTreeMap,
    fmt,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    CoverageError,
    CoverageResult,
};

/// Unique identifier for a requirement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementId(String);

impl RequirementId {
    /// Create a new requirement identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an identifier, prepending `prefix` when the raw text lacks it.
    pub fn normalized(raw: &str, prefix: &str) -> Self {
        let raw = raw.trim();
        if prefix.is_empty() || raw.starts_with(prefix) {
            Self(raw.to_string())
        } else {
            Self(format!("{prefix}{raw}"))
        }
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequirementId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Verification method declared in the specification table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Cannot be verified by a test suite
    NonTestable,
    /// Verified through a protocol adapter
    Adapter,
    /// Verified by a test case
    TestCase,
    /// Testable in principle but not covered by the suite
    Unverified,
    /// Removed from the specification
    Deleted,
}

impl VerificationMethod {
    /// Parse the table's free-form verification text.
    ///
    /// Case, spaces, hyphens and underscores are ignored, so `Test Case`,
    /// `test-case` and `TESTCASE` are all accepted.
    pub fn parse(text: &str) -> Option<Self> {
        let key: String = text
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "nontestable" => Some(Self::NonTestable),
            "adapter" => Some(Self::Adapter),
            "testcase" => Some(Self::TestCase),
            "unverified" => Some(Self::Unverified),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether a requirement with this method belongs in the to-verify set
    pub fn is_testable(self) -> bool {
        matches!(self, Self::Adapter | Self::TestCase | Self::Unverified)
    }

    /// Whether the table claims the suite actually tests the requirement
    pub fn is_test_backed(self) -> bool {
        matches!(self, Self::Adapter | Self::TestCase)
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMethod::NonTestable => write!(f, "Non-testable"),
            VerificationMethod::Adapter => write!(f, "Adapter"),
            VerificationMethod::TestCase => write!(f, "Test Case"),
            VerificationMethod::Unverified => write!(f, "Unverified"),
            VerificationMethod::Deleted => write!(f, "Deleted"),
        }
    }
}

/// Protocol role a legacy table assigns to a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Client-side behavior
    Client,
    /// Server-side behavior
    Server,
    /// Both roles
    Both,
}

impl Actor {
    /// Parse actor text, ignoring case and surrounding whitespace
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "client" => Some(Self::Client),
            "server" => Some(Self::Server),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Client => write!(f, "Client"),
            Actor::Server => write!(f, "Server"),
            Actor::Both => write!(f, "Both"),
        }
    }
}

/// Layout of the loaded specification tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    /// Tables carrying a scope column
    ScopeBased,
    /// Older tables carrying an actor column instead
    Legacy,
}

/// Delta value assumed when a row does not carry one
pub const DEFAULT_DELTA: &str = "new";

/// One row of a specification table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRecord {
    /// Normalized requirement ID
    pub id:           RequirementId,
    /// Declared verification method
    pub verification: VerificationMethod,
    /// Normative (true) or informative (false)
    pub normative:    bool,
    /// Scope value, absent in legacy tables
    pub scope:        Option<String>,
    /// Actor value, present in legacy tables
    pub actor:        Option<Actor>,
    /// Delta value (new, changed, unchanged, ...)
    pub delta:        String,
    /// Raw derivation text, empty when the requirement is not derived
    pub derivation:   String,
    /// Requirement text
    pub description:  String,
    /// Specification section the requirement comes from
    pub doc_sect:     String,
    /// Table file the row was loaded from
    pub source:       String,
}

impl RequirementRecord {
    /// Create a normative, scope-less record; mostly useful for tests and
    /// programmatic table construction.
    pub fn new(id: impl Into<String>, verification: VerificationMethod) -> Self {
        Self {
            id: RequirementId::new(id),
            verification,
            normative: true,
            scope: None,
            actor: None,
            delta: DEFAULT_DELTA.to_string(),
            derivation: String::new(),
            description: String::new(),
            doc_sect: String::new(),
            source: String::new(),
        }
    }

    /// Set the scope value
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the actor value
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Mark the requirement informative
    pub fn informative(mut self) -> Self {
        self.normative = false;
        self
    }

    /// Set the delta value
    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = delta.into();
        self
    }

    /// Set the raw derivation text
    pub fn derived_from(mut self, derivation: impl Into<String>) -> Self {
        self.derivation = derivation.into();
        self
    }

    /// Whether the row carries derivation text
    pub fn has_derivation(&self) -> bool {
        !self.derivation.trim().is_empty()
    }

    /// Whether the row was removed from the specification
    pub fn is_deleted(&self) -> bool {
        self.verification == VerificationMethod::Deleted
    }
}

/// Merged view over every loaded specification table
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequirementTable {
    /// Rows in load order
    records: Vec<RequirementRecord>,
    /// ID -> position in `records`
    #[serde(skip)]
    index:   BTreeMap<RequirementId, usize>,
    /// Prefix used to rebuild abbreviated IDs
    prefix:  String,
}

impl RequirementTable {
    /// Create an empty table using `prefix` to resolve abbreviated IDs
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            index:   BTreeMap::new(),
            prefix:  prefix.into(),
        }
    }

    /// Build a table from records, rejecting duplicate IDs
    pub fn from_records(
        prefix: impl Into<String>,
        records: impl IntoIterator<Item = RequirementRecord>,
    ) -> CoverageResult<Self> {
        let mut table = Self::new(prefix);
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    /// Add a row; a duplicate ID is fatal
    pub fn insert(&mut self, record: RequirementRecord) -> CoverageResult<()> {
        if let Some(&existing) = self.index.get(&record.id) {
            return Err(CoverageError::DuplicateRequirement {
                id:     record.id.to_string(),
                first:  self.records[existing].source.clone(),
                second: record.source,
            });
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Look up a row by its exact ID
    pub fn get(&self, id: &RequirementId) -> Option<&RequirementRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Resolve raw ID text, falling back to the prefixed form
    pub fn resolve(&self, raw: &str) -> Option<&RequirementRecord> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        self.get(&RequirementId::new(raw))
            .or_else(|| self.get(&RequirementId::normalized(raw, &self.prefix)))
    }

    /// Rows in load order
    pub fn records(&self) -> &[RequirementRecord] {
        &self.records
    }

    /// Iterate rows in load order
    pub fn iter(&self) -> impl Iterator<Item = &RequirementRecord> {
        self.records.iter()
    }

    /// Prefix used to resolve abbreviated IDs
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no rows were loaded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Detect the table format from the first row
    pub fn format(&self) -> CoverageResult<TableFormat> {
        let Some(first) = self.records.first() else {
            return Ok(TableFormat::ScopeBased);
        };
        if first.scope.is_some() {
            Ok(TableFormat::ScopeBased)
        } else if first.actor.is_some() {
            Ok(TableFormat::Legacy)
        } else {
            Err(CoverageError::MissingColumn {
                requirement: first.id.to_string(),
                table:       first.source.clone(),
                column:      "scope",
            })
        }
    }
}
