//! Derivation text parsing
//!
//! Derivation text is a comma-separated list of `OriginalId[:type]` terms
//! where `type` is `i` (inferred, the default), `p` (partial) or `c` (cases).

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    error::{
        CoverageError,
        CoverageResult,
    },
    requirements::RequirementId,
};

/// Semantics of a derivation edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationType {
    /// Verifying the derived requirement verifies the original
    Inferred,
    /// The derived requirement only ever partially verifies the original
    Partial,
    /// The derived requirement is one of several cases of the original
    Cases,
}

impl DerivationType {
    /// Parse a type letter, ignoring case
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter.trim() {
            "i" | "I" => Some(Self::Inferred),
            "p" | "P" => Some(Self::Partial),
            "c" | "C" => Some(Self::Cases),
            _ => None,
        }
    }

    /// Type letter used in derivation text
    pub fn letter(self) -> char {
        match self {
            Self::Inferred => 'i',
            Self::Partial => 'p',
            Self::Cases => 'c',
        }
    }
}

impl fmt::Display for DerivationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationType::Inferred => write!(f, "inferred"),
            DerivationType::Partial => write!(f, "partial"),
            DerivationType::Cases => write!(f, "cases"),
        }
    }
}

/// One parsed `OriginalId[:type]` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationTerm {
    /// Original requirement ID as written, possibly abbreviated
    pub original: String,
    /// Edge type
    pub kind:     DerivationType,
}

/// Parse the derivation text of `requirement`
///
/// Empty text yields no terms. A term with more than one `:`, an empty
/// original ID or an unknown type letter is a fatal format error.
pub fn parse_derivation(requirement: &RequirementId, text: &str) -> CoverageResult<Vec<DerivationTerm>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    text.split(',').map(|term| parse_term(requirement, term)).collect()
}

fn parse_term(requirement: &RequirementId, term: &str) -> CoverageResult<DerivationTerm> {
    let trimmed = term.trim();
    let mut parts = trimmed.split(':');
    let original = parts.next().unwrap_or_default().trim();
    let letter = parts.next();

    if parts.next().is_some() {
        return Err(CoverageError::malformed(
            requirement.as_str(),
            trimmed,
            "more than one ':' separator",
        ));
    }
    if original.is_empty() {
        return Err(CoverageError::malformed(
            requirement.as_str(),
            trimmed,
            "empty original requirement ID",
        ));
    }

    let kind = match letter {
        None => DerivationType::Inferred,
        Some(letter) => DerivationType::from_letter(letter).ok_or_else(|| {
            CoverageError::malformed(
                requirement.as_str(),
                trimmed,
                format!("unknown derivation type '{}'", letter.trim()),
            )
        })?,
    };

    Ok(DerivationTerm {
        original: original.to_string(),
        kind,
    })
}
