//! Specification table files
//!
//! Tables are TOML (`[metadata]` plus `[[requirement]]` rows) or JSON with the
//! same structure. Several tables may be loaded at once; they are read in
//! sorted path order and merged into one [`RequirementTable`].

use std::path::{
    Path,
    PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};
use walkdir::WalkDir;

use super::model::{
    Actor,
    DEFAULT_DELTA,
    RequirementId,
    RequirementRecord,
    RequirementTable,
    VerificationMethod,
};
use crate::error::{
    CoverageError,
    CoverageResult,
};

/// Requirements file structure
#[derive(Debug, Deserialize, Serialize)]
pub struct RequirementsFile {
    /// Table metadata
    #[serde(default)]
    pub metadata:    TableMetadata,
    /// Requirement rows
    #[serde(default)]
    pub requirement: Vec<RequirementRow>,
}

/// Table metadata
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TableMetadata {
    /// Protocol the table specifies
    #[serde(default)]
    pub protocol: String,
    /// Document version
    #[serde(default)]
    pub version:  String,
}

/// Raw requirement row as written in a table file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequirementRow {
    /// Requirement ID, possibly without the configured prefix
    pub id:           String,
    /// Requirement text
    #[serde(default)]
    pub description:  String,
    /// Specification section
    #[serde(default)]
    pub doc_sect:     String,
    /// Normative (true) or informative (false)
    pub normative:    bool,
    /// Verification method text
    pub verification: String,
    /// Scope column
    #[serde(default)]
    pub scope:        Option<String>,
    /// Actor column (legacy tables)
    #[serde(default)]
    pub actor:        Option<String>,
    /// Delta column
    #[serde(default)]
    pub delta:        Option<String>,
    /// Derivation text
    #[serde(default)]
    pub derived:      String,
}

impl RequirementRow {
    /// Convert into a validated record
    pub fn into_record(self, prefix: &str, source: &str) -> CoverageResult<RequirementRecord> {
        let id = RequirementId::normalized(&self.id, prefix);
        let verification = VerificationMethod::parse(&self.verification).ok_or_else(|| {
            CoverageError::UnknownVerification {
                requirement: id.to_string(),
                value:       self.verification.clone(),
            }
        })?;
        let actor = match self.actor.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(Actor::parse(text).ok_or_else(|| CoverageError::UnknownActor {
                requirement: id.to_string(),
                value:       text.to_string(),
            })?),
        };
        let delta = self
            .delta
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DELTA.to_string());

        Ok(RequirementRecord {
            id,
            verification,
            normative: self.normative,
            scope: self.scope.map(|s| s.trim().to_string()),
            actor,
            delta,
            derivation: self.derived.trim().to_string(),
            description: self.description,
            doc_sect: self.doc_sect,
            source: source.to_string(),
        })
    }
}

impl RequirementsFile {
    /// Load a table from a TOML or JSON file, chosen by extension
    pub fn load(path: &Path) -> CoverageResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;

        if has_extension(path, "json") {
            serde_json::from_str(&content).map_err(|e| CoverageError::format(path, e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| CoverageError::format(path, e.to_string()))
        }
    }

    /// Initialize a sample requirements table
    pub fn init_sample(path: &Path) -> CoverageResult<()> {
        std::fs::write(path, SAMPLE_TABLE).map_err(|e| CoverageError::io(path, e))?;
        info!("Created sample requirement table at {}", path.display());
        Ok(())
    }
}

/// Sample table written by `reqtrace init`
pub const SAMPLE_TABLE: &str = r#"[metadata]
protocol = "MS-XYZ"
version = "1.0"

[[requirement]]
id = "MS-XYZ_R1"
description = "The server MUST reply to every Ping request with a Pong response."
doc_sect = "3.1.5.1"
normative = true
verification = "Test Case"
scope = "Server"

[[requirement]]
id = "MS-XYZ_R2"
description = "The Pong response MUST echo the Ping sequence number."
doc_sect = "3.1.5.1"
normative = true
verification = "Test Case"
scope = "Server"
derived = "R1:i"

[[requirement]]
id = "MS-XYZ_R3"
description = "The server MUST support Ping over TCP."
doc_sect = "3.1.5.2"
normative = true
verification = "Adapter"
scope = "Server"
derived = "R4:c"

[[requirement]]
id = "MS-XYZ_R4"
description = "The server MUST accept Ping on every supported transport."
doc_sect = "3.1.5.2"
normative = true
verification = "Test Case"
scope = "Server"

[[requirement]]
id = "MS-XYZ_R5"
description = "The server MUST support Ping over UDP."
doc_sect = "3.1.5.2"
normative = true
verification = "Adapter"
scope = "Server"
derived = "R4:c"

[[requirement]]
id = "MS-XYZ_R6"
description = "The client SHOULD retry a Ping that was not answered."
doc_sect = "3.2.5.1"
normative = false
verification = "Non-testable"
scope = "Client"
"#;

/// Expand files and directories into a sorted list of table files
pub fn collect_table_files(paths: &[PathBuf]) -> CoverageResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    CoverageError::format(path, format!("failed to walk directory: {e}"))
                })?;
                let candidate = entry.path();
                if entry.file_type().is_file()
                    && (has_extension(candidate, "toml") || has_extension(candidate, "json"))
                {
                    files.push(candidate.to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Load and merge several table files into one table
pub fn load_tables(paths: &[PathBuf], prefix: &str) -> CoverageResult<RequirementTable> {
    let mut table = RequirementTable::new(prefix);

    for path in collect_table_files(paths)? {
        let file = RequirementsFile::load(&path)?;
        let source = path.display().to_string();
        debug!(
            table = %source,
            protocol = %file.metadata.protocol,
            rows = file.requirement.len(),
            "Loaded requirement table"
        );
        for row in file.requirement {
            table.insert(row.into_record(prefix, &source)?)?;
        }
    }

    info!("Loaded {} requirements", table.len());
    Ok(table)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
