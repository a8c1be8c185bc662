//! Direct coverage evidence from test logs
//!
//! A test log records test cases, the requirement checkpoints each one hit
//! and its result. Only checkpoints of passing test cases count as evidence.
//! Two log shapes are understood:
//!
//! - JSON: `{ "test_run": "...", "test_cases": [ { "name", "result",
//!   "checkpoints": [ { "requirement", "timestamp" } ] } ] }`
//! - Text: one entry per line, `[<timestamp>] TestCase: <name>`, `[<timestamp>]
//!   Checkpoint: <requirement>` and `[<timestamp>] Result: <result>`
//!
//! When a requirement is hit more than once, the first occurrence wins, in
//! sorted file order and then in-file order.

use std::{
    collections::{
        BTreeMap,
        btree_map::Entry,
    },
    path::{
        Path,
        PathBuf,
    },
};

use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
};
use walkdir::WalkDir;

use crate::{
    error::{
        CoverageError,
        CoverageResult,
    },
    requirements::{
        RequirementId,
        RequirementTable,
    },
};

/// Where and when a requirement was observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEvidence {
    /// Log file (or other identifier) the checkpoint came from
    pub source:    String,
    /// Checkpoint timestamp as written in the log
    pub timestamp: String,
}

impl CoverageEvidence {
    /// Create an evidence entry
    pub fn new(source: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            source:    source.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Requirement ID (as written in the logs) to its first observation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectCoverage {
    entries: BTreeMap<RequirementId, CoverageEvidence>,
    /// Raw IDs in observation order
    order:   Vec<RequirementId>,
}

impl DirectCoverage {
    /// Empty evidence set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation; returns `false` if the requirement was already
    /// observed, in which case the earlier entry is kept
    pub fn insert(&mut self, id: RequirementId, evidence: CoverageEvidence) -> bool {
        match self.entries.entry(id) {
            Entry::Vacant(slot) => {
                self.order.push(slot.key().clone());
                slot.insert(evidence);
                true
            },
            Entry::Occupied(_) => false,
        }
    }

    /// Observation for a requirement
    pub fn get(&self, id: &RequirementId) -> Option<&CoverageEvidence> {
        self.entries.get(id)
    }

    /// Whether a requirement was observed
    pub fn contains(&self, id: &RequirementId) -> bool {
        self.entries.contains_key(id)
    }

    /// Iterate observations in ID order
    pub fn iter(&self) -> impl Iterator<Item = (&RequirementId, &CoverageEvidence)> {
        self.entries.iter()
    }

    /// Number of observed requirements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was observed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-key observations by canonical table ID.
    ///
    /// Returns the resolved set and the IDs that match no table row. When
    /// two spellings resolve to the same requirement the one observed first
    /// wins.
    pub fn resolve(&self, table: &RequirementTable) -> (DirectCoverage, Vec<RequirementId>) {
        let mut resolved = DirectCoverage::new();
        let mut unknown = Vec::new();
        for raw in &self.order {
            let Some(evidence) = self.entries.get(raw) else {
                continue;
            };
            match table.resolve(raw.as_str()) {
                Some(record) => {
                    resolved.insert(record.id.clone(), evidence.clone());
                },
                None => unknown.push(raw.clone()),
            }
        }
        (resolved, unknown)
    }
}

impl FromIterator<(RequirementId, CoverageEvidence)> for DirectCoverage {
    fn from_iter<I: IntoIterator<Item = (RequirementId, CoverageEvidence)>>(iter: I) -> Self {
        let mut coverage = Self::new();
        for (id, evidence) in iter {
            coverage.insert(id, evidence);
        }
        coverage
    }
}

#[derive(Debug, Deserialize)]
struct JsonLog {
    #[serde(default)]
    test_run:   String,
    #[serde(default)]
    test_cases: Vec<JsonTestCase>,
}

#[derive(Debug, Deserialize)]
struct JsonTestCase {
    name:        String,
    result:      String,
    #[serde(default)]
    checkpoints: Vec<JsonCheckpoint>,
}

#[derive(Debug, Deserialize)]
struct JsonCheckpoint {
    requirement: String,
    timestamp:   String,
}

const PASSED: &str = "passed";

fn is_passed(result: &str) -> bool {
    result.trim().eq_ignore_ascii_case(PASSED)
}

/// Reads test logs into [`DirectCoverage`]
#[derive(Debug, Clone)]
pub struct EvidenceLoader {
    line: Regex,
}

impl EvidenceLoader {
    /// Create a loader
    pub fn new() -> CoverageResult<Self> {
        let line = Regex::new(
            r"^\s*\[(?P<ts>[^\]]+)\]\s*(?P<kind>TestCase|Checkpoint|Result)\s*:\s*(?P<value>.*?)\s*$",
        )
        .map_err(|e| CoverageError::Internal(format!("invalid log pattern: {e}")))?;
        Ok(Self { line })
    }

    /// Load every log file under `paths`, walking directories in sorted order
    pub fn load_paths(&self, paths: &[PathBuf]) -> CoverageResult<DirectCoverage> {
        let mut coverage = DirectCoverage::new();
        for path in collect_log_files(paths)? {
            self.load_file(&path, &mut coverage)?;
        }
        info!("Collected direct coverage for {} requirements", coverage.len());
        Ok(coverage)
    }

    /// Load one log file into `coverage`
    pub fn load_file(&self, path: &Path, coverage: &mut DirectCoverage) -> CoverageResult<()> {
        let content = std::fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;
        let source = path.display().to_string();

        let before = coverage.len();
        if has_extension(path, "json") {
            self.parse_json(&content, &source, coverage)
                .map_err(|e| CoverageError::format(path, e))?;
        } else {
            self.parse_text(&content, &source, coverage);
        }
        debug!(log = %source, new = coverage.len() - before, "Read test log");
        Ok(())
    }

    /// Parse a JSON log; the error is the parser message
    pub fn parse_json(&self, content: &str, source: &str, coverage: &mut DirectCoverage) -> Result<(), String> {
        let log: JsonLog = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if !log.test_run.is_empty() {
            debug!(test_run = %log.test_run, cases = log.test_cases.len(), "Parsing JSON log");
        }

        for case in log.test_cases {
            if !is_passed(&case.result) {
                debug!(test_case = %case.name, result = %case.result, "Skipping non-passing test case");
                continue;
            }
            for checkpoint in case.checkpoints {
                let requirement = checkpoint.requirement.trim();
                if requirement.is_empty() {
                    continue;
                }
                coverage.insert(
                    RequirementId::new(requirement),
                    CoverageEvidence::new(source, checkpoint.timestamp),
                );
            }
        }
        Ok(())
    }

    /// Parse a text log; lines that are not log entries are ignored
    pub fn parse_text(&self, content: &str, source: &str, coverage: &mut DirectCoverage) {
        let mut current: Option<&str> = None;
        let mut pending: Vec<(&str, &str)> = Vec::new();

        for line in content.lines() {
            let Some(caps) = self.line.captures(line) else {
                continue;
            };
            let (Some(ts), Some(kind), Some(value)) = (caps.name("ts"), caps.name("kind"), caps.name("value"))
            else {
                continue;
            };

            match kind.as_str() {
                "TestCase" => {
                    if let Some(name) = current {
                        debug!(test_case = %name, "Test case has no result, ignoring its checkpoints");
                    }
                    current = Some(value.as_str());
                    pending.clear();
                },
                "Checkpoint" if current.is_some() => {
                    pending.push((value.as_str(), ts.as_str()));
                },
                "Checkpoint" => {
                    debug!(requirement = value.as_str(), "Checkpoint outside a test case");
                },
                _ => {
                    if is_passed(value.as_str()) {
                        for (requirement, timestamp) in pending.drain(..) {
                            if !requirement.is_empty() {
                                coverage.insert(
                                    RequirementId::new(requirement),
                                    CoverageEvidence::new(source, timestamp),
                                );
                            }
                        }
                    } else if let Some(name) = current {
                        debug!(test_case = %name, result = value.as_str(), "Skipping non-passing test case");
                    }
                    current = None;
                    pending.clear();
                },
            }
        }
    }
}

/// Sample text log written by `reqtrace init`
pub const SAMPLE_LOG: &str = "\
[2024-03-01T10:00:00Z] TestCase: PingPongEcho
[2024-03-01T10:00:01Z] Checkpoint: MS-XYZ_R2
[2024-03-01T10:00:02Z] Result: Passed
[2024-03-01T10:01:00Z] TestCase: PingOverTcp
[2024-03-01T10:01:01Z] Checkpoint: MS-XYZ_R3
[2024-03-01T10:01:02Z] Result: Passed
[2024-03-01T10:02:00Z] TestCase: PingOverUdp
[2024-03-01T10:02:01Z] Checkpoint: MS-XYZ_R5
[2024-03-01T10:02:02Z] Result: Failed
";

/// Expand files and directories into a sorted list of log files
fn collect_log_files(paths: &[PathBuf]) -> CoverageResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    CoverageError::format(path, format!("failed to walk directory: {e}"))
                })?;
                let candidate = entry.path();
                if entry.file_type().is_file()
                    && ["json", "log", "txt"].iter().any(|ext| has_extension(candidate, ext))
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

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const TEXT_LOG: &str = "\
[2024-03-01T10:00:00Z] TestCase: PingPong
[2024-03-01T10:00:01Z] Checkpoint: MS-XYZ_R2
[2024-03-01T10:00:02Z] Result: Passed
[2024-03-01T10:01:00Z] TestCase: PingUdp
[2024-03-01T10:01:01Z] Checkpoint: MS-XYZ_R5
[2024-03-01T10:01:02Z] Result: Failed
some unrelated output
[2024-03-01T10:02:00Z] TestCase: PingTcp
[2024-03-01T10:02:01Z] Checkpoint: MS-XYZ_R3
[2024-03-01T10:02:02Z] Checkpoint: MS-XYZ_R2
[2024-03-01T10:02:03Z] Result: passed
";

    #[test]
    fn test_text_log() {
        let loader = EvidenceLoader::new().unwrap();
        let mut coverage = DirectCoverage::new();
        loader.parse_text(TEXT_LOG, "run.log", &mut coverage);

        assert_eq!(coverage.len(), 2);
        assert!(!coverage.contains(&RequirementId::new("MS-XYZ_R5")));
        let r2 = coverage.get(&RequirementId::new("MS-XYZ_R2")).unwrap();
        assert_eq!(r2.timestamp, "2024-03-01T10:00:01Z");
        assert_eq!(r2.source, "run.log");
    }

    #[test]
    fn test_sample_log() {
        let loader = EvidenceLoader::new().unwrap();
        let mut coverage = DirectCoverage::new();
        loader.parse_text(SAMPLE_LOG, "sample.log", &mut coverage);
        assert_eq!(coverage.len(), 2);
    }

    #[test]
    fn test_text_log_without_result() {
        let loader = EvidenceLoader::new().unwrap();
        let mut coverage = DirectCoverage::new();
        let log = "[t1] TestCase: A\n[t2] Checkpoint: R1\n[t3] TestCase: B\n[t4] Result: Passed\n";
        loader.parse_text(log, "run.log", &mut coverage);
        assert!(coverage.is_empty());
    }

    #[test]
    fn test_json_log() {
        let loader = EvidenceLoader::new().unwrap();
        let mut coverage = DirectCoverage::new();
        let log = r#"{
            "test_run": "nightly",
            "test_cases": [
                { "name": "A", "result": "Passed",
                  "checkpoints": [ { "requirement": "R1", "timestamp": "t1" } ] },
                { "name": "B", "result": "Inconclusive",
                  "checkpoints": [ { "requirement": "R2", "timestamp": "t2" } ] }
            ]
        }"#;
        loader.parse_json(log, "run.json", &mut coverage).unwrap();

        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage.get(&RequirementId::new("R1")).unwrap().timestamp, "t1");
    }

    #[test]
    fn test_first_file_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("b.log"),
            "[late] TestCase: A\n[late] Checkpoint: R1\n[late] Result: Passed\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.log"),
            "[early] TestCase: A\n[early] Checkpoint: R1\n[early] Result: Passed\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.md"), "[x] Checkpoint: R9\n").unwrap();

        let coverage = EvidenceLoader::new().unwrap().load_paths(&[dir.path().to_path_buf()]).unwrap();

        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage.get(&RequirementId::new("R1")).unwrap().timestamp, "early");
    }

    #[test]
    fn test_resolve_against_table() {
        use crate::requirements::{
            RequirementRecord,
            VerificationMethod,
        };

        let table = RequirementTable::from_records(
            "MS-XYZ_",
            vec![RequirementRecord::new("MS-XYZ_R1", VerificationMethod::TestCase)],
        )
        .unwrap();
        let coverage: DirectCoverage = [
            (RequirementId::new("R1"), CoverageEvidence::new("a.log", "t1")),
            (RequirementId::new("R42"), CoverageEvidence::new("a.log", "t2")),
        ]
        .into_iter()
        .collect();

        let (resolved, unknown) = coverage.resolve(&table);

        assert!(resolved.contains(&RequirementId::new("MS-XYZ_R1")));
        assert_eq!(unknown, vec![RequirementId::new("R42")]);
    }

    #[test]
    fn test_resolve_keeps_first_observation() {
        use crate::requirements::{
            RequirementRecord,
            VerificationMethod,
        };

        let table = RequirementTable::from_records(
            "MS-XYZ_",
            vec![RequirementRecord::new("MS-XYZ_R1", VerificationMethod::TestCase)],
        )
        .unwrap();
        let mut coverage = DirectCoverage::new();
        coverage.insert(RequirementId::new("R1"), CoverageEvidence::new("a.log", "early"));
        coverage.insert(RequirementId::new("MS-XYZ_R1"), CoverageEvidence::new("b.log", "late"));

        let (resolved, unknown) = coverage.resolve(&table);

        assert!(unknown.is_empty());
        assert_eq!(resolved.len(), 1);
        let evidence = resolved.get(&RequirementId::new("MS-XYZ_R1")).unwrap();
        assert_eq!(evidence.source, "a.log");
        assert_eq!(evidence.timestamp, "early");
    }

    #[test]
    fn test_invalid_json_is_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = EvidenceLoader::new().unwrap().load_paths(&[path]).unwrap_err();
        assert!(matches!(err, CoverageError::Format { .. }));
    }
}
