//! End-to-end coverage scenarios
//!
//! Each test writes requirement tables and test logs into a temporary
//! directory and runs the whole pipeline through [`CoverageAnalyzer`].

use std::path::{
    Path,
    PathBuf,
};

use reqtrace_core::{
    AnalysisConfig,
    CoverageAnalyzer,
    CoverageError,
    CoverageReport,
    FinalStatus,
    ScopeConfig,
    diagnostics::IssueKind,
    requirements::{
        RequirementId,
        load_tables,
    },
};
use tempfile::TempDir;

/// One `[[requirement]]` row
fn row(id: &str, verification: &str, derived: &str) -> String {
    format!(
        "[[requirement]]\nid = \"{id}\"\nnormative = true\nverification = \"{verification}\"\nscope = \"Server\"\nderived = \"{derived}\"\n\n"
    )
}

fn write_table(dir: &Path, name: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let content = format!("[metadata]\nprotocol = \"MS-TEST\"\nversion = \"1.0\"\n\n{}", rows.concat());
    std::fs::write(&path, content).unwrap();
    path
}

/// A text log with one passing test case per requirement
fn write_log(dir: &Path, name: &str, covered: &[&str]) -> PathBuf {
    let mut content = String::new();
    for (i, req) in covered.iter().enumerate() {
        content.push_str(&format!("[2024-05-01T08:00:{i:02}Z] TestCase: Case{i}\n"));
        content.push_str(&format!("[2024-05-01T08:00:{i:02}Z] Checkpoint: {req}\n"));
        content.push_str(&format!("[2024-05-01T08:00:{i:02}Z] Result: Passed\n"));
    }
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn analyzer_for(table: &Path) -> Result<CoverageAnalyzer, CoverageError> {
    let table = load_tables(&[table.to_path_buf()], "")?;
    CoverageAnalyzer::new(table, ScopeConfig::default())
}

fn status(report: &CoverageReport, id: &str) -> FinalStatus {
    report
        .requirements
        .iter()
        .find(|r| r.id.as_str() == id)
        .map(|r| r.status)
        .unwrap_or_else(|| panic!("{id} missing from report"))
}

#[test]
fn test_inferred_derivation_counts_root_once() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[
        row("R1", "Test Case", ""),
        row("R2", "Test Case", "R1:i"),
    ]);
    let log = write_log(dir.path(), "run.log", &["R2"]);

    let analyzer = analyzer_for(&table).unwrap();
    let report = analyzer.analyze_logs(&[log]).unwrap();

    assert_eq!(status(&report, "R1"), FinalStatus::Verified);
    assert_eq!(status(&report, "R2"), FinalStatus::Verified);
    assert_eq!(report.statistics.with_derivation.verified, 1);
    assert_eq!(report.statistics.with_derivation.to_verify, 1);
}

#[test]
fn test_one_of_two_cases_is_partial() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[
        row("R1", "Test Case", ""),
        row("R3", "Test Case", "R1:c"),
        row("R4", "Test Case", "R1:c"),
    ]);
    let analyzer = analyzer_for(&table).unwrap();

    let partial = analyzer.analyze_logs(&[write_log(dir.path(), "a.log", &["R3"])]).unwrap();
    assert_eq!(status(&partial, "R1"), FinalStatus::Partial);

    let full = analyzer.analyze_logs(&[write_log(dir.path(), "b.log", &["R3", "R4"])]).unwrap();
    assert_eq!(status(&full, "R1"), FinalStatus::Verified);
}

#[test]
fn test_derive_from_deleted_is_recorded() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[
        row("R5", "Deleted", ""),
        row("R6", "Test Case", "R5:i"),
    ]);
    let log = write_log(dir.path(), "run.log", &["R6"]);

    let analyzer = analyzer_for(&table).unwrap();
    assert!(analyzer.validation().contains("R6", IssueKind::DeriveFromDeleted));
    assert!(analyzer.graph().is_empty());

    let report = analyzer.analyze_logs(&[log]).unwrap();
    assert!(!report.requirements.iter().any(|r| r.id.as_str() == "R5"));
    assert_eq!(status(&report, "R6"), FinalStatus::Verified);
}

#[test]
fn test_unknown_derivation_type_is_fatal() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[
        row("R1", "Test Case", ""),
        row("R2", "Test Case", "R1:x"),
    ]);

    match analyzer_for(&table) {
        Err(CoverageError::MalformedDerivation { requirement, term, .. }) => {
            assert_eq!(requirement, "R2");
            assert_eq!(term, "R1:x");
        },
        other => panic!("expected a malformed derivation error, got {other:?}"),
    }
}

#[test]
fn test_cycle_is_fatal_with_path() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[
        row("R7", "Test Case", "R8"),
        row("R8", "Test Case", "R7"),
    ]);

    let err = analyzer_for(&table).unwrap_err();
    assert_eq!(err.to_string(), "derivation cycle detected: R7 --> R8 --> R7");
}

#[test]
fn test_duplicate_ids_across_tables_are_fatal() {
    let dir = TempDir::new().unwrap();
    write_table(dir.path(), "a.toml", &[row("R1", "Test Case", "")]);
    write_table(dir.path(), "b.toml", &[row("R1", "Adapter", "")]);

    let err = load_tables(&[dir.path().to_path_buf()], "").unwrap_err();
    assert!(matches!(err, CoverageError::DuplicateRequirement { .. }));
}

#[test]
fn test_failed_test_cases_do_not_count() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[row("R1", "Test Case", "")]);
    let log = dir.path().join("run.log");
    std::fs::write(
        &log,
        "[t0] TestCase: Flaky\n[t1] Checkpoint: R1\n[t2] Result: Failed\n",
    )
    .unwrap();

    let report = analyzer_for(&table).unwrap().analyze_logs(&[log]).unwrap();

    assert_eq!(status(&report, "R1"), FinalStatus::Unverified);
    assert!(report.inconsistencies.contains("R1", IssueKind::NotCovered));
}

#[test]
fn test_repeated_analysis_is_stable() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[
        row("R1", "Test Case", ""),
        row("R2", "Test Case", "R1:c"),
        row("R3", "Test Case", "R1:c"),
        row("R4", "Test Case", "R2:p"),
    ]);
    let log = write_log(dir.path(), "run.log", &["R3", "R4"]);
    let analyzer = analyzer_for(&table).unwrap();

    let first = analyzer.analyze_logs(std::slice::from_ref(&log)).unwrap();
    let second = analyzer.analyze_logs(&[log]).unwrap();

    assert_eq!(first.requirements, second.requirements);
    assert_eq!(first.statistics, second.statistics);
    assert_eq!(status(&first, "R2"), FinalStatus::Partial);
    assert_eq!(status(&first, "R1"), FinalStatus::Partial);
}

#[test]
fn test_delta_filter_severs_unchanged_original() {
    let dir = TempDir::new().unwrap();
    let table_path = dir.path().join("table.toml");
    std::fs::write(
        &table_path,
        "[[requirement]]\nid = \"R1\"\nnormative = true\nverification = \"Test Case\"\nscope = \"Server\"\ndelta = \"unchanged\"\n\n\
         [[requirement]]\nid = \"R2\"\nnormative = true\nverification = \"Test Case\"\nscope = \"Server\"\nderived = \"R1\"\n\n\
         [[requirement]]\nid = \"R3\"\nnormative = true\nverification = \"Test Case\"\nscope = \"Server\"\n",
    )
    .unwrap();
    let scope = ScopeConfig {
        delta: Some(vec!["new".to_string()]),
        ..ScopeConfig::default()
    };

    let table = load_tables(&[table_path], "").unwrap();
    let analyzer = CoverageAnalyzer::new(table, scope).unwrap();

    assert!(!analyzer.graph().contains(&RequirementId::new("R2")));
    assert!(!analyzer.classification().is_to_verify(&RequirementId::new("R2")));
    let report = analyzer.analyze(&Default::default()).unwrap();
    assert_eq!(report.statistics.leaf.to_verify, 1);
    assert_eq!(status(&report, "R1"), FinalStatus::NotApplicable);
}

#[test]
fn test_unverified_root_is_not_lifted_by_derived_coverage() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[
        row("R1", "Unverified", ""),
        row("R2", "Test Case", "R1:i"),
    ]);
    let log = write_log(dir.path(), "run.log", &["R2"]);

    let analyzer = analyzer_for(&table).unwrap();
    assert!(analyzer.validation().contains("R2", IssueKind::DeriveFromUnverified));

    let report = analyzer.analyze_logs(&[log]).unwrap();
    assert_eq!(status(&report, "R1"), FinalStatus::Unverified);
    assert_eq!(status(&report, "R2"), FinalStatus::Verified);
}

#[test]
fn test_earlier_log_wins_across_id_spellings() {
    let dir = TempDir::new().unwrap();
    let table = write_table(dir.path(), "table.toml", &[row("MS-XYZ_R1", "Test Case", "")]);
    let early = write_log(dir.path(), "a.log", &["R1"]);
    let late = write_log(dir.path(), "b.log", &["MS-XYZ_R1"]);

    let table = load_tables(&[table], "MS-XYZ_").unwrap();
    let analyzer = CoverageAnalyzer::new(table, ScopeConfig::default()).unwrap();
    let report = analyzer.analyze_logs(&[early, late]).unwrap();

    let row = report
        .requirements
        .iter()
        .find(|r| r.id.as_str() == "MS-XYZ_R1")
        .unwrap();
    assert_eq!(row.status, FinalStatus::Verified);
    assert!(row.source.as_deref().unwrap().ends_with("a.log"));
}

#[test]
fn test_config_driven_run_with_prefix() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("requirements.toml"), reqtrace_core::requirements::table::SAMPLE_TABLE)
        .unwrap();
    std::fs::create_dir(dir.path().join("logs")).unwrap();
    write_log(&dir.path().join("logs"), "run.log", &["R2", "MS-XYZ_R3", "MS-XYZ_R5", "R99"]);
    let config_path = dir.path().join("reqtrace.toml");
    std::fs::write(&config_path, reqtrace_core::config::SAMPLE_CONFIG).unwrap();

    let config = AnalysisConfig::load(&config_path).unwrap();
    let analyzer = CoverageAnalyzer::from_config(&config).unwrap();
    let report = analyzer.analyze_logs(&config.input.logs).unwrap();

    assert_eq!(status(&report, "MS-XYZ_R1"), FinalStatus::Verified);
    assert_eq!(status(&report, "MS-XYZ_R4"), FinalStatus::Verified);
    assert_eq!(status(&report, "MS-XYZ_R6"), FinalStatus::NotApplicable);
    assert!(report.inconsistencies.contains("R99", IssueKind::NonExist));
    assert_eq!(report.diagnostics.summary.errors, 1);
}
