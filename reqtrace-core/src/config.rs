//! Configuration management for coverage analysis

use std::{
    collections::BTreeSet,
    path::{
        Path,
        PathBuf,
    },
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    CoverageError,
    CoverageResult,
};

/// Top-level analysis configuration, usually read from `reqtrace.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Scope and delta filtering
    #[serde(default)]
    pub scope: ScopeConfig,
    /// Input locations
    #[serde(default)]
    pub input: InputConfig,
}

/// Scope classification settings
///
/// Fields missing from a `[scope]` table take their `Default` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Whether scope values take part in classification at all
    pub check_scope:        bool,
    /// Scope values that are analyzed
    pub in_scope:           Vec<String>,
    /// Scope values that are excluded
    pub out_of_scope:       Vec<String>,
    /// Delta values to keep; `None` disables delta filtering
    pub delta:              Option<Vec<String>>,
    /// Prefix used to rebuild abbreviated requirement IDs
    pub requirement_prefix: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            check_scope:        true,
            in_scope:           vec!["Server".to_string(), "Both".to_string()],
            out_of_scope:       vec!["Client".to_string()],
            delta:              None,
            requirement_prefix: String::new(),
        }
    }
}

/// Where tables and logs are read from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Specification table files or directories
    #[serde(default)]
    pub tables: Vec<PathBuf>,
    /// Test log files or directories
    #[serde(default)]
    pub logs:   Vec<PathBuf>,
}

/// Whether a scope value is analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMembership {
    /// Listed in the in-scope set
    InScope,
    /// Listed in the out-of-scope set
    OutOfScope,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl ScopeConfig {
    /// Reject configurations the classifier cannot work with
    pub fn validate(&self) -> CoverageResult<()> {
        let in_scope: BTreeSet<String> = self.in_scope.iter().map(|s| normalize(s)).collect();
        let overlap: Vec<&String> = self
            .out_of_scope
            .iter()
            .filter(|s| in_scope.contains(&normalize(s)))
            .collect();
        if !overlap.is_empty() {
            return Err(CoverageError::ScopeConfig(format!(
                "scope values listed as both in-scope and out-of-scope: {}",
                overlap.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            )));
        }

        if let Some(delta) = &self.delta {
            if delta.iter().all(|d| d.trim().is_empty()) {
                return Err(CoverageError::ScopeConfig(
                    "delta filter must list at least one value".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Classify a scope value; `None` when it is listed in neither set
    pub fn membership(&self, scope: &str) -> Option<ScopeMembership> {
        let key = normalize(scope);
        if self.in_scope.iter().any(|s| normalize(s) == key) {
            Some(ScopeMembership::InScope)
        } else if self.out_of_scope.iter().any(|s| normalize(s) == key) {
            Some(ScopeMembership::OutOfScope)
        } else {
            None
        }
    }

    /// Whether a delta filter is active
    pub fn delta_filter_active(&self) -> bool {
        self.delta.is_some()
    }

    /// Whether the delta value passes the filter (always true without one)
    pub fn delta_included(&self, delta: &str) -> bool {
        match &self.delta {
            None => true,
            Some(values) => {
                let key = normalize(delta);
                values.iter().any(|v| normalize(v) == key)
            },
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    ///
    /// Relative input paths are resolved against the file's directory.
    pub fn load(path: &Path) -> CoverageResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| CoverageError::format(path, e.to_string()))?;

        if let Some(base) = path.parent() {
            config.input.resolve_relative_to(base);
        }

        config.scope.validate()?;
        Ok(config)
    }
}

impl InputConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in self.tables.iter_mut().chain(self.logs.iter_mut()) {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Sample configuration written by `reqtrace init`
pub const SAMPLE_CONFIG: &str = r#"[scope]
check_scope = true
in_scope = ["Server", "Both"]
out_of_scope = ["Client"]
requirement_prefix = "MS-XYZ_"
# delta = ["new", "changed"]

[input]
tables = ["requirements.toml"]
logs = ["logs"]
"#;

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_scope_config() {
        let config = ScopeConfig::default();
        assert!(config.check_scope);
        assert!(config.validate().is_ok());
        assert_eq!(config.membership("server"), Some(ScopeMembership::InScope));
        assert_eq!(config.membership(" Client "), Some(ScopeMembership::OutOfScope));
        assert_eq!(config.membership("Proxy"), None);
    }

    #[test]
    fn test_overlapping_scope_rejected() {
        let config = ScopeConfig {
            in_scope: vec!["Server".to_string()],
            out_of_scope: vec!["server".to_string()],
            ..ScopeConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoverageError::ScopeConfig(_))));
    }

    #[test]
    fn test_empty_delta_rejected() {
        let config = ScopeConfig {
            delta: Some(vec![]),
            ..ScopeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delta_filter() {
        let config = ScopeConfig {
            delta: Some(vec!["new".to_string(), "changed".to_string()]),
            ..ScopeConfig::default()
        };
        assert!(config.delta_filter_active());
        assert!(config.delta_included("New"));
        assert!(!config.delta_included("unchanged"));
        assert!(ScopeConfig::default().delta_included("anything"));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reqtrace.toml");
        std::fs::write(&path, SAMPLE_CONFIG).unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.scope.requirement_prefix, "MS-XYZ_");
        assert_eq!(config.input.tables, vec![dir.path().join("requirements.toml")]);
        assert_eq!(config.input.logs, vec![dir.path().join("logs")]);
    }

    #[test]
    fn test_partial_scope_section_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reqtrace.toml");
        std::fs::write(&path, "[scope]\nrequirement_prefix = \"MS-XYZ_\"\n").unwrap();

        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.scope.requirement_prefix, "MS-XYZ_");
        assert!(config.scope.check_scope);
        assert_eq!(config.scope.in_scope, ScopeConfig::default().in_scope);
        assert_eq!(config.scope.out_of_scope, ScopeConfig::default().out_of_scope);
        assert_eq!(config.scope.membership("Server"), Some(ScopeMembership::InScope));
    }
}
