//! Run-scoped configuration.
//!
//! Loaded from an optional TOML file, then overridden by `RESTCHECK_*`
//! environment variables. A missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{LifecycleError, Result};

/// Environment keys that override file configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEnv {
    SuiteName,
    ResultsDir,
    ReportDir,
    LogFile,
    HistoryDepth,
    /// `true`/`false` or `1`/`0`.
    OpenReport,
}

impl ConfigEnv {
    pub const ALL: [ConfigEnv; 6] = [
        ConfigEnv::SuiteName,
        ConfigEnv::ResultsDir,
        ConfigEnv::ReportDir,
        ConfigEnv::LogFile,
        ConfigEnv::HistoryDepth,
        ConfigEnv::OpenReport,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigEnv::SuiteName => "RESTCHECK_SUITE_NAME",
            ConfigEnv::ResultsDir => "RESTCHECK_RESULTS_DIR",
            ConfigEnv::ReportDir => "RESTCHECK_REPORT_DIR",
            ConfigEnv::LogFile => "RESTCHECK_LOG_FILE",
            ConfigEnv::HistoryDepth => "RESTCHECK_HISTORY_DEPTH",
            ConfigEnv::OpenReport => "RESTCHECK_OPEN_REPORT",
        }
    }
}

/// Output locations and report settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub suite_name: String,

    /// Per-test result records and `environment.properties`.
    pub results_dir: PathBuf,

    /// Generated report variants and the published `latest` report.
    pub report_dir: PathBuf,

    /// Accumulated lifecycle log, deleted at run start.
    pub log_file: PathBuf,

    /// Maximum number of runs kept in report history.
    pub history_depth: usize,

    /// Launch the platform opener on the published report.
    pub open_report: bool,

    /// Extra key/values for the environment metadata.
    pub environment: BTreeMap<String, String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            suite_name: "General Framework Suite".to_string(),
            results_dir: PathBuf::from("test-outputs/report-results"),
            report_dir: PathBuf::from("test-outputs/reports"),
            log_file: PathBuf::from("test-outputs/logs/logs.log"),
            history_depth: 20,
            open_report: false,
            environment: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    /// All output locations rooted under `root`, other settings defaulted.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            results_dir: root.join("report-results"),
            report_dir: root.join("reports"),
            log_file: root.join("logs").join("logs.log"),
            ..Self::default()
        }
    }

    /// Parse a TOML document; absent keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| LifecycleError::Config(e.to_string()))
    }

    /// Read `path` if given and present, then apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(raw) => Self::from_toml_str(&raw)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(e) => {
                    return Err(LifecycleError::Config(format!(
                        "read {}: {}",
                        path.display(),
                        e
                    )))
                }
            },
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| {
            std::env::var_os(name).map(|raw| {
                raw.into_string()
                    .map_err(|_| LifecycleError::Config(format!("{name} must be valid UTF-8")))
            })
        })
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// Set-but-empty values and unparsable numbers or booleans are errors.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<Result<String>>,
    {
        for key in ConfigEnv::ALL {
            let name = key.as_str();
            let Some(value) = lookup(name).transpose()? else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                return Err(LifecycleError::Config(format!("{name} must not be empty")));
            }
            match key {
                ConfigEnv::SuiteName => self.suite_name = value.to_string(),
                ConfigEnv::ResultsDir => self.results_dir = PathBuf::from(value),
                ConfigEnv::ReportDir => self.report_dir = PathBuf::from(value),
                ConfigEnv::LogFile => self.log_file = PathBuf::from(value),
                ConfigEnv::HistoryDepth => {
                    self.history_depth = value.parse().map_err(|_| {
                        LifecycleError::Config(format!(
                            "{name} must be a non-negative integer, got '{value}'"
                        ))
                    })?
                }
                ConfigEnv::OpenReport => self.open_report = parse_bool(name, value)?,
            }
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(LifecycleError::Config(format!(
            "{name} must be one of true/false/1/0, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<Result<String>> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned().map(Ok)
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.suite_name, "General Framework Suite");
        assert_eq!(
            config.results_dir,
            PathBuf::from("test-outputs/report-results")
        );
        assert_eq!(config.log_file, PathBuf::from("test-outputs/logs/logs.log"));
        assert_eq!(config.history_depth, 20);
        assert!(!config.open_report);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RunConfig::from_toml_str(
            r#"
            suite_name = "Trello API"
            history_depth = 5

            [environment]
            base_url = "https://api.trello.com/1"
            "#,
        )
        .unwrap();
        assert_eq!(config.suite_name, "Trello API");
        assert_eq!(config.history_depth, 5);
        assert_eq!(config.report_dir, PathBuf::from("test-outputs/reports"));
        assert_eq!(
            config.environment.get("base_url").map(String::as_str),
            Some("https://api.trello.com/1")
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = RunConfig::from_toml_str("history_depth = \"many\"").unwrap_err();
        assert!(matches!(err, LifecycleError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RunConfig::default();
        config
            .apply_overrides(lookup(&[
                ("RESTCHECK_SUITE_NAME", "Nightly"),
                ("RESTCHECK_HISTORY_DEPTH", "3"),
                ("RESTCHECK_OPEN_REPORT", "1"),
                ("RESTCHECK_LOG_FILE", "/tmp/run.log"),
            ]))
            .unwrap();
        assert_eq!(config.suite_name, "Nightly");
        assert_eq!(config.history_depth, 3);
        assert!(config.open_report);
        assert_eq!(config.log_file, PathBuf::from("/tmp/run.log"));
    }

    #[test]
    fn test_env_rejects_empty_and_invalid() {
        let mut config = RunConfig::default();
        let err = config
            .apply_overrides(lookup(&[("RESTCHECK_REPORT_DIR", "  ")]))
            .unwrap_err();
        assert!(err.to_string().contains("RESTCHECK_REPORT_DIR must not be empty"));

        let err = config
            .apply_overrides(lookup(&[("RESTCHECK_OPEN_REPORT", "yes")]))
            .unwrap_err();
        assert!(err.to_string().contains("true/false/1/0"));

        let err = config
            .apply_overrides(lookup(&[("RESTCHECK_HISTORY_DEPTH", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("non-negative integer"));
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut expected = RunConfig::default();
        expected.apply_env().unwrap();
        let config = RunConfig::load(Some(&dir.path().join("absent.toml")))
            .await
            .unwrap();
        assert_eq!(config, expected);
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restcheck.toml");
        tokio::fs::write(&path, "results_dir = \"out/results\"\n")
            .await
            .unwrap();
        let config = RunConfig::load(Some(&path)).await.unwrap();
        if std::env::var_os(ConfigEnv::ResultsDir.as_str()).is_none() {
            assert_eq!(config.results_dir, PathBuf::from("out/results"));
        }
    }
}
