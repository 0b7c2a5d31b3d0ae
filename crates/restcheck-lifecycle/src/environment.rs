//! Environment metadata consumed by the report.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::ReportPublishError;

/// File name of the environment metadata inside the results directory.
pub const ENVIRONMENT_FILE: &str = "environment.properties";

/// Writes run environment metadata where the report backend expects it.
#[async_trait]
pub trait EnvironmentWriter: Send + Sync {
    /// Write `properties` into `results_dir`, returning the written path.
    async fn write(
        &self,
        results_dir: &Path,
        properties: &BTreeMap<String, String>,
    ) -> Result<PathBuf, ReportPublishError>;
}

/// Writes sorted `key=value` lines to `environment.properties`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertiesEnvironmentWriter;

#[async_trait]
impl EnvironmentWriter for PropertiesEnvironmentWriter {
    async fn write(
        &self,
        results_dir: &Path,
        properties: &BTreeMap<String, String>,
    ) -> Result<PathBuf, ReportPublishError> {
        tokio::fs::create_dir_all(results_dir)
            .await
            .map_err(|e| ReportPublishError::io(results_dir, e))?;
        let path = results_dir.join(ENVIRONMENT_FILE);
        tokio::fs::write(&path, render_properties(properties))
            .await
            .map_err(|e| ReportPublishError::io(&path, e))?;
        Ok(path)
    }
}

/// Properties describing this run: platform, version, suite, plus configured extras.
///
/// Configured extras win over the built-in keys.
pub fn environment_properties(config: &RunConfig) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    props.insert("os".to_string(), std::env::consts::OS.to_string());
    props.insert("arch".to_string(), std::env::consts::ARCH.to_string());
    props.insert("restcheck.version".to_string(), crate::VERSION.to_string());
    props.insert("suite".to_string(), config.suite_name.clone());
    for (key, value) in &config.environment {
        props.insert(key.clone(), value.clone());
    }
    props
}

/// Render `key=value` lines. Line breaks in values are escaped.
pub fn render_properties(properties: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in properties {
        out.push_str(&format!("{}={}\n", key, escape(value)));
    }
    out
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_sorted_and_extras_override() {
        let mut config = RunConfig::default();
        config
            .environment
            .insert("base_url".to_string(), "https://api.trello.com/1".to_string());
        config
            .environment
            .insert("suite".to_string(), "Overridden".to_string());

        let props = environment_properties(&config);
        assert_eq!(props["suite"], "Overridden");
        assert_eq!(props["os"], std::env::consts::OS);

        let rendered = render_properties(&props);
        let keys: Vec<&str> = rendered
            .lines()
            .map(|l| l.split('=').next().unwrap())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(rendered.contains("base_url=https://api.trello.com/1\n"));
    }

    #[test]
    fn test_multiline_values_escaped() {
        let mut props = BTreeMap::new();
        props.insert("note".to_string(), "a\nb".to_string());
        assert_eq!(render_properties(&props), "note=a\\nb\n");
    }

    #[tokio::test]
    async fn test_writer_creates_results_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let results = tmp.path().join("report-results");
        let mut props = BTreeMap::new();
        props.insert("suite".to_string(), "S".to_string());

        let path = PropertiesEnvironmentWriter
            .write(&results, &props)
            .await
            .unwrap();
        assert_eq!(path, results.join(ENVIRONMENT_FILE));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "suite=S\n");
    }
}
