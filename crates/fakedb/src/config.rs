//! Connection configuration.

use crate::dataset::Dataset;
use fakedb_core::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a [`crate::FakeDriver`] opens datasets.
///
/// Missing fields take their defaults when deserialized, so
/// `{"database": "orders"}` is a complete config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeConfig {
    /// Dataset name used by [`crate::FakeDriver::connect`].
    pub database: String,
    /// Register an empty dataset when the name is unknown.
    pub create_if_missing: bool,
    /// JSON fixture loaded into the dataset on open while it is still empty.
    pub fixture: Option<PathBuf>,
    /// Turn on catcher lookup logging when the driver is built.
    pub log_lookups: bool,
}

impl Default for FakeConfig {
    fn default() -> Self {
        Self {
            database: "default".to_string(),
            create_if_missing: true,
            fixture: None,
            log_lookups: false,
        }
    }
}

impl FakeConfig {
    /// Config for the named dataset.
    pub fn database(name: impl Into<String>) -> Self {
        Self {
            database: name.into(),
            ..Self::default()
        }
    }

    /// Fail to open unknown datasets instead of creating them.
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Seed empty datasets from a JSON file.
    pub fn fixture(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixture = Some(path.into());
        self
    }

    pub fn log_lookups(mut self, enabled: bool) -> Self {
        self.log_lookups = enabled;
        self
    }

    /// Parse and validate a config from JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject an empty database name or a fixture path that is a directory.
    pub fn validate(&self) -> Result<()> {
        check_database_name(&self.database)?;
        if let Some(path) = self.fixture.as_deref().filter(|p| p.is_dir()) {
            return Err(ConfigError {
                message: format!("fixture {} is a directory", path.display()),
            }
            .into());
        }
        Ok(())
    }

    /// Read and parse the configured fixture, if any.
    pub(crate) fn load_fixture(&self) -> Result<Option<Dataset>> {
        self.fixture.as_deref().map(read_fixture).transpose()
    }
}

pub(crate) fn check_database_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ConfigError {
            message: "database name must not be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

fn read_fixture(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "Loading fixture");
    Dataset::from_json_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_create_missing_datasets() {
        let config = FakeConfig::default();
        assert_eq!(config.database, "default");
        assert!(config.create_if_missing);
        assert!(config.fixture.is_none());
        assert!(config.load_fixture().unwrap().is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let config = FakeConfig::database("orders")
            .create_if_missing(false)
            .fixture("/tmp/orders.json")
            .log_lookups(true);
        assert_eq!(config.database, "orders");
        assert!(!config.create_if_missing);
        assert_eq!(config.fixture.as_deref(), Some(Path::new("/tmp/orders.json")));
        assert!(config.log_lookups);
    }

    #[test]
    fn partial_json_config_keeps_defaults() {
        let config = FakeConfig::from_json_str(r#"{"database": "orders", "log_lookups": true}"#)
            .unwrap();
        assert_eq!(config.database, "orders");
        assert!(config.create_if_missing);
        assert!(config.log_lookups);

        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(FakeConfig::from_json_str(&text).unwrap(), config);
        assert!(FakeConfig::from_json_str("{\"database\": 3}").is_err());
    }

    #[test]
    fn validate_rejects_empty_name_and_directory_fixture() {
        assert!(FakeConfig::default().validate().is_ok());

        let err = FakeConfig::from_json_str(r#"{"database": "  "}"#).unwrap_err();
        assert!(matches!(err, fakedb_core::Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: database name must not be empty"
        );

        let dir = tempfile::tempdir().unwrap();
        let err = FakeConfig::database("dir_fixture")
            .fixture(dir.path())
            .validate()
            .unwrap_err();
        assert!(matches!(err, fakedb_core::Error::Config(_)));
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn loads_fixture_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"users": [{{"id": 1}}, {{"id": 2}}]}}"#).unwrap();

        let config = FakeConfig::database("fixture_test").fixture(file.path());
        let dataset = config.load_fixture().unwrap().unwrap();
        assert_eq!(dataset.table("users").unwrap().len(), 2);
    }

    #[test]
    fn missing_fixture_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = FakeConfig::default().fixture(dir.path().join("absent.json"));
        assert!(matches!(
            config.load_fixture(),
            Err(fakedb_core::Error::Io(_))
        ));
    }
}
