use std::path::Path;

use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use log::{debug, info};

use super::{DEFAULT_URI, ManagerConfig};

pub fn default_config() -> &'static str {
    include_str!("../../config/mongosteps.toml")
}

/// Loads the manager configuration.
///
/// Sources in increasing priority: built-in defaults, the TOML file at `path` (when given)
/// and `MONGOSTEPS__*` environment variables, e.g. `MONGOSTEPS__URI` or
/// `MONGOSTEPS__DATABASES__DEFAULT__NAME`.
pub fn load_configuration(path: Option<&Path>) -> Result<ManagerConfig> {
    let mut builder = Config::builder()
        .set_default("uri", DEFAULT_URI)
        .context("Could not set default uri")?;

    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("Configuration file {} does not exist", path.display());
        }
        info!(path:% = path.display(); "Loading mongo step configuration");
        builder = builder.add_source(File::from(path));
    }

    let cfg = builder
        .add_source(
            Environment::with_prefix("MONGOSTEPS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Could not build configuration")?;

    let config: ManagerConfig = cfg
        .try_deserialize()
        .context("Could not deserialize mongo step configuration")?;

    debug!(uri = config.uri.as_str(), databases = config.databases.len(); "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;
    use crate::config::DatabaseConfig;

    fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("mongosteps.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    #[serial]
    fn embedded_template_loads() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, default_config());

        let config = load_configuration(Some(&path)).unwrap();

        assert_eq!(config.uri, DEFAULT_URI);
        assert_eq!(
            config.databases.get("default"),
            Some(&DatabaseConfig {
                name: "default_db".to_string(),
                clean_up_after_scenario: vec!["customer".to_string()],
            })
        );
        assert_eq!(config.databases.len(), 2);
        assert_eq!(config.operation_timeout(), None);
    }

    #[test]
    #[serial]
    fn defaults_apply_without_file() {
        let config = load_configuration(None).unwrap();

        assert_eq!(config.uri, DEFAULT_URI);
        assert!(config.databases.is_empty());
    }

    #[test]
    #[serial]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();

        assert!(load_configuration(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
uri = "mongodb://file:27017"
operation_timeout_secs = 5
working_dir = "fixtures"
"#,
        );

        unsafe { std::env::set_var("MONGOSTEPS__URI", "mongodb://env:27017") };
        let config = load_configuration(Some(&path));
        unsafe { std::env::remove_var("MONGOSTEPS__URI") };

        let config = config.unwrap();
        assert_eq!(config.uri, "mongodb://env:27017");
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.working_dir.as_deref(), Some(Path::new("fixtures")));
    }
}
