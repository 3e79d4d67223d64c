mod loader;

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

pub use loader::{default_config, load_configuration};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Connection settings and database registrations for [`Manager::connect`](crate::Manager::connect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub uri: String,
    /// Directory fixture paths are resolved against.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
    /// Database aliases as used in step text, e.g. `default` or `other`.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            working_dir: None,
            operation_timeout_secs: None,
            databases: BTreeMap::new(),
        }
    }
}

impl ManagerConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the database on the server.
    pub name: String,
    #[serde(default)]
    pub clean_up_after_scenario: Vec<String>,
}
