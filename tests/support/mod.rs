// Shared World and logging setup for the cucumber suites.

use std::{
    path::Path,
    sync::{Arc, Once, OnceLock},
};

use cucumber::World;
use log::{debug, info};
use log4rs::config::{Deserializers, RawConfig};
use mongosteps::{Manager, MongoWorld, ScenarioContext};

pub const FEATURES_DIR: &str = "tests/features";
pub const FIXTURES_DIR: &str = "tests/fixtures";

static MANAGER: OnceLock<Arc<Manager>> = OnceLock::new();

/// Installs the manager every scenario of this run shares. Must be called before the run starts.
pub fn install_manager(manager: Manager) {
    if MANAGER.set(Arc::new(manager)).is_err() {
        panic!("Manager already installed");
    }
}

#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct MongoStepsWorld {
    mongo: ScenarioContext,
}

impl MongoStepsWorld {
    pub fn new() -> Self {
        let manager = MANAGER.get().expect("install_manager must run before the suite").clone();
        Self {
            mongo: ScenarioContext::new(manager),
        }
    }
}

impl MongoWorld for MongoStepsWorld {
    fn mongo(&mut self) -> &mut ScenarioContext {
        &mut self.mongo
    }
}

/// Initializes logging from `log4rs.yml` when present, otherwise from the bundled test configuration.
pub fn init_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let config_path = "log4rs.yml";
        let path = Path::new(config_path);

        if path.exists() {
            log4rs::init_file(path, Deserializers::default()).expect("Failed to load external log4rs.yml");
            info!(path = config_path; "Logging initialized from external configuration");
            return;
        }

        let yaml_content = include_str!("../../resources/test_log4rs.yml");
        let raw_config: RawConfig = serde_yaml::from_str(yaml_content).expect("Test logging configuration is invalid YAML");

        let (appenders, errors) = raw_config.appenders_lossy(&Deserializers::default());
        if !errors.is_empty() {
            panic!("Errors parsing test appenders: {:?}", errors);
        }

        let config = log4rs::Config::builder()
            .appenders(appenders)
            .loggers(raw_config.loggers())
            .build(raw_config.root())
            .expect("Failed to build logging config");

        log4rs::init_config(config).expect("Failed to initialize test logging");

        debug!("Logging initialized from bundled test configuration");
    });
}
