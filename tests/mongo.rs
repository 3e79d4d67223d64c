use std::path::Path;

use cucumber::World;
use mongosteps::{Manager, MongoSteps, clean_up_after_scenario, load_configuration};

mod support;

use support::{FEATURES_DIR, FIXTURES_DIR, MongoStepsWorld};

#[tokio::main]
async fn main() {
    if std::env::var_os("MONGOSTEPS__URI").is_none() {
        eprintln!("MONGOSTEPS__URI is not set, skipping the MongoDB suite");
        return;
    }

    support::init_logging();

    let mut config = load_configuration(Some(Path::new("config/mongosteps.toml"))).expect("Invalid test configuration");
    config.working_dir.get_or_insert_with(|| FIXTURES_DIR.into());

    let manager = Manager::connect(&config).await.expect("Could not connect to MongoDB");
    manager.clean_up().await.expect("Could not clean up before the run");
    support::install_manager(manager);

    MongoStepsWorld::cucumber()
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .mongo_steps()
        .after(clean_up_after_scenario::<MongoStepsWorld>)
        .run_and_exit(FEATURES_DIR)
        .await;
}
