//! Cucumber step definitions for seeding, querying and asserting MongoDB collections.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cucumber::World;
//! use mongosteps::{Database, Manager, MemoryStore, MongoSteps, MongoWorld, ScenarioContext, clean_up_after_scenario};
//!
//! #[derive(Debug, World)]
//! #[world(init = Self::new)]
//! struct AppWorld {
//!     mongo: ScenarioContext,
//! }
//!
//! impl AppWorld {
//!     fn new() -> Self {
//!         let manager = Manager::builder()
//!             .default_database(Database::new(MemoryStore::new()).clean_up_after_scenario(["customer"]))
//!             .build();
//!         Self {
//!             mongo: ScenarioContext::new(Arc::new(manager)),
//!         }
//!     }
//! }
//!
//! impl MongoWorld for AppWorld {
//!     fn mongo(&mut self) -> &mut ScenarioContext {
//!         &mut self.mongo
//!     }
//! }
//!
//! # async fn run() {
//! AppWorld::cucumber()
//!     .mongo_steps()
//!     .after(clean_up_after_scenario::<AppWorld>)
//!     .run("tests/features")
//!     .await;
//! # }
//! ```

pub mod config;
pub mod context;
pub mod convert;
pub mod database;
pub mod diff;
pub mod error;
pub mod manager;
pub mod steps;
pub mod store;

pub use crate::config::{DatabaseConfig, ManagerConfig, load_configuration};
pub use crate::context::{MongoWorld, ScenarioContext};
pub use crate::database::Database;
pub use crate::error::{AssertionError, DatabaseError, ParseError, StepError, StepResult, StoreError};
pub use crate::manager::{DEFAULT_DATABASE, Manager, ManagerBuilder};
pub use crate::steps::{MongoSteps, clean_up_after_scenario, step_definitions};
pub use crate::store::{DocumentStore, FindQuery, MemoryStore};
