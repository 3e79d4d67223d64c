use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use bson::{Document, doc};
use log::{debug, info};

use crate::{
    config::ManagerConfig,
    convert::{parse_documents, parse_documents_payload, parse_filter, serialize_documents},
    database::Database,
    diff::assert_json_equal,
    error::{AssertionError, StepError, StepResult},
};

/// Alias used when scenario text does not name a database.
pub const DEFAULT_DATABASE: &str = "default";

/// Registry of databases addressed by scenario text, and the operations behind every step.
#[derive(Debug, Clone, Default)]
pub struct Manager {
    databases: HashMap<String, Database>,
    working_dir: Option<PathBuf>,
}

/// Builder for a [`Manager`].
///
/// # Example
///
/// ```no_run
/// use mongosteps::{Database, Manager, MemoryStore};
///
/// let manager = Manager::builder()
///     .default_database(Database::new(MemoryStore::new()).clean_up_after_scenario(["customer"]))
///     .working_dir("tests/fixtures")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ManagerBuilder {
    databases: HashMap<String, Database>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ManagerBuilder {
    /// Registers the database used when scenario text omits `of database "<name>"`.
    pub fn default_database(self, database: Database) -> Self {
        self.database(DEFAULT_DATABASE, database)
    }

    /// Registers a database under an alias, replacing any previous registration.
    pub fn database(mut self, name: impl Into<String>, database: Database) -> Self {
        self.databases.insert(name.into(), database);
        self
    }

    /// Directory relative fixture paths are resolved against.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Timeout applied to every database registered without one.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Manager {
        let timeout = self.timeout;
        let databases = self
            .databases
            .into_iter()
            .map(|(name, db)| match timeout {
                Some(timeout) if !db.has_timeout() => (name, db.operation_timeout(timeout)),
                _ => (name, db),
            })
            .collect();

        Manager {
            databases,
            working_dir: self.working_dir,
        }
    }
}

impl Manager {
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }

    /// Connects to the configured server and registers each configured database.
    pub async fn connect(config: &ManagerConfig) -> anyhow::Result<Self> {
        let client = mongodb::Client::with_uri_str(&config.uri)
            .await
            .context("Could not create mongo client")?;

        let mut builder = Self::builder();
        for (alias, db_config) in &config.databases {
            let database = Database::new(client.database(&db_config.name))
                .clean_up_after_scenario(db_config.clean_up_after_scenario.iter().cloned());
            builder = builder.database(alias.as_str(), database);
        }
        if let Some(dir) = &config.working_dir {
            builder = builder.working_dir(dir);
        }
        if let Some(timeout) = config.operation_timeout() {
            builder = builder.operation_timeout(timeout);
        }

        info!(databases = config.databases.len(); "Connected mongo step manager");
        Ok(builder.build())
    }

    /// Looks up a registered database by alias.
    pub fn database(&self, name: &str) -> StepResult<&Database> {
        self.databases
            .get(name)
            .ok_or_else(|| StepError::UnregisteredDatabase(name.to_string()))
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub async fn truncate_collection(&self, collection: &str, database: &str) -> StepResult<()> {
        self.database(database)?.truncate(collection).await?;
        Ok(())
    }

    /// Inserts the documents of a doc string payload.
    pub async fn store_documents(&self, collection: &str, database: &str, payload: Option<&str>) -> StepResult<()> {
        let db = self.database(database)?;
        let docs = parse_documents_payload(payload).map_err(StepError::parse("documents"))?;

        db.store(collection, docs).await?;
        Ok(())
    }

    /// Inserts the documents of a fixture file.
    pub async fn store_documents_from_file(&self, path: &str, collection: &str, database: &str) -> StepResult<()> {
        let db = self.database(database)?;
        let text = self.read_file(path).await?;
        let docs = parse_documents(&text).map_err(StepError::parse("documents"))?;

        db.store(collection, docs).await?;
        Ok(())
    }

    /// Finds every document matching the filter, sorted by `_id`.
    pub async fn search(&self, collection: &str, database: &str, filter: Option<&str>) -> StepResult<Vec<Document>> {
        let db = self.database(database)?;
        let filter = parse_filter(filter).map_err(StepError::parse("filter"))?;

        Ok(db.find(collection, filter, Some(doc! { "_id": 1 }), None).await?)
    }

    pub async fn assert_no_documents(&self, collection: &str, database: &str) -> StepResult<()> {
        let actual = self.database(database)?.count(collection, Document::new()).await?;
        if actual != 0 {
            return Err(AssertionError::NotEmpty {
                collection: collection.to_string(),
                actual,
            }
            .into());
        }
        Ok(())
    }

    pub async fn assert_document_count(&self, expected: u64, collection: &str, database: &str) -> StepResult<()> {
        let actual = self.database(database)?.count(collection, Document::new()).await?;
        if actual != expected {
            return Err(AssertionError::CountMismatch {
                collection: collection.to_string(),
                actual,
                expected,
            }
            .into());
        }
        Ok(())
    }

    /// Asserts the collection holds exactly the payload's documents.
    pub async fn assert_only_documents(&self, collection: &str, database: &str, payload: Option<&str>) -> StepResult<()> {
        let db = self.database(database)?;
        let expected = parse_documents_payload(payload).map_err(StepError::parse("expected documents"))?;

        self.assert_collection_equals(db, collection, &expected).await
    }

    /// Asserts the collection holds exactly the documents of a fixture file.
    ///
    /// The file is read before the database is resolved.
    pub async fn assert_only_documents_from_file(&self, path: &str, collection: &str, database: &str) -> StepResult<()> {
        let text = self.read_file(path).await?;
        let db = self.database(database)?;
        let expected = parse_documents(&text).map_err(StepError::parse("expected documents"))?;

        self.assert_collection_equals(db, collection, &expected).await
    }

    pub fn assert_search_result_count(&self, result: Option<&[Document]>, expected: usize) -> StepResult<()> {
        let result = result.ok_or(AssertionError::NoSearchResult)?;
        if result.len() != expected {
            return Err(AssertionError::ResultCountMismatch {
                actual: result.len(),
                expected,
            }
            .into());
        }
        Ok(())
    }

    pub fn assert_search_result(&self, result: Option<&[Document]>, payload: Option<&str>) -> StepResult<()> {
        let result = result.ok_or(AssertionError::NoSearchResult)?;
        let expected = parse_documents_payload(payload).map_err(StepError::parse("expected documents"))?;

        assert_json_equal(&serialize_documents(&expected), &serialize_documents(result))?;
        Ok(())
    }

    /// Truncates the clean-up collections of every database, in alias order.
    pub async fn clean_up(&self) -> StepResult<()> {
        let mut names: Vec<&String> = self.databases.keys().collect();
        names.sort();

        for name in names {
            debug!(database = name.as_str(); "Cleaning up database");
            self.databases[name].clean_up().await?;
        }
        Ok(())
    }

    async fn assert_collection_equals(&self, db: &Database, collection: &str, expected: &[Document]) -> StepResult<()> {
        let actual = db
            .find(collection, Document::new(), Some(doc! { "_id": 1 }), None)
            .await?;

        assert_json_equal(&serialize_documents(expected), &serialize_documents(&actual))?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> StepResult<String> {
        let path = self.resolve_path(path);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| StepError::FileRead { path, source })
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.working_dir {
            Some(dir) if path.is_relative() => clean_path(&dir.join(path)),
            _ => clean_path(path),
        }
    }
}

/// Lexically normalises a path: drops `.` segments and folds `..` into its parent.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                let can_pop = matches!(cleaned.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    cleaned.pop();
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            },
            other => cleaned.push(other.as_os_str()),
        }
    }

    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}
