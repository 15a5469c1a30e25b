//! Data-source adapter contract
//!
//! Data clients feed the aggregator with parsed route definitions: a
//! full load at startup and incremental deltas on every poll tick.
//! Adapters are assumed to be independently failure-prone; the error
//! kind tells the aggregator whether to retry or disable the source.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use wayline_core::definition::RouteDefinition;
use wayline_core::error::DataClientError;

/// An incremental update: routes created or changed since the last
/// call, and identifiers deleted since the last call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteUpdate {
    /// New or changed route definitions
    pub upserts: Vec<RouteDefinition>,
    /// Identifiers of deleted routes
    pub deleted_ids: Vec<String>,
}

impl RouteUpdate {
    /// Whether the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deleted_ids.is_empty()
    }
}

/// A source of route definitions.
///
/// `load_update` reports deltas since the previous call, so states
/// between two polls may be coalesced by the source.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Returns the full current set of route definitions.
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError>;

    /// Returns the changes since the previous call.
    async fn load_update(&self) -> Result<RouteUpdate, DataClientError>;
}

/// A fixed in-memory route set. Updates are always empty.
pub struct StaticDataClient {
    routes: Vec<RouteDefinition>,
}

impl StaticDataClient {
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl DataClient for StaticDataClient {
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
        Ok(self.routes.clone())
    }

    async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
        Ok(RouteUpdate::default())
    }
}

/// Reads route definitions from a YAML file (a list of definitions).
///
/// `load_update` re-reads the file and reports the difference against
/// the previously observed content. I/O failures are transient; a
/// malformed file is fatal on the initial load but transient on
/// updates, since the file may be observed mid-write.
pub struct FileDataClient {
    path: PathBuf,
    last: Mutex<HashMap<String, RouteDefinition>>,
}

impl FileDataClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: Mutex::new(HashMap::new()),
        }
    }

    async fn read(&self, initial: bool) -> Result<Vec<RouteDefinition>, DataClientError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DataClientError::transient(format!("{}: {}", self.path.display(), e)))?;

        serde_yaml::from_str(&content).map_err(|e| {
            let reason = format!("{}: {}", self.path.display(), e);
            if initial {
                DataClientError::fatal(reason)
            } else {
                DataClientError::transient(reason)
            }
        })
    }
}

#[async_trait]
impl DataClient for FileDataClient {
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
        let mut routes = self.read(true).await?;
        routes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut last = self.last.lock().expect("file client state poisoned");
        *last = routes.iter().map(|r| (r.id.clone(), r.clone())).collect();

        Ok(routes)
    }

    async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
        let routes = self.read(false).await?;
        let current: HashMap<String, RouteDefinition> =
            routes.into_iter().map(|r| (r.id.clone(), r)).collect();

        let mut last = self.last.lock().expect("file client state poisoned");

        let mut update = RouteUpdate::default();
        for (id, def) in &current {
            if last.get(id) != Some(def) {
                update.upserts.push(def.clone());
            }
        }
        for id in last.keys() {
            if !current.contains_key(id) {
                update.deleted_ids.push(id.clone());
            }
        }
        update.upserts.sort_by(|a, b| a.id.cmp(&b.id));
        update.deleted_ids.sort();

        *last = current;
        Ok(update)
    }
}
