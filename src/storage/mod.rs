//! Local persistence: typed records over JSON tables, a read-only view, and
//! serialized derived writers.
//!
//! Reads go through [`ViewStorage`]. Writes are staged inside a
//! [`DerivedStorage`] (a single-writer actor holding a pending
//! [`Changeset`]) and become visible only when
//! [`StorageManager::save_derived`] commits the whole batch.

mod backend;
mod writer;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use writer::{DerivedStorage, WriteContext};

use crate::error::StorageError;
use writer::{WriterConfig, spawn_writer};

/// In-memory form of every table: entity name -> record id -> record JSON.
pub type Tables = BTreeMap<String, BTreeMap<String, Value>>;

/// Default idle timeout for derived writers: 5 minutes.
pub(crate) const DEFAULT_WRITER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// A locally persisted entity, identity-keyed by its remote identifier.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name for this entity type.
    const ENTITY: &'static str;

    /// The remote identifier, rendered as a string key.
    fn record_id(&self) -> String;
}

/// Staged changes for one table.
#[derive(Debug, Clone, Default)]
struct TableChanges {
    cleared: bool,
    upserts: BTreeMap<String, Value>,
    deletes: BTreeSet<String>,
}

/// How a staged changeset sees one record.
pub(crate) enum Staged<'a> {
    Written(&'a Value),
    Removed,
    Untouched,
}

/// A batch of staged writes across tables, committed atomically.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    tables: BTreeMap<String, TableChanges>,
}

/// Row counts produced by committing a [`Changeset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl Changeset {
    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.tables
            .values()
            .all(|t| !t.cleared && t.upserts.is_empty() && t.deletes.is_empty())
    }

    /// Number of staged upserts and deletes (a clear counts once).
    pub fn len(&self) -> usize {
        self.tables
            .values()
            .map(|t| usize::from(t.cleared) + t.upserts.len() + t.deletes.len())
            .sum()
    }

    /// Entity names touched by this changeset.
    pub fn entity_types(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    fn table_mut(&mut self, entity: &str) -> &mut TableChanges {
        self.tables.entry(entity.to_owned()).or_default()
    }

    pub(crate) fn upsert(&mut self, entity: &str, id: String, value: Value) {
        let table = self.table_mut(entity);
        table.deletes.remove(&id);
        table.upserts.insert(id, value);
    }

    pub(crate) fn delete(&mut self, entity: &str, id: &str) {
        let table = self.table_mut(entity);
        table.upserts.remove(id);
        table.deletes.insert(id.to_owned());
    }

    pub(crate) fn clear(&mut self, entity: &str) {
        let table = self.table_mut(entity);
        table.cleared = true;
        table.upserts.clear();
        table.deletes.clear();
    }

    /// Staged upserts for `entity`, ordered by id.
    pub(crate) fn upserts(&self, entity: &str) -> impl Iterator<Item = (&String, &Value)> {
        self.tables
            .get(entity)
            .into_iter()
            .flat_map(|table| table.upserts.iter())
    }

    pub(crate) fn lookup(&self, entity: &str, id: &str) -> Staged<'_> {
        let Some(table) = self.tables.get(entity) else {
            return Staged::Untouched;
        };
        if let Some(value) = table.upserts.get(id) {
            Staged::Written(value)
        } else if table.cleared || table.deletes.contains(id) {
            Staged::Removed
        } else {
            Staged::Untouched
        }
    }

    /// Apply the changeset to `tables` in place.
    ///
    /// Per table: a clear runs first, then deletes, then upserts.
    pub fn apply_to(&self, tables: &mut Tables) -> CommitSummary {
        let mut summary = CommitSummary::default();
        for (entity, changes) in &self.tables {
            let table = tables.entry(entity.clone()).or_default();
            if changes.cleared {
                summary.deleted += table.len();
                table.clear();
            }
            for id in &changes.deletes {
                if table.remove(id).is_some() {
                    summary.deleted += 1;
                }
            }
            for (id, value) in &changes.upserts {
                if table.insert(id.clone(), value.clone()).is_some() {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }
        summary
    }
}

/// Read-only access to committed records.
#[derive(Clone)]
pub struct ViewStorage {
    backend: Arc<dyn StorageBackend>,
}

impl ViewStorage {
    /// Load one record by its remote identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored JSON no longer
    /// matches `R`, or a backend error.
    pub fn load<R: Record>(&self, id: &str) -> Result<Option<R>, StorageError> {
        self.backend
            .get(R::ENTITY, id)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StorageError::from)
    }

    /// All committed records of type `R`, ordered by identifier string.
    pub fn all<R: Record>(&self) -> Result<Vec<R>, StorageError> {
        self.backend
            .list(R::ENTITY)?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(StorageError::from))
            .collect()
    }

    /// Number of committed records of type `R`.
    pub fn count<R: Record>(&self) -> Result<usize, StorageError> {
        Ok(self.backend.list(R::ENTITY)?.len())
    }
}

impl std::fmt::Debug for ViewStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewStorage").finish_non_exhaustive()
    }
}

/// Entry point to local persistence.
///
/// `Clone` is cheap: the backend is `Arc`-wrapped.
#[derive(Clone)]
pub struct StorageManager {
    backend: Arc<dyn StorageBackend>,
    writer_idle_timeout: Duration,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("writer_idle_timeout", &self.writer_idle_timeout)
            .finish_non_exhaustive()
    }
}

impl StorageManager {
    /// Wrap an existing backend.
    pub fn new(backend: impl StorageBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            writer_idle_timeout: DEFAULT_WRITER_IDLE_TIMEOUT,
        }
    }

    /// Volatile storage, lost when the process exits.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    /// File-backed storage rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created or
    /// an existing table cannot be read.
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self::new(FileBackend::open(dir)?))
    }

    /// Set how long a derived writer may sit idle before its thread exits.
    pub fn with_writer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.writer_idle_timeout = timeout;
        self
    }

    /// Read-only view over committed records.
    pub fn view_storage(&self) -> ViewStorage {
        ViewStorage {
            backend: Arc::clone(&self.backend),
        }
    }

    /// Spawn a new derived writer with an empty pending changeset.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the writer thread cannot be started.
    pub fn writer_derived_storage(&self) -> Result<DerivedStorage, StorageError> {
        let config = WriterConfig {
            idle_timeout: self.writer_idle_timeout,
        };
        spawn_writer(Arc::clone(&self.backend), config)
    }

    /// Commit everything staged in `derived`, by any job, as one batch.
    ///
    /// Returns once the commit is visible through [`view_storage`](Self::view_storage).
    /// On failure the staged batch is discarded.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or [`StorageError::WriterGone`] if the
    /// writer thread has exited.
    pub async fn save_derived(
        &self,
        derived: &DerivedStorage,
    ) -> Result<CommitSummary, StorageError> {
        let summary = derived.save().await?;
        tracing::debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "derived storage saved"
        );
        Ok(summary)
    }

    /// Remove every record from every table.
    pub fn reset(&self) -> Result<(), StorageError> {
        self.backend.reset()
    }
}
