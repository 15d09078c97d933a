//! Storage backends: where committed tables live.
//!
//! [`FileBackend`] keeps one JSON file per table at
//! `<dir>/tables/<entity>.json`. Writes go to a temporary file that is
//! then renamed over the table file, so readers never see a partially
//! written table.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

use super::{Changeset, CommitSummary, Tables};
use crate::error::StorageError;

/// Committed-table store behind a [`StorageManager`](super::StorageManager).
///
/// `commit` must apply the whole changeset or none of it.
pub trait StorageBackend: Send + Sync + 'static {
    /// Fetch one record's JSON.
    fn get(&self, entity: &str, id: &str) -> Result<Option<Value>, StorageError>;

    /// Every record of a table, ordered by id.
    fn list(&self, entity: &str) -> Result<Vec<Value>, StorageError>;

    /// Apply a staged changeset.
    fn commit(&self, changes: &Changeset) -> Result<CommitSummary, StorageError>;

    /// Drop every table.
    fn reset(&self) -> Result<(), StorageError>;
}

/// Volatile backend holding all tables in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl StorageBackend for MemoryBackend {
    fn get(&self, entity: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.get(entity).and_then(|t| t.get(id)).cloned())
    }

    fn list(&self, entity: &str) -> Result<Vec<Value>, StorageError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .get(entity)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    fn commit(&self, changes: &Changeset) -> Result<CommitSummary, StorageError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        Ok(changes.apply_to(&mut tables))
    }

    fn reset(&self) -> Result<(), StorageError> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// Durable backend: an in-memory cache mirrored to one JSON file per table.
#[derive(Debug)]
pub struct FileBackend {
    tables_dir: PathBuf,
    tables: RwLock<Tables>,
}

impl FileBackend {
    /// Open (or create) a file backend rooted at `dir`.
    ///
    /// Existing tables are loaded eagerly. A table file that is not valid
    /// JSON is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created or
    /// listed, or a table file cannot be read.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let tables_dir = dir.as_ref().join("tables");
        std::fs::create_dir_all(&tables_dir)?;

        let mut tables = Tables::new();
        for entry in std::fs::read_dir(&tables_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(entity) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = std::fs::read(&path)?;
            match serde_json::from_slice(&bytes) {
                Ok(table) => {
                    tables.insert(entity.to_owned(), table);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to deserialize table; treating as empty"
                    );
                }
            }
        }

        Ok(Self {
            tables_dir,
            tables: RwLock::new(tables),
        })
    }

    fn table_path(&self, entity: &str) -> PathBuf {
        self.tables_dir.join(format!("{entity}.json"))
    }

    /// Atomically replace one table file.
    fn write_table(&self, entity: &str, tables: &Tables) -> io::Result<()> {
        let path = self.table_path(entity);
        let tmp_path = path.with_extension("json.tmp");
        let empty = Default::default();
        let table = tables.get(entity).unwrap_or(&empty);
        let json = serde_json::to_vec_pretty(table)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, entity: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.get(entity).and_then(|t| t.get(id)).cloned())
    }

    fn list(&self, entity: &str) -> Result<Vec<Value>, StorageError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .get(entity)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    fn commit(&self, changes: &Changeset) -> Result<CommitSummary, StorageError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);

        // Stage on a copy so a failed write leaves the cache untouched.
        let mut next = tables.clone();
        let summary = changes.apply_to(&mut next);
        for entity in changes.entity_types() {
            self.write_table(entity, &next)?;
        }

        *tables = next;
        Ok(summary)
    }

    /// Remove every table file on disk, including ones that were skipped
    /// as unreadable at open, along with leftover temp files.
    fn reset(&self) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        for entry in std::fs::read_dir(&self.tables_dir)? {
            let path = entry?.path();
            if !matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("json" | "tmp")
            ) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        tables.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn upsert(entity: &str, id: &str, value: Value) -> Changeset {
        let mut changes = Changeset::default();
        changes.upsert(entity, id.to_owned(), value);
        changes
    }

    #[test]
    fn memory_commit_then_get() {
        let backend = MemoryBackend::default();
        backend
            .commit(&upsert("widget", "1", json!({"id": 1})))
            .expect("commit should succeed");
        assert_eq!(
            backend.get("widget", "1").unwrap(),
            Some(json!({"id": 1}))
        );
        assert_eq!(backend.get("widget", "2").unwrap(), None);
        assert_eq!(backend.list("other").unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn file_backend_survives_reopen() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        {
            let backend = FileBackend::open(tmp.path()).expect("open should succeed");
            backend
                .commit(&upsert("widget", "1", json!({"id": 1, "name": "one"})))
                .expect("commit should succeed");
        }

        let reopened = FileBackend::open(tmp.path()).expect("reopen should succeed");
        assert_eq!(
            reopened.get("widget", "1").unwrap(),
            Some(json!({"id": 1, "name": "one"}))
        );
    }

    #[test]
    fn file_backend_leaves_no_temp_file() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let backend = FileBackend::open(tmp.path()).expect("open should succeed");
        backend
            .commit(&upsert("widget", "1", json!({"id": 1})))
            .expect("commit should succeed");

        let final_path = tmp.path().join("tables/widget.json");
        assert!(final_path.exists(), "table file should exist");
        assert!(
            !final_path.with_extension("json.tmp").exists(),
            "temp file should not exist after commit"
        );
    }

    #[test]
    fn corrupt_table_is_treated_as_empty() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let tables_dir = tmp.path().join("tables");
        std::fs::create_dir_all(&tables_dir).expect("create dir");
        std::fs::write(tables_dir.join("widget.json"), b"not json!!!").expect("write");

        let backend = FileBackend::open(tmp.path()).expect("open should succeed");
        assert!(backend.list("widget").unwrap().is_empty());
    }

    #[test]
    fn file_reset_removes_table_files() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let backend = FileBackend::open(tmp.path()).expect("open should succeed");
        backend
            .commit(&upsert("widget", "1", json!({"id": 1})))
            .expect("commit should succeed");

        backend.reset().expect("reset should succeed");
        assert!(!tmp.path().join("tables/widget.json").exists());
        assert!(backend.list("widget").unwrap().is_empty());

        let reopened = FileBackend::open(tmp.path()).expect("reopen should succeed");
        assert!(reopened.list("widget").unwrap().is_empty());
    }

    #[test]
    fn file_reset_removes_unreadable_tables_too() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let tables_dir = tmp.path().join("tables");
        std::fs::create_dir_all(&tables_dir).expect("create dir");
        std::fs::write(tables_dir.join("gadget.json"), b"{ truncated").expect("write");
        std::fs::write(tables_dir.join("widget.json.tmp"), b"{}").expect("write");

        let backend = FileBackend::open(tmp.path()).expect("open should succeed");
        backend.reset().expect("reset should succeed");

        assert!(!tables_dir.join("gadget.json").exists());
        assert!(!tables_dir.join("widget.json.tmp").exists());
    }
}
