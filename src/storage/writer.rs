//! Derived-storage writer: a single-writer actor per store.
//!
//! The writer runs on a dedicated thread and processes messages from an
//! `mpsc` channel one at a time. It exclusively owns the pending
//! [`Changeset`] for its store, so two syncs of the same entity type can
//! never interleave their staged writes. Nothing staged is visible to
//! readers until a `Save` message commits the batch to the backend.
//!
//! Public API: [`DerivedStorage`] (cloneable async handle) and
//! [`WriteContext`] (what `perform` closures operate on).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::{Changeset, CommitSummary, Record, Staged, StorageBackend};
use crate::error::StorageError;

/// Configuration for the writer loop.
pub(crate) struct WriterConfig {
    /// How long the writer waits for a message before shutting down.
    pub idle_timeout: Duration,
}

/// A unit of staged work. The closure sends its own result back.
type Job = Box<dyn FnOnce(&mut WriteContext) + Send>;

/// Messages sent from `DerivedStorage` to the writer loop.
pub(crate) enum WriterMessage {
    /// Run a closure against the pending changeset.
    Perform { job: Job },

    /// Commit the pending changeset to the backend.
    Save {
        reply: oneshot::Sender<Result<CommitSummary, StorageError>>,
    },

    /// Stop the writer, discarding anything not yet saved.
    #[cfg(test)]
    Shutdown,
}

/// The writer's view of storage inside a `perform` closure.
///
/// Reads see staged writes first, then committed records.
pub struct WriteContext {
    backend: Arc<dyn StorageBackend>,
    pending: Changeset,
}

impl WriteContext {
    /// Load a record, honoring writes staged in this context.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored JSON no longer
    /// matches `R`, or a backend error.
    pub fn load<R: Record>(&self, id: &str) -> Result<Option<R>, StorageError> {
        let value = match self.pending.lookup(R::ENTITY, id) {
            Staged::Written(value) => Some(value.clone()),
            Staged::Removed => None,
            Staged::Untouched => self.backend.get(R::ENTITY, id)?,
        };
        Ok(value.map(serde_json::from_value).transpose()?)
    }

    /// Every record of type `R` as this context sees it: committed rows
    /// overlaid with staged writes, ordered by identifier string.
    pub fn all<R: Record>(&self) -> Result<Vec<R>, StorageError> {
        let mut merged = BTreeMap::new();
        for value in self.backend.list(R::ENTITY)? {
            let record: R = serde_json::from_value(value)?;
            let id = record.record_id();
            if matches!(self.pending.lookup(R::ENTITY, &id), Staged::Untouched) {
                merged.insert(id, record);
            }
        }
        for (id, value) in self.pending.upserts(R::ENTITY) {
            merged.insert(id.clone(), serde_json::from_value(value.clone())?);
        }
        Ok(merged.into_values().collect())
    }

    /// Stage an insert-or-replace of `record` under its own id.
    pub fn upsert<R: Record>(&mut self, record: &R) -> Result<(), StorageError> {
        let value = serde_json::to_value(record)?;
        self.pending.upsert(R::ENTITY, record.record_id(), value);
        Ok(())
    }

    /// Stage removal of one record.
    pub fn delete<R: Record>(&mut self, id: &str) {
        self.pending.delete(R::ENTITY, id);
    }

    /// Stage removal of every record of type `R`, including committed ones.
    pub fn delete_all<R: Record>(&mut self) {
        self.pending.clear(R::ENTITY);
    }

    /// Number of staged operations not yet saved.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Run `job`, then commit what is staged as one batch before the
    /// writer takes its next message.
    ///
    /// If `job` fails, everything it staged is discarded and nothing is
    /// committed. The caller therefore sees the outcome of its own batch.
    pub(crate) fn stage_and_commit<T>(
        &mut self,
        job: impl FnOnce(&mut Self) -> Result<T, StorageError>,
    ) -> Result<(T, CommitSummary), StorageError> {
        match job(self) {
            Ok(value) => Ok((value, self.commit()?)),
            Err(e) => {
                self.pending = Changeset::default();
                Err(e)
            }
        }
    }

    fn commit(&mut self) -> Result<CommitSummary, StorageError> {
        // A failed commit discards the batch.
        let changes = std::mem::take(&mut self.pending);
        if changes.is_empty() {
            return Ok(CommitSummary::default());
        }
        let entities = changes.entity_types().join(",");
        let _span = tracing::debug_span!("commit", entity_types = %entities).entered();
        let result = self.backend.commit(&changes);
        if let Err(e) = &result {
            tracing::error!(error = %e, "derived storage commit failed");
        }
        result
    }
}

/// Runs the writer loop.
///
/// Exits when the channel closes (all handles dropped), a `Shutdown`
/// message arrives, or the idle timeout elapses.
fn run_writer(
    rt: tokio::runtime::Runtime,
    mut ctx: WriteContext,
    mut rx: mpsc::Receiver<WriterMessage>,
    config: WriterConfig,
) {
    loop {
        // Create the timeout future inside `block_on` so the timer
        // registers with this thread's runtime.
        let idle_timeout = config.idle_timeout;
        let msg = rt.block_on(async { tokio::time::timeout(idle_timeout, rx.recv()).await });

        match msg {
            Ok(Some(WriterMessage::Perform { job })) => job(&mut ctx),
            Ok(Some(WriterMessage::Save { reply })) => {
                // The caller may have stopped waiting; nothing to do then.
                let _ = reply.send(ctx.commit());
            }
            #[cfg(test)]
            Ok(Some(WriterMessage::Shutdown)) => break,
            Ok(None) => break,
            Err(_elapsed) => {
                tracing::info!(
                    pending = ctx.pending_count(),
                    "derived storage writer idle, shutting down"
                );
                break;
            }
        }
    }
}

/// Async handle to a derived-storage writer.
///
/// Cheap to clone; all clones feed the same serialized writer.
#[derive(Debug, Clone)]
pub struct DerivedStorage {
    sender: mpsc::Sender<WriterMessage>,
}

impl std::fmt::Debug for WriterMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Perform { .. } => f.write_str("Perform"),
            Self::Save { .. } => f.write_str("Save"),
            #[cfg(test)]
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl DerivedStorage {
    /// Run `f` on the writer thread, after every previously queued job.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::WriterGone`] if the writer has exited or
    /// `f` panicked.
    pub async fn perform<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut WriteContext) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |ctx| {
            let _ = tx.send(f(ctx));
        });
        self.sender
            .send(WriterMessage::Perform { job })
            .await
            .map_err(|_| StorageError::WriterGone)?;
        rx.await.map_err(|_| StorageError::WriterGone)
    }

    /// Commit the pending changeset.
    ///
    /// Crate-internal: callers go through
    /// [`StorageManager::save_derived`](super::StorageManager::save_derived).
    pub(crate) async fn save(&self) -> Result<CommitSummary, StorageError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Save { reply: tx })
            .await
            .map_err(|_| StorageError::WriterGone)?;
        rx.await.map_err(|_| StorageError::WriterGone)?
    }

    /// Whether the writer thread is still running.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    #[cfg(test)]
    pub(crate) async fn shutdown(&self) {
        let _ = self.sender.send(WriterMessage::Shutdown).await;
    }
}

/// Spawn a writer thread over `backend`.
///
/// # Errors
///
/// Returns `StorageError::Io` if the writer's runtime cannot be built.
pub(crate) fn spawn_writer(
    backend: Arc<dyn StorageBackend>,
    config: WriterConfig,
) -> Result<DerivedStorage, StorageError> {
    // The writer needs timers for idle eviction even when the caller runs
    // on a current-thread runtime, so it drives its own.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let (tx, rx) = mpsc::channel::<WriterMessage>(32);
    let ctx = WriteContext {
        backend,
        pending: Changeset::default(),
    };

    std::thread::spawn(move || run_writer(rt, ctx, rx, config));

    Ok(DerivedStorage { sender: tx })
}
