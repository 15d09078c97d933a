//! Stores: one per domain, each handling a single action family.
//!
//! A store receives actions synchronously from the dispatcher, moves the
//! work onto the runtime captured in its [`StoreContext`], performs one
//! remote call, optionally upserts the result through its derived writer,
//! and resolves the action's completion only after the commit returns.

mod account;
mod account_creation;
mod event;
mod event_category;
mod google_place;
mod jetpack;
mod notification;
mod site_discovery;
mod support;
mod system_status;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::Instrument;

pub use account::AccountStore;
pub use account_creation::AccountCreationStore;
pub use event::EventStore;
pub use event_category::EventCategoryStore;
pub use google_place::GooglePlaceStore;
pub use jetpack::JetpackConnectionStore;
pub use notification::NotificationStore;
pub use site_discovery::SiteDiscoveryStore;
pub use support::SupportStore;
pub use system_status::SystemStatusStore;

use crate::action::{Action, ActionKind};
use crate::dispatcher::{ActionsProcessor, Dispatcher};
use crate::error::{StorageError, StoreError};
use crate::records::SyncedRecord;
use crate::remote::Remote;
use crate::storage::{DerivedStorage, StorageManager, WriteContext};

/// A component that owns one domain's actions.
pub trait Store: ActionsProcessor {
    /// The action family this store handles.
    fn action_kind(&self) -> ActionKind;

    /// Register this store with `dispatcher` for its action family.
    fn register_supported_actions(self: Arc<Self>, dispatcher: &mut Dispatcher)
    where
        Self: Sized,
    {
        let kind = self.action_kind();
        dispatcher.register(self, kind);
    }
}

/// Collaborators shared by every store of a state.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub remote: Remote,
    pub storage: StorageManager,
    /// Runtime that store work is spawned on.
    pub runtime: tokio::runtime::Handle,
    lifecycle: Lifecycle,
}

impl StoreContext {
    pub fn new(remote: Remote, storage: StorageManager, runtime: tokio::runtime::Handle) -> Self {
        Self {
            remote,
            storage,
            runtime,
            lifecycle: Lifecycle::new(),
        }
    }

    /// A copy with its own lifecycle, for the stores of one state.
    pub(crate) fn scoped(&self) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            ..self.clone()
        }
    }

    /// Cancel every task spawned through this context and refuse further
    /// commits. Returns once no commit of this context is in progress.
    pub(crate) fn close(&self) {
        self.lifecycle.close();
    }

    /// Run `work` on the store runtime, inside the caller's current span.
    ///
    /// The work is dropped unfinished if the context is closed first, which
    /// resolves any completion it holds to `Dropped`.
    pub(crate) fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let lifecycle = self.lifecycle.clone();
        let task = async move {
            tokio::select! {
                biased;
                () = lifecycle.closed() => tracing::debug!("store task cancelled"),
                () = work => {}
            }
        };
        self.runtime.spawn(task.in_current_span());
    }
}

/// Open/closed switch shared by the stores of one state.
#[derive(Debug, Clone)]
struct Lifecycle {
    /// Held for reading across each commit, for writing by `close`.
    gate: Arc<RwLock<bool>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Lifecycle {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            gate: Arc::new(RwLock::new(false)),
            cancel: Arc::new(cancel),
        }
    }

    fn close(&self) {
        // Cancel before shutting the gate, so a task refused by the gate
        // is already cancelled when it wakes.
        self.cancel.send_replace(true);
        *self.gate.write().unwrap_or_else(PoisonError::into_inner) = true;
    }

    async fn closed(&self) {
        let mut rx = self.cancel.subscribe();
        // The sender lives as long as `self`.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Run `f` unless closed. `close` waits for `f` to return.
    fn while_open<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let closed = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return None;
        }
        Some(f())
    }
}

/// Log and drop an action that reached a store outside its family.
///
/// The dispatcher routes by kind, so this only fires when a store is
/// invoked directly with the wrong action.
pub(crate) fn unexpected_action(expected: ActionKind, action: &Action) {
    tracing::error!(
        expected = %expected,
        received = %action.kind(),
        action = action.name(),
        "store received an action outside its family"
    );
    debug_assert!(
        false,
        "{expected} store received a {} action",
        action.kind()
    );
}

/// Lazily created derived writer owned by one store.
///
/// The writer is spawned on first use and reused for the lifetime of the
/// store. If it idled out, the next use spawns a fresh one.
pub(crate) struct WriterSlot {
    storage: StorageManager,
    lifecycle: Lifecycle,
    derived: Mutex<Option<DerivedStorage>>,
}

impl WriterSlot {
    pub(crate) fn new(ctx: &StoreContext) -> Self {
        Self {
            storage: ctx.storage.clone(),
            lifecycle: ctx.lifecycle.clone(),
            derived: Mutex::new(None),
        }
    }

    fn derived(&self) -> Result<DerivedStorage, StorageError> {
        let mut slot = self.derived.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(derived) = slot.as_ref()
            && derived.is_alive()
        {
            return Ok(derived.clone());
        }
        tracing::debug!("spawning derived writer");
        let derived = self.storage.writer_derived_storage()?;
        *slot = Some(derived.clone());
        Ok(derived)
    }

    /// Stage `job` and commit it as one writer message.
    ///
    /// Returns the job's value once its own batch is visible to readers.
    /// A failed job or commit leaves nothing of the batch behind, and a
    /// closed context commits nothing.
    pub(crate) async fn commit<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut WriteContext) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let derived = self.derived()?;
        let lifecycle = self.lifecycle.clone();
        let (value, summary) = derived
            .perform(move |ctx| {
                lifecycle
                    .while_open(|| ctx.stage_and_commit(job))
                    .unwrap_or(Err(StorageError::Closed))
            })
            .await??;
        tracing::debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "derived storage saved"
        );
        Ok(value)
    }
}

/// Upsert every remote snapshot in `remotes` into records of type `R`.
///
/// Each record is looked up by its remote id, or started blank, and then
/// overwritten field by field. Transient snapshots are skipped. With
/// `replace_existing`, every record of type `R` is staged for removal
/// first, so only this batch survives the commit.
///
/// Returns how many records were staged.
pub(crate) fn upsert_all<R, M>(
    ctx: &mut WriteContext,
    remotes: &[M],
    replace_existing: bool,
) -> Result<usize, StorageError>
where
    R: SyncedRecord<M>,
{
    if replace_existing {
        ctx.delete_all::<R>();
    }
    let mut staged = 0;
    for remote in remotes {
        if R::is_transient(remote) {
            continue;
        }
        let id = R::remote_id(remote);
        let mut record = ctx.load::<R>(&id)?.unwrap_or_default();
        record.update_with(remote);
        ctx.upsert(&record)?;
        staged += 1;
    }
    Ok(staged)
}
