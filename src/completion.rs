//! Reply slots carried by actions.
//!
//! A [`Completion`] travels inside an action and is resolved by the store
//! that handles it. The caller keeps the matching [`Pending`] and awaits
//! it. Clones of a `Completion` share one slot, so when an action fans out
//! to several stores only the first answer reaches the caller.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{DispatchError, StoreError};

type Slot<T> = Arc<Mutex<Option<oneshot::Sender<Result<T, StoreError>>>>>;

/// Store-side half of an action's reply channel.
pub struct Completion<T> {
    slot: Slot<T>,
}

// Manual `Clone` so that `T` need not be `Clone`.
impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<T> Completion<T> {
    /// Create a linked `Completion` / [`Pending`] pair.
    pub fn channel() -> (Self, Pending<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            Pending { rx },
        )
    }

    /// Resolve the action with `result`.
    ///
    /// Returns `true` if this call delivered the result. Returns `false`
    /// if the completion was already resolved or the caller dropped its
    /// [`Pending`].
    pub fn complete(&self, result: Result<T, StoreError>) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Resolve the action successfully.
    pub fn succeed(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Resolve the action with an error.
    pub fn fail(&self, err: impl Into<StoreError>) -> bool {
        self.complete(Err(err.into()))
    }

    /// Whether some clone of this completion has already been resolved.
    pub fn is_completed(&self) -> bool {
        match self.slot.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

/// Caller-side half of an action's reply channel.
///
/// Resolves to the store's answer, or to [`DispatchError::Dropped`] if
/// every [`Completion`] clone was dropped without answering.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, StoreError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, DispatchError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| match received {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(DispatchError::Store(err)),
                Err(_) => Err(DispatchError::Dropped),
            })
    }
}
