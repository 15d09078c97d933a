//! Top-level entry point: owns the active state and switches it on
//! sign-in and sign-out.
//!
//! The manager is opened via [`StoresManagerBuilder`]. Dispatch always
//! goes to the state that is active at the moment
//! [`dispatch`](StoresManager::dispatch) is called; nothing is queued
//! across a transition.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::action::Action;
use crate::error::ManagerError;
use crate::network::{BearerToken, HttpNetwork, Network, NetworkConfig};
use crate::remote::{AuthFailure, Remote};
use crate::session::{Credentials, Session};
use crate::state::{AuthenticatedState, DeauthenticatedState, StateKind, StoresState};
use crate::storage::{StorageManager, ViewStorage};
use crate::stores::StoreContext;

/// Broadcast to subscribers whenever the session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    LoggedOut,
}

struct Inner {
    state: RwLock<StoresState>,
    ctx: StoreContext,
    session: Option<Session>,
    token: BearerToken,
    events: broadcast::Sender<SessionEvent>,
}

/// Routes actions to the stores of the active authentication state.
///
/// `Clone` is cheap; all clones share one state.
#[derive(Clone)]
pub struct StoresManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StoresManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoresManager")
            .field("state", &self.state_kind())
            .finish_non_exhaustive()
    }
}

impl StoresManager {
    pub fn builder() -> StoresManagerBuilder {
        StoresManagerBuilder::new()
    }

    /// Forward `action` to the active state's dispatcher.
    pub fn dispatch(&self, action: Action) {
        self.read_state().on_action(action);
    }

    /// Forward each action in order, all to the same state.
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = Action>) {
        let state = self.read_state();
        for action in actions {
            state.on_action(action);
        }
    }

    /// Sign in with `credentials`.
    ///
    /// Persists the credentials, points the bearer token at them, and
    /// replaces the active state with a fresh authenticated one, whatever
    /// the current state is.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Session`] if the credentials cannot be
    /// persisted. The active state is left unchanged in that case.
    pub fn authenticate(&self, credentials: Credentials) -> Result<(), ManagerError> {
        if let Some(session) = &self.inner.session {
            session.save(&credentials)?;
        }
        self.enter_authenticated(credentials);
        Ok(())
    }

    /// Sign out.
    ///
    /// Replaces the active state with a deauthenticated one, forgets the
    /// stored credentials and token, clears local storage, and broadcasts
    /// [`SessionEvent::LoggedOut`].
    ///
    /// # Errors
    ///
    /// Returns the first failure among clearing the session file and
    /// resetting storage. The state switch has already happened by then.
    pub fn deauthenticate(&self) -> Result<(), ManagerError> {
        let next = StoresState::Deauthenticated(DeauthenticatedState::new(&self.inner.ctx));
        self.swap(next);
        self.inner.token.clear();

        let session = match &self.inner.session {
            Some(session) => session.clear(),
            None => Ok(()),
        };
        let storage = self.inner.ctx.storage.reset();

        // No subscribers is fine.
        let _ = self.inner.events.send(SessionEvent::LoggedOut);
        session?;
        storage?;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_kind() == StateKind::Authenticated
    }

    pub fn state_kind(&self) -> StateKind {
        self.read_state().kind()
    }

    /// Credentials of the active state, if signed in.
    pub fn credentials(&self) -> Option<Credentials> {
        self.read_state().credentials().cloned()
    }

    /// Receive a [`SessionEvent`] on every sign-in and sign-out.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Read-only view over committed records.
    pub fn view_storage(&self) -> ViewStorage {
        self.inner.ctx.storage.view_storage()
    }

    /// The token sent with every HTTP request.
    pub fn bearer_token(&self) -> &BearerToken {
        &self.inner.token
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, StoresState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter_authenticated(&self, credentials: Credentials) {
        self.inner
            .token
            .set(credentials.bearer_token().unwrap_or_default());
        let username = credentials.username().to_owned();

        let mut state = AuthenticatedState::new(credentials, &self.inner.ctx);
        // Subscribe before the swap so no failure raised by the new
        // state's first requests is missed.
        state.set_failure_listener(spawn_failure_listener(&self.inner));
        self.swap(StoresState::Authenticated(state));

        let _ = self.inner.events.send(SessionEvent::LoggedIn { username });
    }

    fn swap(&self, next: StoresState) {
        let mut guard = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut previous = std::mem::replace(&mut *guard, next);
        previous.will_leave();
        guard.did_enter();
    }
}

/// Watch for rejected credentials and sign out when one arrives.
fn spawn_failure_listener(inner: &Arc<Inner>) -> tokio::task::JoinHandle<()> {
    let mut failures = inner.ctx.remote.subscribe_failures();
    let weak: Weak<Inner> = Arc::downgrade(inner);
    inner.ctx.runtime.spawn(async move {
        loop {
            match failures.recv().await {
                Ok(AuthFailure::InvalidToken) => {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    tracing::warn!("remote rejected credentials; signing out");
                    if let Err(e) = (StoresManager { inner }).deauthenticate() {
                        tracing::error!(error = %e, "sign-out after rejected credentials failed");
                    }
                    return;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "auth failure listener lagged");
                }
                Err(RecvError::Closed) => return,
            }
        }
    })
}

/// Builder for configuring and opening a [`StoresManager`].
///
/// # Examples
///
/// ```no_run
/// use fiable::StoresManagerBuilder;
///
/// # async fn example() -> Result<(), fiable::ManagerError> {
/// let manager = StoresManagerBuilder::new()
///     .session_dir("/tmp/fiable")
///     .open()?;
/// assert!(!manager.is_authenticated());
/// # Ok(())
/// # }
/// ```
pub struct StoresManagerBuilder {
    network: Option<Arc<dyn Network>>,
    network_config: NetworkConfig,
    storage: Option<StorageManager>,
    session_dir: Option<PathBuf>,
    writer_idle_timeout: Option<Duration>,
    credentials: Option<Credentials>,
    runtime: Option<tokio::runtime::Handle>,
}

impl StoresManagerBuilder {
    pub fn new() -> Self {
        Self {
            network: None,
            network_config: NetworkConfig::default(),
            storage: None,
            session_dir: None,
            writer_idle_timeout: None,
            credentials: None,
            runtime: None,
        }
    }

    /// Use `network` instead of building an [`HttpNetwork`].
    ///
    /// A custom network does not see the manager's
    /// [`BearerToken`] unless it was built with it.
    pub fn network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = Some(network);
        self
    }

    /// Configuration for the default [`HttpNetwork`].
    pub fn network_config(mut self, config: NetworkConfig) -> Self {
        self.network_config = config;
        self
    }

    /// Use `storage` instead of the default.
    ///
    /// Without this, storage lives under `<session_dir>/storage` when a
    /// session directory is set, and in memory otherwise.
    pub fn storage(mut self, storage: StorageManager) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Persist credentials (and default storage) under `path`.
    pub fn session_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.session_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// How long a store's derived writer may idle before its thread exits.
    ///
    /// Default: 5 minutes.
    pub fn writer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.writer_idle_timeout = Some(timeout);
        self
    }

    /// Start signed in with `credentials`, ignoring the session file.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Spawn store work on `runtime` instead of the current one.
    pub fn runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Open the manager.
    ///
    /// Starts authenticated if credentials were given to the builder or
    /// are found in the session directory, deauthenticated otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoRuntime`] if no runtime was configured and
    /// this is not called from within one, or the error from opening
    /// storage, reading the session, or building the HTTP client.
    pub fn open(self) -> Result<StoresManager, ManagerError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => tokio::runtime::Handle::try_current().map_err(|_| ManagerError::NoRuntime)?,
        };

        let token = BearerToken::default();
        let network: Arc<dyn Network> = match self.network {
            Some(network) => network,
            None => Arc::new(HttpNetwork::new(self.network_config, token.clone())?),
        };

        let mut storage = match (self.storage, &self.session_dir) {
            (Some(storage), _) => storage,
            (None, Some(dir)) => StorageManager::open_dir(dir.join("storage"))?,
            (None, None) => StorageManager::in_memory(),
        };
        if let Some(timeout) = self.writer_idle_timeout {
            storage = storage.with_writer_idle_timeout(timeout);
        }

        let session = self.session_dir.map(Session::new);
        let credentials = match (self.credentials, &session) {
            (Some(credentials), _) => Some(credentials),
            (None, Some(session)) => session.load()?,
            (None, None) => None,
        };

        let ctx = StoreContext::new(Remote::new(network), storage, runtime);
        let (events, _) = broadcast::channel(16);
        let initial = StoresState::Deauthenticated(DeauthenticatedState::new(&ctx));
        let manager = StoresManager {
            inner: Arc::new(Inner {
                state: RwLock::new(initial),
                ctx,
                session,
                token,
                events,
            }),
        };

        match credentials {
            Some(credentials) => manager.enter_authenticated(credentials),
            None => manager
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .did_enter(),
        }
        Ok(manager)
    }
}

impl Default for StoresManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::action::{EventAction, SiteDiscoveryAction, SystemStatusAction};
    use crate::error::{DispatchError, NetworkError};
    use crate::network::Method;
    use crate::testing::StubNetwork;

    fn wpcom() -> Credentials {
        Credentials::wpcom("mia", "tok-1", "https://mia.blog")
    }

    fn open_with(stub: &StubNetwork, dir: &TempDir) -> StoresManager {
        StoresManagerBuilder::new()
            .network(Arc::new(stub.clone()))
            .session_dir(dir.path())
            .open()
            .expect("open should succeed")
    }

    #[tokio::test]
    async fn starts_deauthenticated_without_credentials() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let manager = open_with(&StubNetwork::new(), &tmp);
        assert!(!manager.is_authenticated());
        assert_eq!(manager.credentials(), None);
    }

    #[tokio::test]
    async fn starts_authenticated_from_session_file() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        Session::new(tmp.path()).save(&wpcom()).expect("save");

        let manager = open_with(&StubNetwork::new(), &tmp);

        assert!(manager.is_authenticated());
        assert_eq!(manager.credentials(), Some(wpcom()));
        assert_eq!(
            manager.bearer_token().header_value().as_deref(),
            Some("Bearer tok-1")
        );
    }

    #[tokio::test]
    async fn builder_credentials_override_session() {
        let manager = StoresManagerBuilder::new()
            .network(Arc::new(StubNetwork::new()))
            .credentials(Credentials::wporg("admin", "pw", "https://shop.example"))
            .open()
            .expect("open should succeed");
        assert!(manager.is_authenticated());
        assert_eq!(manager.bearer_token().header_value(), None);
    }

    #[tokio::test]
    async fn authenticate_persists_and_notifies() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let manager = open_with(&StubNetwork::new(), &tmp);
        let mut events = manager.subscribe();

        manager.authenticate(wpcom()).expect("authenticate");

        assert!(manager.is_authenticated());
        assert_eq!(Session::new(tmp.path()).load().unwrap(), Some(wpcom()));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoggedIn {
                username: "mia".into()
            }
        );
    }

    #[tokio::test]
    async fn deauthenticate_clears_everything() {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let stub = StubNetwork::new();
        stub.respond(
            Method::Get,
            "/mate/v1/events",
            json!({"events": [{"id": 1, "title": "x", "starts_at": "t", "status": "published"}]}),
        );
        let manager = open_with(&stub, &tmp);
        manager.authenticate(wpcom()).expect("authenticate");
        let (action, pending) = EventAction::synchronize_events(1, 25, false);
        manager.dispatch(action);
        pending.await.expect("sync should succeed");
        let mut events = manager.subscribe();

        manager.deauthenticate().expect("deauthenticate");

        assert!(!manager.is_authenticated());
        assert_eq!(Session::new(tmp.path()).load().unwrap(), None);
        assert_eq!(manager.bearer_token().header_value(), None);
        assert_eq!(
            manager
                .view_storage()
                .count::<crate::records::StoredEvent>()
                .unwrap(),
            0
        );
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    }

    #[tokio::test]
    async fn authenticate_from_authenticated_rebuilds_state() {
        let manager = StoresManagerBuilder::new()
            .network(Arc::new(StubNetwork::new()))
            .credentials(wpcom())
            .open()
            .expect("open should succeed");

        let wporg = Credentials::wporg("admin", "pw", "https://shop.example");
        manager.authenticate(wporg.clone()).expect("authenticate");

        assert_eq!(manager.credentials(), Some(wporg));
    }

    #[tokio::test]
    async fn dispatch_goes_to_active_state_only() {
        let stub = StubNetwork::new();
        stub.respond(
            Method::Get,
            "/mate/v1/site-info",
            json!({"url": "https://a.example", "is_wordpress": true}),
        );
        let tmp = TempDir::new().expect("failed to create temp dir");
        let manager = open_with(&stub, &tmp);

        let (action, pending) = SystemStatusAction::fetch_system_status();
        manager.dispatch(action);
        assert!(matches!(pending.await, Err(DispatchError::Dropped)));

        let (action, pending) = SiteDiscoveryAction::fetch_site_info("a.example");
        manager.dispatch(action);
        assert!(pending.await.expect("site info").is_wordpress);
    }

    #[tokio::test]
    async fn invalid_token_signs_out() {
        let stub = StubNetwork::new();
        stub.fail(
            Method::Get,
            "/mate/v1/system-status",
            NetworkError::Status {
                code: 401,
                message: "invalid_token".into(),
            },
        );
        let manager = StoresManagerBuilder::new()
            .network(Arc::new(stub.clone()))
            .credentials(wpcom())
            .open()
            .expect("open should succeed");
        let mut events = manager.subscribe();

        let (action, pending) = SystemStatusAction::fetch_system_status();
        manager.dispatch(action);
        assert!(pending.await.is_err());

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("sign-out should happen")
            .expect("event");
        assert_eq!(event, SessionEvent::LoggedOut);
        assert!(!manager.is_authenticated());
    }

    #[test]
    fn open_outside_runtime_fails() {
        let result = StoresManagerBuilder::new()
            .network(Arc::new(StubNetwork::new()))
            .open();
        assert!(matches!(result, Err(ManagerError::NoRuntime)));
    }
}
