//! The two authentication states and the stores each one owns.
//!
//! A state is built in one go: its stores are decided at construction
//! from the credentials it was given and never change afterwards. Each
//! state owns its own [`Dispatcher`], so actions dispatched to one state
//! can never reach stores of the other.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::action::Action;
use crate::dispatcher::{ActionsProcessor, Dispatcher};
use crate::session::Credentials;
use crate::stores::{
    AccountCreationStore, AccountStore, EventCategoryStore, EventStore, GooglePlaceStore,
    JetpackConnectionStore, NotificationStore, SiteDiscoveryStore, Store, StoreContext,
    SupportStore, SystemStatusStore,
};

/// Which of the two states is (or will be) active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Authenticated,
    Deauthenticated,
}

/// An input to the session state machine. Both are accepted in both
/// states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    Authenticate(Credentials),
    Deauthenticate,
}

/// The state `event` leads to, whatever the current state is.
pub fn transition_target(event: &SessionTransition) -> StateKind {
    match event {
        SessionTransition::Authenticate(_) => StateKind::Authenticated,
        SessionTransition::Deauthenticate => StateKind::Deauthenticated,
    }
}

/// Stores registered with one dispatcher, kept so they can be
/// unregistered again on teardown.
///
/// The set owns a context scoped to the state. Closing it on teardown
/// cancels the stores' unfinished work, so nothing they started is
/// committed after the state is left.
struct StoreSet {
    ctx: StoreContext,
    dispatcher: Dispatcher,
    stores: Vec<Arc<dyn ActionsProcessor>>,
}

impl StoreSet {
    fn new(ctx: &StoreContext) -> Self {
        Self {
            ctx: ctx.scoped(),
            dispatcher: Dispatcher::default(),
            stores: Vec::new(),
        }
    }

    fn context(&self) -> StoreContext {
        self.ctx.clone()
    }

    fn install<S: Store>(&mut self, store: S) {
        let store = Arc::new(store);
        Arc::clone(&store).register_supported_actions(&mut self.dispatcher);
        self.stores.push(store);
    }

    fn teardown(&mut self) {
        for store in self.stores.drain(..) {
            self.dispatcher.unregister(&store);
        }
        self.ctx.close();
    }
}

/// Signed in: the full set of stores for the given credentials.
pub struct AuthenticatedState {
    credentials: Credentials,
    set: StoreSet,
    failure_listener: Option<JoinHandle<()>>,
}

impl AuthenticatedState {
    /// Build the stores for `credentials`.
    ///
    /// Every account gets the core stores. WordPress.com credentials add
    /// [`AccountStore`]; site credentials add [`JetpackConnectionStore`].
    pub fn new(credentials: Credentials, ctx: &StoreContext) -> Self {
        let mut set = StoreSet::new(ctx);
        set.install(NotificationStore::new(set.context()));
        set.install(EventStore::new(set.context()));
        set.install(EventCategoryStore::new(set.context()));
        set.install(GooglePlaceStore::new(set.context()));
        set.install(SupportStore::new(set.context()));
        set.install(SystemStatusStore::new(set.context()));
        if credentials.is_wpcom() {
            set.install(AccountStore::new(set.context()));
        } else {
            set.install(JetpackConnectionStore::new(set.context()));
        }
        Self {
            credentials,
            set,
            failure_listener: None,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Attach the task that watches for rejected credentials. It is
    /// aborted when this state is left.
    pub(crate) fn set_failure_listener(&mut self, listener: JoinHandle<()>) {
        if let Some(previous) = self.failure_listener.replace(listener) {
            previous.abort();
        }
    }
}

/// Signed out: only the stores needed before login.
pub struct DeauthenticatedState {
    set: StoreSet,
}

impl DeauthenticatedState {
    pub fn new(ctx: &StoreContext) -> Self {
        let mut set = StoreSet::new(ctx);
        set.install(AccountCreationStore::new(set.context()));
        set.install(SiteDiscoveryStore::new(set.context()));
        Self { set }
    }
}

/// The active state of a [`StoresManager`](crate::StoresManager).
pub enum StoresState {
    Authenticated(AuthenticatedState),
    Deauthenticated(DeauthenticatedState),
}

impl std::fmt::Debug for StoresState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoresState")
            .field("kind", &self.kind())
            .field("dispatcher", self.dispatcher())
            .finish()
    }
}

impl StoresState {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Authenticated(_) => StateKind::Authenticated,
            Self::Deauthenticated(_) => StateKind::Deauthenticated,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::Authenticated(state) => Some(state.credentials()),
            Self::Deauthenticated(_) => None,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        match self {
            Self::Authenticated(state) => &state.set.dispatcher,
            Self::Deauthenticated(state) => &state.set.dispatcher,
        }
    }

    /// Route `action` through this state's dispatcher.
    pub fn on_action(&self, action: Action) {
        self.dispatcher().dispatch(action);
    }

    /// Called once the state has become the active one.
    pub fn did_enter(&mut self) {
        match self {
            Self::Authenticated(state) => tracing::info!(
                username = %state.credentials.username(),
                wpcom = state.credentials.is_wpcom(),
                stores = state.set.stores.len(),
                "authenticated"
            ),
            Self::Deauthenticated(state) => {
                tracing::info!(stores = state.set.stores.len(), "deauthenticated")
            }
        }
    }

    /// Called right before the state is replaced. Unregisters every store,
    /// cancels their unfinished work and stops background listeners.
    pub fn will_leave(&mut self) {
        match self {
            Self::Authenticated(state) => {
                if let Some(listener) = state.failure_listener.take() {
                    listener.abort();
                }
                state.set.teardown();
            }
            Self::Deauthenticated(state) => state.set.teardown(),
        }
    }
}
