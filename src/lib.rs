//! Action dispatch and remote-to-local synchronization stores.
//!
//! Callers build an [`Action`] and hand it to a [`StoresManager`], which
//! routes it to the stores of the active authentication state. A store
//! performs one remote call through [`Network`], upserts the result into
//! local storage through its derived writer, and answers the action's
//! [`Pending`] after the commit.

mod action;
mod completion;
mod dispatcher;
mod error;
mod manager;
mod model;
mod network;
mod records;
mod remote;
mod session;
mod state;
pub mod storage;
pub mod stores;
pub mod testing;

pub use action::{
    AccountAction, AccountCreationAction, Action, ActionKind, EventAction, EventCategoryAction,
    GooglePlaceAction, JetpackConnectionAction, NotificationAction, SiteDiscoveryAction,
    SupportAction, SystemStatusAction,
};
pub use completion::{Completion, Pending};
pub use dispatcher::{ActionsProcessor, Dispatcher};
pub use error::{
    ApiError, DispatchError, ManagerError, NetworkError, SessionError, StorageError, StoreError,
};
pub use manager::{SessionEvent, StoresManager, StoresManagerBuilder};
pub use model::{
    AccountCreated, CategoryPage, ConnectionUrl, Device, DeviceRegistration, EventPage,
    GooglePlace, JetpackConnection, NewEvent, PlaceDetailsResponse, PlaceSearchResponse,
    RemoteAccount, RemoteCategory, RemoteEvent, RemoteEventStatus, RemoteUserEvent, SiteInfo,
    SupportTicket, SystemStatus, UserEventPage,
};
pub use network::{BearerToken, HttpNetwork, Method, Network, NetworkConfig, Request};
pub use records::{
    StoredAccount, StoredEvent, StoredEventCategory, StoredGooglePlace, StoredUserEvent,
    SyncedRecord,
};
pub use remote::{AuthFailure, Remote};
pub use session::{Credentials, Session};
pub use state::{
    AuthenticatedState, DeauthenticatedState, SessionTransition, StateKind, StoresState,
    transition_target,
};
pub use storage::{CommitSummary, DerivedStorage, Record, StorageManager, ViewStorage};
