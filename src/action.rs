//! Actions: one requested operation plus the completion that answers it.
//!
//! Each domain has its own action family. [`Action`] is the sum over all
//! families, and [`ActionKind`] is its discriminant, which is what the
//! [`Dispatcher`](crate::Dispatcher) routes on. A store therefore only ever
//! receives values of its own family.
//!
//! Every family case carries exactly one [`Completion`]. The constructors
//! return the [`Pending`] half alongside the action:
//!
//! ```
//! use fiable::{ActionKind, EventAction};
//!
//! let (action, pending) = EventAction::synchronize_events(1, 25, true);
//! assert_eq!(action.kind(), ActionKind::Event);
//! assert_eq!(action.name(), "synchronize_events");
//! # drop(pending);
//! ```

use crate::completion::{Completion, Pending};
use crate::model::{
    AccountCreated, Device, DeviceRegistration, GooglePlace, JetpackConnection, NewEvent,
    RemoteAccount, RemoteCategory, RemoteEvent, SiteInfo, SupportTicket, SystemStatus,
};
use crate::records::StoredAccount;

/// Discriminant of [`Action`], one per action family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Event,
    EventCategory,
    GooglePlace,
    Support,
    SystemStatus,
    Notification,
    Account,
    JetpackConnection,
    AccountCreation,
    SiteDiscovery,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::EventCategory => "event_category",
            Self::GooglePlace => "google_place",
            Self::Support => "support",
            Self::SystemStatus => "system_status",
            Self::Notification => "notification",
            Self::Account => "account",
            Self::JetpackConnection => "jetpack_connection",
            Self::AccountCreation => "account_creation",
            Self::SiteDiscovery => "site_discovery",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any action, tagged by family.
#[derive(Debug, Clone)]
pub enum Action {
    Event(EventAction),
    EventCategory(EventCategoryAction),
    GooglePlace(GooglePlaceAction),
    Support(SupportAction),
    SystemStatus(SystemStatusAction),
    Notification(NotificationAction),
    Account(AccountAction),
    JetpackConnection(JetpackConnectionAction),
    AccountCreation(AccountCreationAction),
    SiteDiscovery(SiteDiscoveryAction),
}

impl Action {
    /// The family this action belongs to.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Event(_) => ActionKind::Event,
            Self::EventCategory(_) => ActionKind::EventCategory,
            Self::GooglePlace(_) => ActionKind::GooglePlace,
            Self::Support(_) => ActionKind::Support,
            Self::SystemStatus(_) => ActionKind::SystemStatus,
            Self::Notification(_) => ActionKind::Notification,
            Self::Account(_) => ActionKind::Account,
            Self::JetpackConnection(_) => ActionKind::JetpackConnection,
            Self::AccountCreation(_) => ActionKind::AccountCreation,
            Self::SiteDiscovery(_) => ActionKind::SiteDiscovery,
        }
    }

    /// Case name within the family, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Event(a) => a.name(),
            Self::EventCategory(a) => a.name(),
            Self::GooglePlace(a) => a.name(),
            Self::Support(a) => a.name(),
            Self::SystemStatus(a) => a.name(),
            Self::Notification(a) => a.name(),
            Self::Account(a) => a.name(),
            Self::JetpackConnection(a) => a.name(),
            Self::AccountCreation(a) => a.name(),
            Self::SiteDiscovery(a) => a.name(),
        }
    }
}

// --- Events ---

/// Operations on events and a user's event participation.
#[derive(Debug, Clone)]
pub enum EventAction {
    /// Fetch one page of events and upsert it. Resolves to whether a
    /// further page exists. With `replace_existing`, every stored event is
    /// removed in the same commit.
    SynchronizeEvents {
        page: u32,
        page_size: u32,
        replace_existing: bool,
        completion: Completion<bool>,
    },
    /// Fetch one page of a user's events and upsert it.
    SynchronizeUserEvents {
        user_id: i64,
        page: u32,
        page_size: u32,
        replace_existing: bool,
        completion: Completion<bool>,
    },
    /// Fetch a single event and upsert it.
    RetrieveEvent {
        event_id: i64,
        completion: Completion<RemoteEvent>,
    },
    /// Create an event remotely and store the server's copy.
    CreateEvent {
        draft: NewEvent,
        completion: Completion<RemoteEvent>,
    },
    /// Delete an event remotely, then locally.
    DeleteEvent {
        event_id: i64,
        completion: Completion<()>,
    },
}

impl EventAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SynchronizeEvents { .. } => "synchronize_events",
            Self::SynchronizeUserEvents { .. } => "synchronize_user_events",
            Self::RetrieveEvent { .. } => "retrieve_event",
            Self::CreateEvent { .. } => "create_event",
            Self::DeleteEvent { .. } => "delete_event",
        }
    }

    pub fn synchronize_events(
        page: u32,
        page_size: u32,
        replace_existing: bool,
    ) -> (Action, Pending<bool>) {
        let (completion, pending) = Completion::channel();
        let action = Self::SynchronizeEvents {
            page,
            page_size,
            replace_existing,
            completion,
        };
        (action.into(), pending)
    }

    pub fn synchronize_user_events(
        user_id: i64,
        page: u32,
        page_size: u32,
        replace_existing: bool,
    ) -> (Action, Pending<bool>) {
        let (completion, pending) = Completion::channel();
        let action = Self::SynchronizeUserEvents {
            user_id,
            page,
            page_size,
            replace_existing,
            completion,
        };
        (action.into(), pending)
    }

    pub fn retrieve_event(event_id: i64) -> (Action, Pending<RemoteEvent>) {
        let (completion, pending) = Completion::channel();
        (
            Self::RetrieveEvent {
                event_id,
                completion,
            }
            .into(),
            pending,
        )
    }

    pub fn create_event(draft: NewEvent) -> (Action, Pending<RemoteEvent>) {
        let (completion, pending) = Completion::channel();
        (Self::CreateEvent { draft, completion }.into(), pending)
    }

    pub fn delete_event(event_id: i64) -> (Action, Pending<()>) {
        let (completion, pending) = Completion::channel();
        (
            Self::DeleteEvent {
                event_id,
                completion,
            }
            .into(),
            pending,
        )
    }
}

impl From<EventAction> for Action {
    fn from(action: EventAction) -> Self {
        Self::Event(action)
    }
}

// --- Event categories ---

#[derive(Debug, Clone)]
pub enum EventCategoryAction {
    /// Fetch one page of categories and upsert it. Resolves to whether a
    /// further page exists. Page 1 replaces every stored category.
    SynchronizeEventCategories {
        page: u32,
        page_size: u32,
        completion: Completion<bool>,
    },
    RetrieveEventCategory {
        category_id: i64,
        completion: Completion<RemoteCategory>,
    },
}

impl EventCategoryAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SynchronizeEventCategories { .. } => "synchronize_event_categories",
            Self::RetrieveEventCategory { .. } => "retrieve_event_category",
        }
    }

    pub fn synchronize_event_categories(page: u32, page_size: u32) -> (Action, Pending<bool>) {
        let (completion, pending) = Completion::channel();
        let action = Self::SynchronizeEventCategories {
            page,
            page_size,
            completion,
        };
        (action.into(), pending)
    }

    pub fn retrieve_event_category(category_id: i64) -> (Action, Pending<RemoteCategory>) {
        let (completion, pending) = Completion::channel();
        let action = Self::RetrieveEventCategory {
            category_id,
            completion,
        };
        (action.into(), pending)
    }
}

impl From<EventCategoryAction> for Action {
    fn from(action: EventCategoryAction) -> Self {
        Self::EventCategory(action)
    }
}

// --- Google Places ---

#[derive(Debug, Clone)]
pub enum GooglePlaceAction {
    SearchPlaces {
        query: String,
        completion: Completion<Vec<GooglePlace>>,
    },
    RetrievePlace {
        place_id: String,
        completion: Completion<GooglePlace>,
    },
}

impl GooglePlaceAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchPlaces { .. } => "search_places",
            Self::RetrievePlace { .. } => "retrieve_place",
        }
    }

    pub fn search_places(query: impl Into<String>) -> (Action, Pending<Vec<GooglePlace>>) {
        let (completion, pending) = Completion::channel();
        let action = Self::SearchPlaces {
            query: query.into(),
            completion,
        };
        (action.into(), pending)
    }

    pub fn retrieve_place(place_id: impl Into<String>) -> (Action, Pending<GooglePlace>) {
        let (completion, pending) = Completion::channel();
        let action = Self::RetrievePlace {
            place_id: place_id.into(),
            completion,
        };
        (action.into(), pending)
    }
}

impl From<GooglePlaceAction> for Action {
    fn from(action: GooglePlaceAction) -> Self {
        Self::GooglePlace(action)
    }
}

// --- Support ---

#[derive(Debug, Clone)]
pub enum SupportAction {
    CreateTicket {
        ticket: SupportTicket,
        completion: Completion<()>,
    },
}

impl SupportAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateTicket { .. } => "create_ticket",
        }
    }

    pub fn create_ticket(ticket: SupportTicket) -> (Action, Pending<()>) {
        let (completion, pending) = Completion::channel();
        (Self::CreateTicket { ticket, completion }.into(), pending)
    }
}

impl From<SupportAction> for Action {
    fn from(action: SupportAction) -> Self {
        Self::Support(action)
    }
}

// --- System status ---

#[derive(Debug, Clone)]
pub enum SystemStatusAction {
    FetchSystemStatus { completion: Completion<SystemStatus> },
}

impl SystemStatusAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchSystemStatus { .. } => "fetch_system_status",
        }
    }

    pub fn fetch_system_status() -> (Action, Pending<SystemStatus>) {
        let (completion, pending) = Completion::channel();
        (Self::FetchSystemStatus { completion }.into(), pending)
    }
}

impl From<SystemStatusAction> for Action {
    fn from(action: SystemStatusAction) -> Self {
        Self::SystemStatus(action)
    }
}

// --- Push notifications ---

#[derive(Debug, Clone)]
pub enum NotificationAction {
    RegisterDevice {
        device: Device,
        completion: Completion<DeviceRegistration>,
    },
    UnregisterDevice {
        device_id: String,
        completion: Completion<()>,
    },
}

impl NotificationAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterDevice { .. } => "register_device",
            Self::UnregisterDevice { .. } => "unregister_device",
        }
    }

    pub fn register_device(device: Device) -> (Action, Pending<DeviceRegistration>) {
        let (completion, pending) = Completion::channel();
        (Self::RegisterDevice { device, completion }.into(), pending)
    }

    pub fn unregister_device(device_id: impl Into<String>) -> (Action, Pending<()>) {
        let (completion, pending) = Completion::channel();
        let action = Self::UnregisterDevice {
            device_id: device_id.into(),
            completion,
        };
        (action.into(), pending)
    }
}

impl From<NotificationAction> for Action {
    fn from(action: NotificationAction) -> Self {
        Self::Notification(action)
    }
}

// --- WordPress.com account ---

#[derive(Debug, Clone)]
pub enum AccountAction {
    /// Fetch the signed-in account and upsert it.
    SynchronizeAccount { completion: Completion<RemoteAccount> },
    /// Read a stored account without touching the network.
    LoadAccount {
        user_id: i64,
        completion: Completion<Option<StoredAccount>>,
    },
}

impl AccountAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SynchronizeAccount { .. } => "synchronize_account",
            Self::LoadAccount { .. } => "load_account",
        }
    }

    pub fn synchronize_account() -> (Action, Pending<RemoteAccount>) {
        let (completion, pending) = Completion::channel();
        (Self::SynchronizeAccount { completion }.into(), pending)
    }

    pub fn load_account(user_id: i64) -> (Action, Pending<Option<StoredAccount>>) {
        let (completion, pending) = Completion::channel();
        (
            Self::LoadAccount {
                user_id,
                completion,
            }
            .into(),
            pending,
        )
    }
}

impl From<AccountAction> for Action {
    fn from(action: AccountAction) -> Self {
        Self::Account(action)
    }
}

// --- Jetpack ---

#[derive(Debug, Clone)]
pub enum JetpackConnectionAction {
    /// Resolves to the URL that starts the Jetpack connection flow.
    FetchConnectionUrl { completion: Completion<String> },
    FetchConnectionStatus {
        completion: Completion<JetpackConnection>,
    },
}

impl JetpackConnectionAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchConnectionUrl { .. } => "fetch_connection_url",
            Self::FetchConnectionStatus { .. } => "fetch_connection_status",
        }
    }

    pub fn fetch_connection_url() -> (Action, Pending<String>) {
        let (completion, pending) = Completion::channel();
        (Self::FetchConnectionUrl { completion }.into(), pending)
    }

    pub fn fetch_connection_status() -> (Action, Pending<JetpackConnection>) {
        let (completion, pending) = Completion::channel();
        (Self::FetchConnectionStatus { completion }.into(), pending)
    }
}

impl From<JetpackConnectionAction> for Action {
    fn from(action: JetpackConnectionAction) -> Self {
        Self::JetpackConnection(action)
    }
}

// --- Pre-login ---

#[derive(Debug, Clone)]
pub enum AccountCreationAction {
    CreateAccount {
        email: String,
        username: String,
        password: String,
        completion: Completion<AccountCreated>,
    },
}

impl AccountCreationAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAccount { .. } => "create_account",
        }
    }

    pub fn create_account(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> (Action, Pending<AccountCreated>) {
        let (completion, pending) = Completion::channel();
        let action = Self::CreateAccount {
            email: email.into(),
            username: username.into(),
            password: password.into(),
            completion,
        };
        (action.into(), pending)
    }
}

impl From<AccountCreationAction> for Action {
    fn from(action: AccountCreationAction) -> Self {
        Self::AccountCreation(action)
    }
}

#[derive(Debug, Clone)]
pub enum SiteDiscoveryAction {
    FetchSiteInfo {
        site_address: String,
        completion: Completion<SiteInfo>,
    },
}

impl SiteDiscoveryAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchSiteInfo { .. } => "fetch_site_info",
        }
    }

    pub fn fetch_site_info(site_address: impl Into<String>) -> (Action, Pending<SiteInfo>) {
        let (completion, pending) = Completion::channel();
        let action = Self::FetchSiteInfo {
            site_address: site_address.into(),
            completion,
        };
        (action.into(), pending)
    }
}

impl From<SiteDiscoveryAction> for Action {
    fn from(action: SiteDiscoveryAction) -> Self {
        Self::SiteDiscovery(action)
    }
}
