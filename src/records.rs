//! Storage records: the locally persisted, mutable side of each entity.
//!
//! Each record is keyed by its remote identifier. Sync stores look a
//! record up by that id, fall back to a blank record when absent, then
//! copy every remote field over it with [`SyncedRecord::update_with`].

use serde::{Deserialize, Serialize};

use crate::model::{
    GooglePlace, RemoteAccount, RemoteCategory, RemoteEvent, RemoteEventStatus, RemoteUserEvent,
};
use crate::storage::Record;

/// A record that is kept in sync with a remote read model `M`.
pub trait SyncedRecord<M>: Record + Default {
    /// Storage key of the record mirroring `remote`.
    fn remote_id(remote: &M) -> String;

    /// Overwrite every field with the remote snapshot.
    fn update_with(&mut self, remote: &M);

    /// Whether `remote` is a server-side placeholder that must not be
    /// stored.
    fn is_transient(_remote: &M) -> bool {
        false
    }
}

/// Local copy of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: i64,
    pub title: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub place_id: Option<String>,
    pub image_url: Option<String>,
    pub status: RemoteEventStatus,
}

impl Record for StoredEvent {
    const ENTITY: &'static str = "event";

    fn record_id(&self) -> String {
        self.event_id.to_string()
    }
}

impl SyncedRecord<RemoteEvent> for StoredEvent {
    fn remote_id(remote: &RemoteEvent) -> String {
        remote.id.to_string()
    }

    fn is_transient(remote: &RemoteEvent) -> bool {
        remote.is_transient()
    }

    fn update_with(&mut self, remote: &RemoteEvent) {
        self.event_id = remote.id;
        self.title = remote.title.clone();
        self.description = remote.description.clone();
        self.category_id = remote.category_id;
        self.starts_at = remote.starts_at.clone();
        self.ends_at = remote.ends_at.clone();
        self.place_id = remote.place_id.clone();
        self.image_url = remote.image_url.clone();
        self.status = remote.status;
    }
}

/// Local copy of a user's participation in an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredUserEvent {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub title: String,
    pub role: String,
    pub status: RemoteEventStatus,
}

impl Record for StoredUserEvent {
    const ENTITY: &'static str = "user_event";

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}

impl SyncedRecord<RemoteUserEvent> for StoredUserEvent {
    fn remote_id(remote: &RemoteUserEvent) -> String {
        remote.id.to_string()
    }

    fn is_transient(remote: &RemoteUserEvent) -> bool {
        remote.is_transient()
    }

    fn update_with(&mut self, remote: &RemoteUserEvent) {
        self.id = remote.id;
        self.user_id = remote.user_id;
        self.event_id = remote.event_id;
        self.title = remote.title.clone();
        self.role = remote.role.clone();
        self.status = remote.status;
    }
}

/// Local copy of an event category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEventCategory {
    pub category_id: i64,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
}

impl Record for StoredEventCategory {
    const ENTITY: &'static str = "event_category";

    fn record_id(&self) -> String {
        self.category_id.to_string()
    }
}

impl SyncedRecord<RemoteCategory> for StoredEventCategory {
    fn remote_id(remote: &RemoteCategory) -> String {
        remote.id.to_string()
    }

    fn update_with(&mut self, remote: &RemoteCategory) {
        self.category_id = remote.id;
        self.name = remote.name.clone();
        self.slug = remote.slug.clone();
        self.parent_id = remote.parent_id;
    }
}

/// Local copy of a Google place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredGooglePlace {
    pub place_id: String,
    pub name: String,
    pub formatted_address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Option<f32>,
}

impl Record for StoredGooglePlace {
    const ENTITY: &'static str = "google_place";

    fn record_id(&self) -> String {
        self.place_id.clone()
    }
}

impl SyncedRecord<GooglePlace> for StoredGooglePlace {
    fn remote_id(remote: &GooglePlace) -> String {
        remote.place_id.clone()
    }

    fn update_with(&mut self, remote: &GooglePlace) {
        self.place_id = remote.place_id.clone();
        self.name = remote.name.clone();
        self.formatted_address = remote.formatted_address.clone();
        self.latitude = remote.latitude;
        self.longitude = remote.longitude;
        self.rating = remote.rating;
    }
}

/// Local copy of the signed-in WordPress.com account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub gravatar_url: Option<String>,
}

impl Record for StoredAccount {
    const ENTITY: &'static str = "account";

    fn record_id(&self) -> String {
        self.user_id.to_string()
    }
}

impl SyncedRecord<RemoteAccount> for StoredAccount {
    fn remote_id(remote: &RemoteAccount) -> String {
        remote.user_id.to_string()
    }

    fn update_with(&mut self, remote: &RemoteAccount) {
        self.user_id = remote.user_id;
        self.username = remote.username.clone();
        self.display_name = remote.display_name.clone();
        self.email = remote.email.clone();
        self.gravatar_url = remote.gravatar_url.clone();
    }
}
