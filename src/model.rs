//! Remote read models.
//!
//! Plain decodable snapshots of server JSON. They carry no identity beyond
//! their own `id` field and are never mutated after decoding; the storage
//! records in [`records`](crate::records) copy their fields on upsert.

use serde::{Deserialize, Serialize};

/// Publication state of an event on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteEventStatus {
    Published,
    #[default]
    Draft,
    /// Placeholder while the server imports the event from an external
    /// feed. Never persisted locally.
    Importing,
    Cancelled,
}

/// An event as returned by the events endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub status: RemoteEventStatus,
}

impl RemoteEvent {
    /// Whether this snapshot describes a transient server-side placeholder.
    pub fn is_transient(&self) -> bool {
        self.status == RemoteEventStatus::Importing
    }
}

/// One page of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<RemoteEvent>,
    /// URL of the next page, absent on the last page.
    #[serde(default)]
    pub next_page: Option<String>,
}

impl EventPage {
    pub fn has_next_page(&self) -> bool {
        self.next_page.is_some()
    }
}

/// A user's participation in an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUserEvent {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
    pub title: String,
    /// Role of the user in the event (e.g. `"host"`, `"attendee"`).
    pub role: String,
    pub status: RemoteEventStatus,
}

impl RemoteUserEvent {
    pub fn is_transient(&self) -> bool {
        self.status == RemoteEventStatus::Importing
    }
}

/// One page of user events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEventPage {
    pub user_events: Vec<RemoteUserEvent>,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// Request body for creating an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub starts_at: String,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
}

/// An event category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// One page of event categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPage {
    pub categories: Vec<RemoteCategory>,
    #[serde(default)]
    pub next_page: Option<String>,
}

/// A place from the Google Places API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GooglePlace {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub formatted_address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub rating: Option<f32>,
}

/// Envelope of a Places text search.
///
/// Google reports failures in `status` with a 200 response, so the store
/// inspects it instead of relying on the transport status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSearchResponse {
    #[serde(default)]
    pub results: Vec<GooglePlace>,
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Envelope of a Places details lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetailsResponse {
    #[serde(default)]
    pub result: Option<GooglePlace>,
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A support request submitted by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub subject: String,
    pub message: String,
    pub email: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Server-side health and environment report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub environment: String,
    #[serde(default)]
    pub database_version: Option<String>,
    #[serde(default)]
    pub active_plugins: Vec<String>,
}

/// The authenticated WordPress.com account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub gravatar_url: Option<String>,
}

/// A device to register for push notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub token: String,
    pub model: String,
    pub os_version: String,
    pub app_version: String,
}

/// Result of registering a device for push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub device_id: String,
}

/// Jetpack connection state of a self-hosted site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JetpackConnection {
    pub is_active: bool,
    pub is_registered: bool,
    #[serde(default)]
    pub connected_user: Option<String>,
}

/// Body of the Jetpack connection URL endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUrl {
    pub url: String,
}

/// Result of creating a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub user_id: i64,
    pub username: String,
    pub bearer_token: String,
}

/// Discovery information about a site address entered before login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub url: String,
    #[serde(default)]
    pub name: String,
    pub is_wordpress: bool,
    #[serde(default)]
    pub has_jetpack: bool,
    #[serde(default)]
    pub is_wpcom: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_decodes_with_optional_fields_missing() {
        let event: RemoteEvent = serde_json::from_value(json!({
            "id": 3,
            "title": "Pickup game",
            "starts_at": "2026-05-01T18:00:00Z",
            "status": "published"
        }))
        .expect("decode should succeed");
        assert_eq!(event.id, 3);
        assert!(event.description.is_empty());
        assert_eq!(event.category_id, None);
        assert!(!event.is_transient());
    }

    #[test]
    fn importing_status_is_transient() {
        let event: RemoteEvent = serde_json::from_value(json!({
            "id": 9,
            "title": "Imported",
            "starts_at": "2026-05-01T18:00:00Z",
            "status": "importing"
        }))
        .expect("decode should succeed");
        assert!(event.is_transient());
    }

    #[test]
    fn event_page_next_page_presence() {
        let page: EventPage = serde_json::from_value(json!({
            "events": [],
            "next_page": "https://example.com/events?page=2"
        }))
        .expect("decode should succeed");
        assert!(page.has_next_page());

        let last: EventPage =
            serde_json::from_value(json!({ "events": [] })).expect("decode should succeed");
        assert!(!last.has_next_page());
    }

    #[test]
    fn unknown_status_fails_to_decode() {
        let result = serde_json::from_value::<RemoteEvent>(json!({
            "id": 1,
            "title": "x",
            "starts_at": "t",
            "status": "archived"
        }));
        assert!(result.is_err());
    }
}
