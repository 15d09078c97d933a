//! Typed façade over a [`Network`]: one method per remote endpoint.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;

use crate::error::{ApiError, NetworkError};
use crate::model::{
    AccountCreated, CategoryPage, ConnectionUrl, Device, DeviceRegistration, EventPage,
    JetpackConnection, NewEvent, PlaceDetailsResponse, PlaceSearchResponse, RemoteAccount,
    RemoteCategory, RemoteEvent, SiteInfo, SupportTicket, SystemStatus, UserEventPage,
};
use crate::network::{Network, Request};

/// Signal published when the remote rejects the current credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidToken,
}

/// Decodes responses into read models and reports credential failures.
///
/// `Clone` is cheap: the network and the failure channel are shared.
#[derive(Clone)]
pub struct Remote {
    network: Arc<dyn Network>,
    failures: broadcast::Sender<AuthFailure>,
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote").finish_non_exhaustive()
    }
}

impl Remote {
    pub fn new(network: Arc<dyn Network>) -> Self {
        let (failures, _) = broadcast::channel(16);
        Self { network, failures }
    }

    /// Receive an [`AuthFailure`] every time a call fails with an
    /// invalid-token error.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<AuthFailure> {
        self.failures.subscribe()
    }

    /// Perform `request` and decode the body into `T`.
    ///
    /// # Errors
    ///
    /// Forwards the network error unchanged, or returns
    /// [`NetworkError::Decode`] if the body does not match `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: Request) -> Result<T, NetworkError> {
        let value = self.call(request).await?;
        serde_json::from_value(value).map_err(|e| NetworkError::Decode(e.to_string()))
    }

    /// Perform `request`, ignoring the body.
    pub async fn send(&self, request: Request) -> Result<(), NetworkError> {
        self.call(request).await.map(|_| ())
    }

    async fn call(&self, request: Request) -> Result<serde_json::Value, NetworkError> {
        let path = request.path.clone();
        let result = self.network.perform(request).await;
        if let Err(err) = &result
            && ApiError::from_network(err) == ApiError::InvalidToken
        {
            tracing::warn!(path = %path, "remote rejected credentials");
            // No subscribers simply means nobody is listening yet.
            let _ = self.failures.send(AuthFailure::InvalidToken);
        }
        result
    }

    // --- Events ---

    pub async fn load_events(&self, page: u32, page_size: u32) -> Result<EventPage, NetworkError> {
        self.fetch(
            Request::get("/mate/v1/events")
                .with_query("page", page)
                .with_query("per_page", page_size),
        )
        .await
    }

    pub async fn load_user_events(
        &self,
        user_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<UserEventPage, NetworkError> {
        self.fetch(
            Request::get(format!("/mate/v1/users/{user_id}/events"))
                .with_query("page", page)
                .with_query("per_page", page_size),
        )
        .await
    }

    pub async fn load_event(&self, event_id: i64) -> Result<RemoteEvent, NetworkError> {
        self.fetch(Request::get(format!("/mate/v1/events/{event_id}")))
            .await
    }

    pub async fn create_event(&self, draft: &NewEvent) -> Result<RemoteEvent, NetworkError> {
        self.fetch(Request::post("/mate/v1/events", encode(draft)?))
            .await
    }

    pub async fn delete_event(&self, event_id: i64) -> Result<(), NetworkError> {
        self.send(Request::delete(format!("/mate/v1/events/{event_id}")))
            .await
    }

    // --- Event categories ---

    pub async fn load_categories(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<CategoryPage, NetworkError> {
        self.fetch(
            Request::get("/mate/v1/event-categories")
                .with_query("page", page)
                .with_query("per_page", page_size),
        )
        .await
    }

    pub async fn load_category(&self, category_id: i64) -> Result<RemoteCategory, NetworkError> {
        self.fetch(Request::get(format!(
            "/mate/v1/event-categories/{category_id}"
        )))
        .await
    }

    // --- Google Places ---

    pub async fn search_places(&self, query: &str) -> Result<PlaceSearchResponse, NetworkError> {
        self.fetch(Request::get("/places/textsearch").with_query("query", query))
            .await
    }

    pub async fn place_details(
        &self,
        place_id: &str,
    ) -> Result<PlaceDetailsResponse, NetworkError> {
        self.fetch(Request::get("/places/details").with_query("place_id", place_id))
            .await
    }

    // --- Support and status ---

    pub async fn create_ticket(&self, ticket: &SupportTicket) -> Result<(), NetworkError> {
        self.send(Request::post("/mate/v1/support/tickets", encode(ticket)?))
            .await
    }

    pub async fn load_system_status(&self) -> Result<SystemStatus, NetworkError> {
        self.fetch(Request::get("/mate/v1/system-status")).await
    }

    // --- Account and notifications ---

    pub async fn load_account(&self) -> Result<RemoteAccount, NetworkError> {
        self.fetch(Request::get("/rest/v1.1/me")).await
    }

    pub async fn register_device(
        &self,
        device: &Device,
    ) -> Result<DeviceRegistration, NetworkError> {
        self.fetch(Request::post("/mate/v1/devices", encode(device)?))
            .await
    }

    pub async fn unregister_device(&self, device_id: &str) -> Result<(), NetworkError> {
        self.send(Request::delete(format!("/mate/v1/devices/{device_id}")))
            .await
    }

    // --- Jetpack ---

    pub async fn jetpack_connection_url(&self) -> Result<ConnectionUrl, NetworkError> {
        self.fetch(Request::get("/jetpack/v4/connection/url")).await
    }

    pub async fn jetpack_connection_status(&self) -> Result<JetpackConnection, NetworkError> {
        self.fetch(Request::get("/jetpack/v4/connection")).await
    }

    // --- Pre-login ---

    pub async fn create_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<AccountCreated, NetworkError> {
        self.fetch(Request::post(
            "/mate/v1/accounts",
            json!({ "email": email, "username": username, "password": password }),
        ))
        .await
    }

    pub async fn site_info(&self, site_address: &str) -> Result<SiteInfo, NetworkError> {
        self.fetch(Request::get("/mate/v1/site-info").with_query("url", site_address))
            .await
    }
}

/// Serialize a request body.
fn encode<T: Serialize>(body: &T) -> Result<serde_json::Value, NetworkError> {
    serde_json::to_value(body).map_err(|e| NetworkError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Method;
    use crate::testing::StubNetwork;

    #[tokio::test]
    async fn fetch_decodes_typed_body() {
        let stub = StubNetwork::new();
        stub.respond(
            Method::Get,
            "/mate/v1/system-status",
            json!({"version": "1.2", "environment": "production"}),
        );
        let remote = Remote::new(Arc::new(stub));

        let status = remote.load_system_status().await.expect("should decode");
        assert_eq!(status.version, "1.2");
        assert!(status.active_plugins.is_empty());
    }

    #[tokio::test]
    async fn mismatched_body_is_decode_error() {
        let stub = StubNetwork::new();
        stub.respond(Method::Get, "/mate/v1/system-status", json!({"nope": true}));
        let remote = Remote::new(Arc::new(stub));

        let err = remote.load_system_status().await.expect_err("should fail");
        assert!(matches!(err, NetworkError::Decode(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn invalid_token_is_broadcast() {
        let stub = StubNetwork::new();
        stub.fail(
            Method::Get,
            "/rest/v1.1/me",
            NetworkError::Status {
                code: 401,
                message: "invalid_token".into(),
            },
        );
        let remote = Remote::new(Arc::new(stub));
        let mut failures = remote.subscribe_failures();

        let _ = remote.load_account().await;
        assert_eq!(failures.try_recv().ok(), Some(AuthFailure::InvalidToken));
    }

    #[tokio::test]
    async fn other_failures_are_not_broadcast() {
        let stub = StubNetwork::new();
        stub.fail(Method::Get, "/rest/v1.1/me", NetworkError::Timeout);
        let remote = Remote::new(Arc::new(stub));
        let mut failures = remote.subscribe_failures();

        let _ = remote.load_account().await;
        assert!(failures.try_recv().is_err());
    }

    #[test]
    fn unserializable_body_is_encode_error() {
        let body = std::collections::BTreeMap::from([((1, 2), "tuple keys")]);
        let err = encode(&body).expect_err("tuple keys are not valid JSON keys");
        assert!(matches!(err, NetworkError::Encode(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn paging_parameters_are_sent() {
        let stub = StubNetwork::new();
        stub.respond(Method::Get, "/mate/v1/events", json!({"events": []}));
        let remote = Remote::new(Arc::new(stub.clone()));

        remote.load_events(3, 50).await.expect("should decode");
        let sent = stub.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].query.contains(&("page".to_owned(), "3".to_owned())));
        assert!(sent[0].query.contains(&("per_page".to_owned(), "50".to_owned())));
    }
}
