//! Self-contained walk through the dispatch surface: sign in, sync a page
//! of events, read them back from local storage, then sign out.
//!
//! Run with: `cargo run --example offline_sync`
//!
//! Uses the in-process `StubNetwork`, so no server is needed.

use std::sync::Arc;

use fiable::testing::StubNetwork;
use fiable::{
    Credentials, EventAction, Method, SessionEvent, StoredEvent, StoresManagerBuilder,
    SystemStatusAction,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stub = StubNetwork::new();
    stub.respond(
        Method::Get,
        "/mate/v1/events",
        json!({
            "events": [
                {"id": 1, "title": "Morning run", "starts_at": "2026-09-01T07:00:00Z", "status": "published"},
                {"id": 2, "title": "Book club", "starts_at": "2026-09-02T19:00:00Z", "status": "published"},
                {"id": 3, "title": "Imported", "starts_at": "2026-09-03T10:00:00Z", "status": "importing"}
            ],
            "next_page": "https://example.com/mate/v1/events?page=2"
        }),
    );
    stub.respond(
        Method::Get,
        "/mate/v1/system-status",
        json!({"version": "2.4.0", "environment": "demo"}),
    );

    let manager = StoresManagerBuilder::new()
        .network(Arc::new(stub.clone()))
        .open()?;
    let mut session_events = manager.subscribe();
    println!("Signed in at start: {}", manager.is_authenticated());

    manager.authenticate(Credentials::wpcom("mia", "demo-token", "https://mia.blog"))?;
    if let Ok(SessionEvent::LoggedIn { username }) = session_events.recv().await {
        println!("Logged in as {username}");
    }

    let (action, pending) = EventAction::synchronize_events(1, 25, true);
    manager.dispatch(action);
    let has_next = pending.await?;
    println!("Synced page 1, more pages: {has_next}");

    for event in manager.view_storage().all::<StoredEvent>()? {
        println!("  #{} {}", event.event_id, event.title);
    }

    let (action, pending) = SystemStatusAction::fetch_system_status();
    manager.dispatch(action);
    let status = pending.await?;
    println!("Server {} ({})", status.version, status.environment);

    manager.deauthenticate()?;
    println!(
        "Signed out, {} events left locally",
        manager.view_storage().count::<StoredEvent>()?
    );
    Ok(())
}
