//! End-to-end sync scenarios through the public `StoresManager` surface.

use std::sync::Arc;
use std::time::Duration;

use fiable::testing::StubNetwork;
use fiable::{
    ApiError, Credentials, DispatchError, EventAction, EventCategoryAction, GooglePlaceAction,
    JetpackConnectionAction, Method, NetworkError, SiteDiscoveryAction, StoreError,
    StoredEvent, StoredEventCategory, StoredGooglePlace, StoresManager, StoresManagerBuilder,
    SupportAction, SupportTicket,
};
use serde_json::{Value, json};

fn event(id: i64, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "starts_at": "2026-08-01T10:00:00Z",
        "status": status
    })
}

fn events_page(events: Vec<Value>) -> Value {
    json!({ "events": events })
}

fn signed_in(stub: &StubNetwork) -> StoresManager {
    StoresManagerBuilder::new()
        .network(Arc::new(stub.clone()))
        .credentials(Credentials::wpcom("mia", "tok", "https://mia.blog"))
        .open()
        .expect("open should succeed")
}

fn signed_out(stub: &StubNetwork) -> StoresManager {
    StoresManagerBuilder::new()
        .network(Arc::new(stub.clone()))
        .open()
        .expect("open should succeed")
}

async fn sync_events(
    manager: &StoresManager,
    replace_existing: bool,
) -> Result<bool, DispatchError> {
    let (action, pending) = EventAction::synchronize_events(1, 25, replace_existing);
    manager.dispatch(action);
    pending.await
}

fn stored_event_ids(manager: &StoresManager) -> Vec<i64> {
    let mut ids: Vec<i64> = manager
        .view_storage()
        .all::<StoredEvent>()
        .expect("read events")
        .into_iter()
        .map(|e| e.event_id)
        .collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn first_page_with_replace_wipes_stale_records() {
    let stub = StubNetwork::new();
    stub.respond(
        Method::Get,
        "/mate/v1/events",
        events_page(vec![event(1, "Old one", "published"), event(4, "Stale", "published")]),
    );
    stub.respond(
        Method::Get,
        "/mate/v1/events",
        events_page(vec![
            event(1, "New one", "published"),
            event(2, "Two", "published"),
            event(3, "Three", "draft"),
        ]),
    );
    let manager = signed_in(&stub);

    sync_events(&manager, false).await.expect("seed sync");
    assert_eq!(stored_event_ids(&manager), vec![1, 4]);

    sync_events(&manager, true).await.expect("replace sync");

    assert_eq!(stored_event_ids(&manager), vec![1, 2, 3]);
    let one = manager
        .view_storage()
        .load::<StoredEvent>("1")
        .unwrap()
        .expect("event 1");
    assert_eq!(one.title, "New one");
}

#[tokio::test]
async fn resynced_category_keeps_one_record_with_latest_fields() {
    let stub = StubNetwork::new();
    stub.respond(
        Method::Get,
        "/mate/v1/event-categories",
        json!({ "categories": [{"id": 5, "name": "Sports"}] }),
    );
    stub.respond(
        Method::Get,
        "/mate/v1/event-categories",
        json!({ "categories": [{"id": 5, "name": "Sports & Fitness"}] }),
    );
    let manager = signed_in(&stub);

    for _ in 0..2 {
        let (action, pending) = EventCategoryAction::synchronize_event_categories(1, 100);
        manager.dispatch(action);
        pending.await.expect("category sync");
    }

    let categories = manager
        .view_storage()
        .all::<StoredEventCategory>()
        .unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].category_id, 5);
    assert_eq!(categories[0].name, "Sports & Fitness");
}

#[tokio::test]
async fn place_search_transport_failure_is_unknown_with_no_rows() {
    let stub = StubNetwork::new();
    stub.fail(
        Method::Get,
        "/places/textsearch",
        NetworkError::Transport("connection reset".into()),
    );
    let manager = signed_in(&stub);

    let (action, pending) = GooglePlaceAction::search_places("park");
    manager.dispatch(action);

    let err = pending.await.expect_err("search should fail");
    assert!(
        matches!(
            err,
            DispatchError::Store(StoreError::Api(ApiError::Unknown { .. }))
        ),
        "got: {err:?}"
    );
    assert_eq!(
        manager.view_storage().count::<StoredGooglePlace>().unwrap(),
        0
    );
}

#[tokio::test]
async fn support_ticket_while_signed_out_is_dropped() {
    let stub = StubNetwork::new();
    let manager = signed_out(&stub);

    let (action, pending) = SupportAction::create_ticket(SupportTicket {
        subject: "Help".into(),
        message: "Please".into(),
        email: "me@example.com".into(),
        tags: Vec::new(),
    });
    manager.dispatch(action);

    assert!(matches!(pending.await, Err(DispatchError::Dropped)));
    assert!(stub.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_syncs_lose_no_updates() {
    let first: Vec<Value> = (1..=50).map(|id| event(id, "a", "published")).collect();
    let second: Vec<Value> = (26..=75).map(|id| event(id, "b", "published")).collect();
    let stub = StubNetwork::new().with_delay(Duration::from_millis(20));
    stub.respond(Method::Get, "/mate/v1/events", events_page(first));
    stub.respond(Method::Get, "/mate/v1/events", events_page(second));
    let manager = signed_in(&stub);

    let (a, b) = tokio::join!(sync_events(&manager, false), sync_events(&manager, false));
    a.expect("first sync");
    b.expect("second sync");

    assert_eq!(stored_event_ids(&manager), (1..=75).collect::<Vec<_>>());
}

#[tokio::test]
async fn overlapping_upserts_keep_latest_snapshot_per_id() {
    let stub = StubNetwork::new();
    let rounds = [
        vec![event(1, "r1", "published"), event(2, "r1", "published")],
        vec![event(2, "r2", "published"), event(3, "r2", "published")],
        vec![event(1, "r3", "draft"), event(3, "r3", "published")],
    ];
    for round in &rounds {
        stub.respond(Method::Get, "/mate/v1/events", events_page(round.clone()));
    }
    let manager = signed_in(&stub);

    for _ in &rounds {
        sync_events(&manager, false).await.expect("sync");
    }

    let view = manager.view_storage();
    assert_eq!(stored_event_ids(&manager), vec![1, 2, 3]);
    let title = |id: &str| view.load::<StoredEvent>(id).unwrap().expect("event").title;
    assert_eq!(title("1"), "r3");
    assert_eq!(title("2"), "r2");
    assert_eq!(title("3"), "r3");
}

#[tokio::test]
async fn transient_events_never_reach_storage() {
    let stub = StubNetwork::new();
    stub.respond(
        Method::Get,
        "/mate/v1/events",
        events_page(vec![event(1, "Real", "published"), event(2, "Feed", "importing")]),
    );
    let manager = signed_in(&stub);

    sync_events(&manager, true).await.expect("sync");

    assert_eq!(stored_event_ids(&manager), vec![1]);
}

#[tokio::test]
async fn completion_follows_commit() {
    let stub = StubNetwork::new();
    stub.respond(
        Method::Get,
        "/mate/v1/events",
        events_page(vec![event(9, "Visible", "published")]),
    );
    let manager = signed_in(&stub);

    sync_events(&manager, false).await.expect("sync");

    // No sleep: the record must already be committed.
    assert!(
        manager
            .view_storage()
            .load::<StoredEvent>("9")
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn actions_only_reach_stores_of_the_active_state() {
    let stub = StubNetwork::new();
    stub.respond(
        Method::Get,
        "/mate/v1/events",
        events_page(vec![event(1, "x", "published")]),
    );
    stub.respond(
        Method::Get,
        "/mate/v1/site-info",
        json!({"url": "https://a.example", "is_wordpress": true}),
    );
    let manager = signed_out(&stub);

    assert!(matches!(
        sync_events(&manager, false).await,
        Err(DispatchError::Dropped)
    ));

    manager
        .authenticate(Credentials::wpcom("mia", "tok", "https://mia.blog"))
        .expect("authenticate");
    sync_events(&manager, false).await.expect("sync after sign-in");

    let (action, pending) = SiteDiscoveryAction::fetch_site_info("a.example");
    manager.dispatch(action);
    assert!(matches!(pending.await, Err(DispatchError::Dropped)));

    // WordPress.com accounts get no Jetpack store.
    let (action, pending) = JetpackConnectionAction::fetch_connection_url();
    manager.dispatch(action);
    assert!(matches!(pending.await, Err(DispatchError::Dropped)));

    assert_eq!(stub.request_count("/mate/v1/site-info"), 0);
}

#[tokio::test]
async fn sign_out_stops_in_flight_syncs() {
    let stub = StubNetwork::new().with_delay(Duration::from_millis(200));
    stub.respond(
        Method::Get,
        "/mate/v1/events",
        events_page(vec![event(1, "Previous session", "published")]),
    );
    let manager = signed_in(&stub);

    let (action, pending) = EventAction::synchronize_events(1, 25, false);
    manager.dispatch(action);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stub.request_count("/mate/v1/events"), 1);

    manager.deauthenticate().expect("deauthenticate");

    assert!(matches!(pending.await, Err(DispatchError::Dropped)));
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(stored_event_ids(&manager).is_empty());
}

#[tokio::test]
async fn network_failure_passes_through_unchanged() {
    let stub = StubNetwork::new();
    let failure = NetworkError::Status {
        code: 500,
        message: "internal_error".into(),
    };
    stub.fail(Method::Get, "/mate/v1/events", failure.clone());
    let manager = signed_in(&stub);

    match sync_events(&manager, true).await {
        Err(DispatchError::Store(StoreError::Network(err))) => assert_eq!(err, failure),
        other => panic!("expected network error, got: {other:?}"),
    }
    assert!(stored_event_ids(&manager).is_empty());
}
