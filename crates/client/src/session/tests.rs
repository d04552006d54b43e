use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use storefront_core::{EntityId, Resource};
use storefront_products::{ProductDraft, Products};
use storefront_sales::{SaleDraft, Sales};

use super::*;
use crate::fake::{Reply, ScriptedTransport};
use crate::transport::Method;

const BAD1: &str = "http://bad1";
const BAD2: &str = "http://bad2";
const GOOD: &str = "http://good";

fn session_with(candidates: &[&str]) -> (Arc<ScriptedTransport>, EndpointSession) {
    let transport = Arc::new(ScriptedTransport::new());
    let config = SessionConfig::new(candidates.iter().copied()).unwrap();
    let session = EndpointSession::new(config, transport.clone());
    (transport, session)
}

fn products_url(base: &str) -> String {
    format!("{}/products", base)
}

fn lamp_list() -> Reply {
    Reply::Json(200, json!([{"id": 12, "name": "Lamp", "price": "45.50", "stock": 4}]))
}

fn widget() -> ProductDraft {
    ProductDraft {
        name: "Widget".to_string(),
        price: "9.99".to_string(),
        description: "d".to_string(),
        category: "c".to_string(),
        stock: "3".to_string(),
        imageurl: String::new(),
    }
}

fn refused() -> Reply {
    Reply::Fail(TransportError::Connect("connection refused".to_string()))
}

// ---- resolve ----------------------------------------------------------

#[tokio::test]
async fn resolve_finds_the_only_responsive_candidate_at_any_position() {
    let candidates = ["http://a", "http://b", "http://c"];

    for good in candidates {
        let (transport, session) = session_with(&candidates);
        transport.on(Method::Get, &products_url(good), lamp_list());

        assert_eq!(session.resolve().await, Resolution::Resolved(good.to_string()));
        assert_eq!(session.state(), SessionState::Online(good.to_string()));
    }
}

#[tokio::test(start_paused = true)]
async fn exhaustion_tries_every_candidate_once_in_order() {
    let (transport, session) = session_with(&[BAD1, BAD2, GOOD]);
    transport
        .on(Method::Get, &products_url(BAD1), refused())
        .on(Method::Get, &products_url(BAD2), Reply::Hang)
        .on(Method::Get, &products_url(GOOD), Reply::Json(500, json!({"message": "down"})));

    assert_eq!(session.resolve().await, Resolution::Exhausted);
    assert_eq!(session.state(), SessionState::Offline);
    assert_eq!(
        transport.call_log(),
        [
            "GET http://bad1/products",
            "GET http://bad2/products",
            "GET http://good/products",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_candidates_are_skipped() {
    let (transport, session) = session_with(&[BAD1, BAD2, GOOD]);
    transport
        .on(Method::Get, &products_url(BAD1), Reply::Hang)
        .on(Method::Get, &products_url(BAD2), Reply::Hang)
        .on(Method::Get, &products_url(GOOD), lamp_list());

    let started = tokio::time::Instant::now();
    assert_eq!(session.resolve().await, Resolution::Resolved(GOOD.to_string()));
    assert_eq!(session.state(), SessionState::Online("http://good".to_string()));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11));
}

#[tokio::test]
async fn resolve_while_online_is_idempotent() {
    let (transport, session) = session_with(&["http://a", "http://b"]);
    transport
        .once(Method::Get, &products_url("http://a"), refused())
        .on(Method::Get, &products_url("http://b"), lamp_list());

    assert_eq!(session.resolve().await, Resolution::Resolved("http://b".to_string()));
    let calls = transport.call_count();

    // "a" is reachable now, but nothing failed, so the active endpoint stays.
    transport.on(Method::Get, &products_url("http://a"), lamp_list());
    assert_eq!(session.resolve().await, Resolution::Resolved("http://b".to_string()));
    assert_eq!(transport.call_count(), calls);
}

#[tokio::test]
async fn connection_test_always_reprobes() {
    let (transport, session) = session_with(&["http://a", "http://b"]);
    transport
        .once(Method::Get, &products_url("http://a"), refused())
        .on(Method::Get, &products_url("http://b"), lamp_list());
    session.resolve().await;

    transport.on(Method::Get, &products_url("http://a"), lamp_list());
    assert_eq!(session.test_connection().await, Resolution::Resolved("http://a".to_string()));
    assert_eq!(session.state().active_endpoint(), Some("http://a"));
}

#[tokio::test]
async fn probe_uses_the_configured_resource() {
    let transport = Arc::new(ScriptedTransport::new());
    let config = SessionConfig::new([GOOD]).unwrap().with_probe_resource("sales");
    let session = EndpointSession::new(config, transport.clone());
    transport.on(Method::Get, "http://good/sales", Reply::Json(200, json!([])));

    assert_eq!(session.resolve().await, Resolution::Resolved(GOOD.to_string()));
    assert_eq!(transport.call_log(), ["GET http://good/sales"]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_resolves_share_one_cycle() {
    let (transport, session) = session_with(&[BAD1, GOOD]);
    transport
        .on(Method::Get, &products_url(BAD1), Reply::Hang)
        .on(Method::Get, &products_url(GOOD), lamp_list());

    let (a, b) = tokio::join!(session.resolve(), session.test_connection());

    assert_eq!(a, Resolution::Resolved(GOOD.to_string()));
    assert_eq!(b, Resolution::Resolved(GOOD.to_string()));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn closing_mid_resolution_discards_the_cycle() {
    let (transport, session) = session_with(&[BAD1, GOOD]);
    transport
        .on(Method::Get, &products_url(BAD1), Reply::Hang)
        .on(Method::Get, &products_url(GOOD), lamp_list());
    let session = Arc::new(session);

    let probing = {
        let session = session.clone();
        tokio::spawn(async move { session.resolve().await })
    };
    tokio::task::yield_now().await;
    session.close();

    assert_eq!(probing.await.unwrap(), Resolution::Cancelled);
    assert_eq!(session.state(), SessionState::Unresolved);
    assert!(transport.call_count() <= 1);
}

#[tokio::test]
async fn toggles_move_between_offline_and_online() {
    let (transport, session) = session_with(&[GOOD]);
    transport.on(Method::Get, &products_url(GOOD), lamp_list());
    let mut states = session.subscribe();

    session.go_offline();
    assert!(session.is_offline());
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Offline);

    assert_eq!(session.go_online().await, Resolution::Resolved(GOOD.to_string()));
    assert_eq!(*states.borrow_and_update(), SessionState::Online(GOOD.to_string()));
}

#[tokio::test(start_paused = true)]
async fn going_offline_mid_resolution_wins_over_the_cycle() {
    let (transport, session) = session_with(&[BAD1, GOOD]);
    transport
        .on(Method::Get, &products_url(BAD1), Reply::Hang)
        .on(Method::Get, &products_url(GOOD), lamp_list());
    let session = Arc::new(session);

    let probing = {
        let session = session.clone();
        tokio::spawn(async move { session.resolve().await })
    };
    tokio::task::yield_now().await;
    session.go_offline();

    assert_eq!(probing.await.unwrap(), Resolution::Superseded);
    assert_eq!(session.state(), SessionState::Offline);
    assert_eq!(transport.call_log(), ["GET http://bad1/products"]);
}

#[tokio::test(start_paused = true)]
async fn fetch_waiting_on_a_cycle_follows_the_offline_switch() {
    let (transport, session) = session_with(&[BAD1, GOOD]);
    transport
        .on(Method::Get, &products_url(BAD1), Reply::Hang)
        .on(Method::Get, &products_url(GOOD), lamp_list());
    let session = Arc::new(session);

    let fetching = {
        let session = session.clone();
        tokio::spawn(async move { session.fetch_collection::<Products>().await })
    };
    tokio::task::yield_now().await;
    session.go_offline();

    let fetched = fetching.await.unwrap();
    assert_eq!(fetched.source, DataSource::Offline);
    assert_eq!(fetched.items, Products::samples());
    assert!(session.is_offline());
}

// ---- fetch ------------------------------------------------------------

#[tokio::test]
async fn offline_fetch_returns_samples_without_network() {
    let (transport, session) = session_with(&[GOOD]);
    transport.on(Method::Get, &products_url(GOOD), lamp_list());
    session.go_offline();

    let fetched = session.fetch_collection::<Products>().await;

    assert_eq!(fetched.items, Products::samples());
    assert_eq!(fetched.source, DataSource::Offline);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn first_fetch_resolves_lazily_and_keeps_server_order() {
    let (transport, session) = session_with(&[BAD1, GOOD]);
    transport.on(
        Method::Get,
        "http://good/sales",
        Reply::Json(200, json!([{"id": 3, "customer": "C"}, {"id": 1, "customer": "A"}])),
    );
    transport.on(Method::Get, &products_url(GOOD), lamp_list());

    let fetched = session.fetch_collection::<Sales>().await;

    let ids: Vec<_> = fetched.items.iter().map(|s| s.id.to_string()).collect();
    assert_eq!(ids, ["3", "1"]);
    assert_eq!(fetched.source, DataSource::Remote { endpoint: GOOD.to_string() });
    assert_eq!(
        transport.call_log(),
        ["GET http://bad1/products", "GET http://good/products", "GET http://good/sales"]
    );
}

#[tokio::test]
async fn failed_fetch_reprobes_and_moves_to_another_endpoint() {
    let (transport, session) = session_with(&["http://a", "http://b"]);
    transport.on(Method::Get, &products_url("http://a"), lamp_list());
    session.resolve().await;

    // "a" goes away; "b" is up.
    transport
        .on(Method::Get, &products_url("http://a"), refused())
        .on(Method::Get, &products_url("http://b"), lamp_list());

    let fetched = session.fetch_collection::<Products>().await;

    assert_eq!(fetched.source, DataSource::Remote { endpoint: "http://b".to_string() });
    assert_eq!(fetched.items[0].name, "Lamp");
    assert_eq!(session.state(), SessionState::Online("http://b".to_string()));
}

#[tokio::test]
async fn failed_fetch_with_exhausted_reprobe_degrades_to_samples() {
    let (transport, session) = session_with(&[GOOD]);
    transport.once(Method::Get, &products_url(GOOD), lamp_list());
    session.resolve().await;

    let fetched = session.fetch_collection::<Products>().await;

    assert_eq!(fetched.items, Products::samples());
    assert_eq!(fetched.source, DataSource::Degraded(FailureReason::Exhausted));
    assert!(session.is_offline());
}

#[tokio::test]
async fn undecodable_collection_is_a_failed_fetch() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .on(Method::Get, "http://good/sales", Reply::Json(200, json!({"unexpected": true})));
    session.resolve().await;

    let fetched = session.fetch_collection::<Sales>().await;

    assert!(matches!(fetched.source, DataSource::Degraded(FailureReason::Decode(_))));
    assert_eq!(fetched.items, Sales::samples());
    // The probe still succeeds, so the session stays online.
    assert!(session.state().is_online());
}

// ---- create -----------------------------------------------------------

#[tokio::test]
async fn invalid_draft_never_touches_network_or_state() {
    let (transport, session) = session_with(&[GOOD]);
    let draft = ProductDraft { name: String::new(), ..widget() };

    let outcome = session.create_entity::<Products>(&draft).await;

    assert!(matches!(outcome, CreateOutcome::ValidationFailure(ref e) if e.contains("name")));
    assert_eq!(session.state(), SessionState::Unresolved);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn offline_create_is_local_only_without_network() {
    let (transport, session) = session_with(&[GOOD]);
    session.go_offline();

    let outcome = session.create_entity::<Products>(&widget()).await;

    assert_eq!(outcome.persistence(), Some(Persistence::LocalOnly));
    let product = outcome.entity().unwrap();
    assert!(product.id.is_local());
    assert_eq!(product.name, "Widget");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn online_create_returns_the_server_entity() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .on(
            Method::Post,
            &products_url(GOOD),
            Reply::Json(201, json!({"id": 77, "name": "Widget", "price": 9.99, "stock": 3})),
        );

    let outcome = session.create_entity::<Products>(&widget()).await;

    assert_eq!(outcome.persistence(), Some(Persistence::Remote));
    assert_eq!(outcome.entity().unwrap().id, EntityId::from(77));

    let post = transport.calls().into_iter().find(|c| c.method == Method::Post).unwrap();
    let body = post.body.unwrap();
    assert_eq!(body["price"], json!(9.99));
    assert_eq!(body["stock"], json!(3));
}

#[tokio::test]
async fn enveloped_create_response_is_unwrapped() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .on(
            Method::Post,
            &products_url(GOOD),
            Reply::Json(201, json!({"message": "ok", "data": {"id": 5, "name": "Widget", "price": "9.99", "stock": "3"}})),
        );

    let outcome = session.create_entity::<Products>(&widget()).await;
    assert_eq!(outcome.entity().unwrap().id, EntityId::from(5));
}

#[tokio::test]
async fn server_validation_errors_are_surfaced_without_retry() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, "http://good/products", lamp_list())
        .on(
            Method::Post,
            "http://good/sales",
            Reply::Json(
                422,
                json!({"message": "invalid", "errors": {"product_id": ["The selected product id is invalid."]}}),
            ),
        );

    let mut draft = SaleDraft::new();
    draft.customer = "Ana".to_string();
    draft.add_product(&Products::samples()[0]).unwrap();

    let outcome = session.create_entity::<Sales>(&draft).await;

    match outcome {
        CreateOutcome::ServerValidationFailure(errors) => {
            assert_eq!(errors.messages("product_id"), ["The selected product id is invalid."]);
        }
        other => panic!("expected server validation failure, got {:?}", other),
    }
    let posts = transport.calls().iter().filter(|c| c.method == Method::Post).count();
    assert_eq!(posts, 1);
}

#[tokio::test]
async fn failed_create_is_retried_once_after_reprobe() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .once(Method::Post, &products_url(GOOD), Reply::Json(503, json!({})))
        .on(
            Method::Post,
            &products_url(GOOD),
            Reply::Json(201, json!({"id": 8, "name": "Widget", "price": 9.99, "stock": 3})),
        );

    let outcome = session.create_entity::<Products>(&widget()).await;

    assert_eq!(outcome.persistence(), Some(Persistence::Remote));
    assert_eq!(
        transport.call_log(),
        [
            "GET http://good/products",
            "POST http://good/products",
            "GET http://good/products",
            "POST http://good/products",
        ]
    );
}

#[tokio::test]
async fn double_failure_offers_local_persistence() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .on(Method::Post, &products_url(GOOD), Reply::Json(500, json!({"message": "boom"})));

    let outcome = session.create_entity::<Products>(&widget()).await;

    let CreateOutcome::RemoteFailure { reason, pending } = outcome else {
        panic!("expected remote failure");
    };
    assert!(matches!(reason, FailureReason::Api { status: 500, .. }));
    assert!(session.state().is_online(), "state changes only if the caller accepts");

    let accepted = session.accept_local(pending);
    assert_eq!(accepted.persistence(), Some(Persistence::LocalOnly));
    assert!(session.is_offline());
}

#[tokio::test]
async fn discarding_a_failed_create_keeps_the_session_online() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .on(Method::Post, &products_url(GOOD), refused());

    let outcome = session.create_entity::<Products>(&widget()).await;

    match outcome {
        CreateOutcome::RemoteFailure { pending, .. } => pending.discard(),
        other => panic!("expected remote failure, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Online(GOOD.to_string()));
}

#[tokio::test]
async fn failed_create_with_no_server_left_waits_for_the_caller() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .once(Method::Get, &products_url(GOOD), lamp_list())
        .on(Method::Get, &products_url(GOOD), refused())
        .on(Method::Post, &products_url(GOOD), refused());

    let outcome = session.create_entity::<Products>(&widget()).await;

    let CreateOutcome::RemoteFailure { reason, pending } = outcome else {
        panic!("expected remote failure");
    };
    assert!(matches!(reason, FailureReason::Transport(TransportError::Connect(_))));
    assert_eq!(
        transport.call_log(),
        ["GET http://good/products", "POST http://good/products", "GET http://good/products"]
    );
    assert_eq!(session.state(), SessionState::Online(GOOD.to_string()));

    pending.discard();
    assert_eq!(session.state(), SessionState::Online(GOOD.to_string()));
}

#[tokio::test]
async fn accepting_after_no_server_left_goes_offline() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .once(Method::Get, &products_url(GOOD), lamp_list())
        .on(Method::Get, &products_url(GOOD), refused())
        .on(Method::Post, &products_url(GOOD), refused());

    let CreateOutcome::RemoteFailure { pending, .. } = session.create_entity::<Products>(&widget()).await
    else {
        panic!("expected remote failure");
    };
    assert!(session.state().is_online());

    let accepted = session.accept_local(pending);
    assert_eq!(accepted.persistence(), Some(Persistence::LocalOnly));
    assert!(accepted.entity().unwrap().id.is_local());
    assert_eq!(session.state(), SessionState::Offline);
}

#[tokio::test]
async fn create_after_exhausted_resolution_is_local_only() {
    let (transport, session) = session_with(&[BAD1, BAD2]);

    let outcome = session.create_entity::<Products>(&widget()).await;

    assert_eq!(outcome.persistence(), Some(Persistence::LocalOnly));
    assert!(session.is_offline());
    assert_eq!(transport.call_count(), 2);
}

// ---- delete -----------------------------------------------------------

#[tokio::test]
async fn online_delete_targets_the_item_url() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .on(Method::Delete, "http://good/products/12", Reply::Json(204, json!(null)));

    let outcome = session.delete_entity::<Products>(&EntityId::from(12)).await;

    assert_eq!(outcome, DeleteOutcome::Removed(Persistence::Remote));
}

#[tokio::test]
async fn failed_delete_is_reported_not_degraded() {
    let (transport, session) = session_with(&[GOOD]);
    transport
        .on(Method::Get, &products_url(GOOD), lamp_list())
        .on(Method::Delete, "http://good/products/12", Reply::Json(500, json!({})));
    session.resolve().await;

    let outcome = session.delete_entity::<Products>(&EntityId::from(12)).await;

    assert!(matches!(outcome, DeleteOutcome::RemoteFailure(FailureReason::Api { status: 500, .. })));
    assert_eq!(session.state(), SessionState::Online(GOOD.to_string()));
}

#[tokio::test]
async fn offline_and_local_deletes_skip_the_network() {
    let (transport, session) = session_with(&[GOOD]);
    transport.on(Method::Get, &products_url(GOOD), lamp_list());
    session.resolve().await;
    let calls = transport.call_count();

    let local = session.delete_entity::<Products>(&EntityId::local()).await;
    assert_eq!(local, DeleteOutcome::Removed(Persistence::LocalOnly));

    session.go_offline();
    let offline = session.delete_entity::<Products>(&EntityId::from(1)).await;
    assert_eq!(offline, DeleteOutcome::Removed(Persistence::LocalOnly));

    assert_eq!(transport.call_count(), calls);
}

#[test]
fn sample_sets_are_static() {
    assert_eq!(Products::samples(), Products::samples());
    assert_eq!(Sales::samples().len(), 3);
}
