//! HTTP submitter and probe against a mock register server.

use std::time::Duration;

use medtill_core::{Cart, CommittedSale, Tender};
use medtill_db::{CommitRequest, Database, DbConfig};
use medtill_sync::{
    ConnectivityProbe, HttpProbe, HttpSaleSubmitter, SaleIntent, SaleSubmitter, SyncError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn intent() -> SaleIntent {
    let mut cart = Cart::new();
    cart.add_freeform_item("Vaccination", 1, 2500, true, 80).unwrap();
    SaleIntent::new("drawer-1", "session-1", cart, Tender::cash(500))
}

/// A real committed sale, serialized the way the server sends it.
async fn committed_sale(intent: &SaleIntent) -> CommittedSale {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let drawer = db.drawers().create("owner", "Main").await.unwrap();
    let session = db.sessions().start(&drawer.id, Some(0), None).await.unwrap();
    db.sales()
        .commit(&CommitRequest {
            session_id: session.id,
            cart: intent.cart.clone(),
            tender: intent.tender,
            customer_ref: None,
            idempotency_key: Some(intent.idempotency_key.clone()),
        })
        .await
        .unwrap()
}

fn submitter(server: &MockServer) -> HttpSaleSubmitter {
    HttpSaleSubmitter::new(&server.uri(), Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn commit_sends_idempotency_key_and_parses_sale() {
    let server = MockServer::start().await;
    let intent = intent();
    let sale = committed_sale(&intent).await;

    Mock::given(method("POST"))
        .and(path("/sessions/session-1/sales"))
        .and(header("Idempotency-Key", intent.idempotency_key.as_str()))
        .and(body_partial_json(json!({
            "idempotencyKey": intent.idempotency_key,
            "tender": { "cashCents": 500, "cardCents": 0 }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(&sale))
        .expect(1)
        .mount(&server)
        .await;

    let result = submitter(&server).commit(&intent).await.unwrap();
    assert_eq!(result, sale);
    assert_eq!(result.sale.patient_due_cents, 500);
}

#[tokio::test]
async fn conflict_is_a_deterministic_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "CONFLICT",
            "message": "Session closed: session session-1 no longer accepts changes"
        })))
        .mount(&server)
        .await;

    let err = submitter(&server).commit(&intent()).await.unwrap_err();
    assert!(matches!(err, SyncError::Rejected { status: 409, .. }));
    assert!(err.is_session_closed());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn insufficient_payment_carries_shortfall() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "code": "INSUFFICIENT_PAYMENT",
            "message": "Insufficient payment: 500 due, 400 tendered, 100 short",
            "shortfallCents": 100
        })))
        .mount(&server)
        .await;

    let err = submitter(&server).commit(&intent()).await.unwrap_err();
    match err {
        SyncError::Rejected {
            code,
            shortfall_cents,
            ..
        } => {
            assert_eq!(code, "INSUFFICIENT_PAYMENT");
            assert_eq!(shortfall_cents, Some(100));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn server_errors_and_timeouts_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/session-1/sales"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "code": "TRANSIENT",
            "message": "database is locked"
        })))
        .mount(&server)
        .await;

    let err = submitter(&server).commit(&intent()).await.unwrap_err();
    assert!(matches!(err, SyncError::ServerUnavailable { status: 503, .. }));
    assert!(err.is_retryable());

    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
        .mount(&slow)
        .await;

    let err = submitter(&slow).commit(&intent()).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn internal_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "code": "INTERNAL",
            "message": "Database operation failed"
        })))
        .mount(&server)
        .await;

    let err = submitter(&server).commit(&intent()).await.unwrap_err();
    match &err {
        SyncError::Rejected { status, code, .. } => {
            assert_eq!(*status, 500);
            assert_eq!(code, "INTERNAL");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(!err.is_retryable());

    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&gateway)
        .await;

    let err = submitter(&gateway).commit(&intent()).await.unwrap_err();
    assert!(matches!(err, SyncError::ServerUnavailable { status: 502, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn find_by_key_maps_not_found_to_none() {
    let server = MockServer::start().await;
    let intent = intent();
    let sale = committed_sale(&intent).await;

    Mock::given(method("GET"))
        .and(path(format!("/sales/by-key/{}", intent.idempotency_key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&sale))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sales/by-key/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "NOT_FOUND",
            "message": "Sale not found: unknown"
        })))
        .mount(&server)
        .await;

    let submitter = submitter(&server);
    let found = submitter.find_by_key(&intent.idempotency_key).await.unwrap();
    assert_eq!(found.map(|s| s.sale.id), Some(sale.sale.id));
    assert!(submitter.find_by_key("unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn probe_follows_health_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(&server.uri(), Duration::from_millis(500)).unwrap();
    assert!(probe.is_online().await);

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&down)
        .await;
    let probe = HttpProbe::new(&down.uri(), Duration::from_millis(500)).unwrap();
    assert!(!probe.is_online().await);
}
