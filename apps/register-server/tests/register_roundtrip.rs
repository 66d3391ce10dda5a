//! A register client talking to a live server over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use medtill_core::{Cart, Session, Tender};
use medtill_db::{Database, DbConfig};
use medtill_sync::{
    ManualProbe, QueueConfig, QueueReason, RegisterClient, RegisterClientBuilder, SaleIntent,
    Submission,
};
use register_server::{router, AppState};
use tokio::net::TcpListener;

async fn serve() -> (SocketAddr, AppState) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let state = AppState::new(db, 16);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn open_session(state: &AppState) -> Session {
    let drawer = state.db().drawers().create("clinic-1", "Front").await.unwrap();
    state
        .db()
        .sessions()
        .start(&drawer.id, Some(2000), None)
        .await
        .unwrap()
}

async fn client(addr: SocketAddr, probe: Arc<ManualProbe>) -> RegisterClient {
    let mut config = QueueConfig::default();
    config.server.url = Some(format!("http://{}", addr));
    config.queue.initial_backoff_ms = 1;
    config.queue.max_backoff_ms = 2;

    RegisterClientBuilder::new(config)
        .with_database(Database::new(DbConfig::in_memory()).await.unwrap())
        .with_probe(probe)
        .build()
        .await
        .unwrap()
}

fn intent(session: &Session, cents: i64, cash: i64) -> SaleIntent {
    let mut cart = Cart::new();
    cart.add_freeform_item("Consultation", 1, cents, false, 0).unwrap();
    SaleIntent::new(
        session.drawer_id.clone(),
        session.id.clone(),
        cart,
        Tender::cash(cash),
    )
}

#[tokio::test]
async fn online_sale_commits_through_http() {
    let (addr, state) = serve().await;
    let session = open_session(&state).await;
    let client = client(addr, Arc::new(ManualProbe::new(true))).await;
    let mut announced = state.subscribe_sales();

    let sale = intent(&session, 1200, 2000);
    let key = sale.idempotency_key.clone();

    match client.submit(sale).await.unwrap() {
        Submission::Committed(committed) => {
            assert!(!committed.replayed);
            assert_eq!(committed.sale.sale_number, 1);
            assert_eq!(committed.payment.change_given_cents, 800);
        }
        other => panic!("expected commit, got {:?}", other),
    }

    assert_eq!(announced.recv().await.unwrap().sale.idempotency_key.as_deref(), Some(key.as_str()));

    let found = client.lookup(&key).await.unwrap().unwrap();
    assert!(found.replayed);
    assert!(client.lookup("never-sent").await.unwrap().is_none());
}

#[tokio::test]
async fn offline_sales_replay_once_when_back_online() {
    let (addr, state) = serve().await;
    let session = open_session(&state).await;
    let probe = Arc::new(ManualProbe::new(false));
    let client = client(addr, probe.clone()).await;

    let first = intent(&session, 500, 500);
    let second = intent(&session, 700, 1000);

    for sale in [first.clone(), second.clone()] {
        match client.submit(sale).await.unwrap() {
            Submission::Queued(receipt) => assert_eq!(receipt.reason, QueueReason::Offline),
            other => panic!("expected queued, got {:?}", other),
        }
    }
    assert_eq!(client.counts().await.unwrap().pending, 2);

    probe.set_online(true);
    let report = client.drain_now().await.unwrap();
    assert_eq!(report.committed, 2);
    assert_eq!(report.dead_lettered, 0);

    let sales = state.db().sales().list_for_session(&session.id).await.unwrap();
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].sale.idempotency_key.as_deref(), Some(first.idempotency_key.as_str()));
    assert_eq!(sales[1].sale.idempotency_key.as_deref(), Some(second.idempotency_key.as_str()));

    // A second pass finds nothing left to send
    let report = client.drain_now().await.unwrap();
    assert_eq!(report.committed, 0);
    assert_eq!(state.db().sales().list_for_session(&session.id).await.unwrap().len(), 2);

    let report = state.db().sessions().report(&session.id).await.unwrap();
    assert_eq!(report.expected_cash_cents, 2000 + 500 + 700);
}

#[tokio::test]
async fn closed_session_dead_letters_on_replay() {
    let (addr, state) = serve().await;
    let session = open_session(&state).await;
    let probe = Arc::new(ManualProbe::new(false));
    let client = client(addr, probe.clone()).await;

    client.submit(intent(&session, 900, 900)).await.unwrap();
    state.db().sessions().close(&session.id, 2000, None).await.unwrap();

    probe.set_online(true);
    let report = client.drain_now().await.unwrap();
    assert_eq!(report.dead_lettered, 1);

    let dead = client.dead_letters().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert!(dead[0]
        .last_error
        .as_deref()
        .unwrap_or_default()
        .contains("Session closed"));
}
