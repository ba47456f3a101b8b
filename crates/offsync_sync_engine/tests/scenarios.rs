//! End-to-end scenarios: local store, engine, scheduler and the reference
//! remote wired together in process.

use offsync_core::{Database, MutationKind, SyncEvent};
use offsync_sync_engine::{
    ConnectivityMonitor, HttpTransport, LoopbackClient, MockStep, MockTransport, RetryConfig,
    SyncConfig, SyncEngine, SyncError, SyncResult, SyncScheduler, SyncState, SyncTransport,
};
use offsync_sync_protocol::{EventResult, PushRequest, PushResponse};
use offsync_sync_server::{ServerConfig, SyncServer};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Loopback = HttpTransport<LoopbackClient<SyncServer>>;

fn config() -> SyncConfig {
    SyncConfig::new("front-desk-1", "http://remote.test")
        .without_sync_interval()
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryConfig::new(Duration::from_secs(2)).with_jitter(false))
}

fn loopback(server: &SyncServer) -> Loopback {
    HttpTransport::new("http://remote.test", LoopbackClient::new(server.clone()))
}

fn client_event(record: &str, timestamp: u64) -> SyncEvent {
    SyncEvent::new(
        MutationKind::create("clients"),
        record,
        json!({"name": record}),
        timestamp,
    )
}

#[tokio::test]
async fn missing_verdict_isolates_one_event() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let first = db.put("clients", "c-1", json!({})).unwrap();
    let second = db.put("clients", "c-2", json!({})).unwrap();
    let third = db.put("clients", "c-3", json!({})).unwrap();

    let transport = MockTransport::new();
    transport.push_step(MockStep::respond(move |req| {
        PushResponse::new(
            req.events
                .iter()
                .filter(|e| e.id != second)
                .map(|e| EventResult::ack(e.id))
                .collect(),
        )
    }));
    let engine = SyncEngine::new(config(), transport, Arc::clone(&db));

    let outcome = engine.sync_now().await;
    assert!(!outcome.success);
    assert_eq!(outcome.acknowledged, 2);
    assert_eq!(outcome.deferred, 1);

    let pending: Vec<_> = db.list_pending().into_iter().map(|e| e.id).collect();
    assert_eq!(pending, vec![second]);
    assert!(db.get_event(&first).unwrap().is_synced());
    assert!(db.get_event(&third).unwrap().is_synced());
    assert!(db.get("clients", "c-1").unwrap().synced);
    assert!(!db.get("clients", "c-2").unwrap().synced);
    assert!(db.get("clients", "c-3").unwrap().synced);
    assert_eq!(engine.status().state, SyncState::RetryWait);

    let retry = engine.sync_now().await;
    assert!(retry.success);
    assert_eq!(retry.attempted, 1);
    assert_eq!(db.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn offline_writes_drain_when_connectivity_returns() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let server = SyncServer::new(ServerConfig::default());
    let engine = Arc::new(SyncEngine::new(config(), loopback(&server), Arc::clone(&db)));
    let monitor = Arc::new(ConnectivityMonitor::new(false));
    let handle = SyncScheduler::spawn(Arc::clone(&engine), Arc::clone(&monitor));

    let a = client_event("a", 1);
    let b = client_event("b", 2);
    let (a_id, b_id) = (a.id, b.id);
    assert!(db.append_event(a).unwrap());
    assert!(db.append_event(b).unwrap());
    assert_eq!(engine.status().pending_count, 2);

    let mut status = engine.subscribe();
    monitor.set_online(true);
    status
        .wait_for(|s| s.state == SyncState::Synced)
        .await
        .unwrap();

    assert_eq!(engine.status().pending_count, 0);
    assert!(engine.status().last_synced_at.is_some());
    assert_eq!(server.authority().applied(), vec![a_id, b_id]);
    assert!(db.get("clients", "a").unwrap().synced);
    assert!(db.get("clients", "b").unwrap().synced);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_event_pending_until_forced() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let transport = Arc::new(MockTransport::new());
    transport.push_step(MockStep::Stall(Duration::from_secs(120)));
    let engine = Arc::new(SyncEngine::new(
        config(),
        Arc::clone(&transport),
        Arc::clone(&db),
    ));
    let handle = SyncScheduler::spawn(
        Arc::clone(&engine),
        Arc::new(ConnectivityMonitor::new(false)),
    );

    db.append_event(client_event("c", 3)).unwrap();

    let outcome = handle.force_sync().await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("operation timed out"));

    let status = engine.status();
    assert_eq!(status.pending_count, 1);
    assert_eq!(status.state, SyncState::RetryWait);
    assert!(status.next_retry_at.is_some());
    assert_eq!(status.consecutive_failures, 1);
    assert!(engine.in_backoff());

    let outcome = handle.force_sync().await.unwrap();
    assert!(outcome.success);
    assert_eq!(engine.status().pending_count, 0);
    assert!(engine.status().last_error.is_none());
    assert_eq!(transport.calls(), 2);
    handle.shutdown().await;
}

#[tokio::test]
async fn order_holds_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store");

    let first = {
        let db = Arc::new(Database::open(&path).unwrap());
        let id = db.put("clients", "c-1", json!({"visits": 1})).unwrap();
        let transport = MockTransport::new();
        transport.push_step(MockStep::Fail("no route to host".into()));
        let engine = SyncEngine::new(config(), transport, Arc::clone(&db));
        assert!(!engine.sync_now().await.success);
        id
    };

    let db = Arc::new(Database::open(&path).unwrap());
    let second = db.put("clients", "c-1", json!({"visits": 2})).unwrap();
    let engine = SyncEngine::new(config(), MockTransport::new(), Arc::clone(&db));
    assert!(engine.sync_now().await.success);

    let sent: Vec<_> = engine.transport().requests()[0]
        .events
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(sent, vec![first, second]);
    assert!(db.get("clients", "c-1").unwrap().synced);
}

#[tokio::test]
async fn pending_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store");
    let id = {
        let db = Database::open(&path).unwrap();
        db.put("checkins", "k-1", json!({"client": "c-1"})).unwrap()
    };

    let db = Arc::new(Database::open(&path).unwrap());
    assert_eq!(db.list_pending()[0].id, id);
    let server = SyncServer::new(ServerConfig::default());
    let engine = SyncEngine::new(config(), loopback(&server), Arc::clone(&db));
    assert!(engine.sync_now().await.success);
    assert_eq!(
        server.authority().record("checkins", "k-1"),
        Some(json!({"client": "c-1"}))
    );
}

/// Lets the remote apply a batch, then loses the response once.
struct LossyTransport {
    inner: Loopback,
    lose_next: AtomicBool,
}

impl SyncTransport for LossyTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let response = self.inner.push(request).await?;
        if self.lose_next.swap(false, Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("connection reset"));
        }
        Ok(response)
    }
}

#[tokio::test]
async fn redelivery_is_applied_once() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let server = SyncServer::new(ServerConfig::default());
    let transport = LossyTransport {
        inner: loopback(&server),
        lose_next: AtomicBool::new(true),
    };
    let engine = SyncEngine::new(config(), transport, Arc::clone(&db));
    let id = db.put("clients", "c-1", json!({"name": "Ana"})).unwrap();

    assert!(!engine.sync_now().await.success);
    assert_eq!(db.pending_count(), 1);
    assert_eq!(server.authority().applied(), vec![id]);

    assert!(engine.sync_now().await.success);
    assert_eq!(db.pending_count(), 0);
    assert_eq!(server.authority().applied(), vec![id]);
    assert_eq!(server.authority().event_count(), 1);
}

#[tokio::test]
async fn create_then_delete_applies_cleanly() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let create = db.put("clients", "c-1", json!({"name": "Ana"})).unwrap();
    let delete = db.delete("clients", "c-1").unwrap();
    assert!(db.get("clients", "c-1").is_none());

    let server = SyncServer::new(ServerConfig::default());
    let engine = SyncEngine::new(config(), loopback(&server), Arc::clone(&db));
    let outcome = engine.sync_now().await;

    assert!(outcome.success);
    assert_eq!(outcome.acknowledged, 2);
    assert_eq!(outcome.rejected, 0);
    assert_eq!(server.authority().applied(), vec![create, delete]);
    assert_eq!(server.authority().record("clients", "c-1"), None);
}

#[tokio::test]
async fn rejected_event_does_not_block_others() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.put("clients", "c-1", json!({"name": "Ana"})).unwrap();
    let bad = db.put("clients", "c-2", json!("not an object")).unwrap();
    db.put("clients", "c-3", json!({"name": "Cy"})).unwrap();

    let server = SyncServer::new(ServerConfig::default());
    let engine = SyncEngine::new(config(), loopback(&server), Arc::clone(&db));
    let outcome = engine.sync_now().await;

    assert!(outcome.success);
    assert_eq!((outcome.acknowledged, outcome.rejected), (2, 1));
    assert_eq!(db.pending_count(), 0);
    assert_eq!(db.failed_count(), 1);
    let failed = db.get_event(&bad).unwrap();
    assert_eq!(failed.status.label(), "failed");
    assert!(!db.get("clients", "c-2").unwrap().synced);
    assert_eq!(engine.status().failed_count, 1);

    assert!(engine.sync_now().await.success);
    assert_eq!(server.authority().event_count(), 3);
}

#[tokio::test]
async fn clear_synced_keeps_pending() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    for i in 0..5 {
        db.put("clients", &format!("c-{i}"), json!({})).unwrap();
    }
    let engine = SyncEngine::new(config(), MockTransport::new(), Arc::clone(&db));
    assert!(engine.sync_now().await.success);

    db.put("clients", "late-1", json!({})).unwrap();
    db.put("clients", "late-2", json!({})).unwrap();

    assert_eq!(db.clear_synced().unwrap(), 5);
    let remaining = db.list_events();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|e| e.is_pending()));
    assert_eq!(db.get_all("clients").len(), 7);
}
