//! Background scheduling of sync attempts.

use crate::connectivity::ConnectivityMonitor;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::state::SyncOutcome;
use crate::store::OutboxStore;
use crate::transport::SyncTransport;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

enum Command {
    ForceSync(oneshot::Sender<SyncOutcome>),
    Shutdown,
}

/// Spawns the task that decides when the engine runs.
///
/// Triggers:
/// - an `offline -> online` edge runs an attempt immediately
/// - the periodic interval runs one, unless offline or inside a backoff window
/// - the backoff timer runs one once the window closes, if online
/// - [`SyncHandle::force_sync`] always runs one
///
/// An attempt also runs at startup when the monitor already reports online.
/// A skipped periodic tick still republishes the outbox counts.
pub struct SyncScheduler<T: SyncTransport, S: OutboxStore> {
    engine: Arc<SyncEngine<T, S>>,
    monitor: Arc<ConnectivityMonitor>,
    commands: mpsc::Receiver<Command>,
    edges: broadcast::Receiver<()>,
}

impl<T, S> SyncScheduler<T, S>
where
    T: SyncTransport + 'static,
    S: OutboxStore + 'static,
{
    /// Starts the scheduler on the current tokio runtime.
    pub fn spawn(engine: Arc<SyncEngine<T, S>>, monitor: Arc<ConnectivityMonitor>) -> SyncHandle {
        let (tx, commands) = mpsc::channel(8);
        // Subscribe before spawning so no edge is missed.
        let edges = monitor.subscribe();
        let scheduler = Self {
            engine,
            monitor,
            commands,
            edges,
        };
        let task = tokio::spawn(scheduler.run());
        SyncHandle { tx, task }
    }

    async fn run(mut self) {
        info!(device = %self.engine.config().device_id, "sync scheduler started");
        let mut ticker = self.engine.config().sync_interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        let mut edges_open = true;
        let mut consumed: Option<Instant> = None;

        if self.monitor.is_online() {
            self.engine.sync_now().await;
        }

        loop {
            let retry_at = self
                .engine
                .retry_deadline()
                .filter(|deadline| Some(*deadline) != consumed);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::ForceSync(reply)) => {
                        debug!("forced sync");
                        let outcome = self.engine.sync_now().await;
                        // The caller may have stopped waiting.
                        let _ = reply.send(outcome);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                edge = self.edges.recv(), if edges_open => match edge {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        debug!("online edge");
                        self.engine.sync_now().await;
                    }
                    Err(RecvError::Closed) => edges_open = false,
                },
                _ = next_tick(&mut ticker) => {
                    if !self.monitor.is_online() {
                        debug!("periodic sync skipped, offline");
                        self.engine.refresh_counts();
                    } else if self.engine.in_backoff() {
                        debug!("periodic sync skipped, backing off");
                        self.engine.refresh_counts();
                    } else {
                        self.engine.sync_now().await;
                    }
                }
                _ = sleep_until(retry_at), if retry_at.is_some() => {
                    consumed = retry_at;
                    if self.monitor.is_online() {
                        debug!("backoff elapsed, retrying");
                        self.engine.sync_now().await;
                    } else {
                        debug!("backoff elapsed while offline, waiting for connectivity");
                    }
                }
            }
        }
        info!("sync scheduler stopped");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Control handle for a running [`SyncScheduler`].
#[derive(Debug)]
pub struct SyncHandle {
    tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Runs an attempt now, regardless of connectivity or backoff, and
    /// waits for its outcome.
    pub async fn force_sync(&self) -> SyncResult<SyncOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(Command::ForceSync(reply))
            .await
            .map_err(|_| SyncError::SchedulerStopped)?;
        outcome.await.map_err(|_| SyncError::SchedulerStopped)
    }

    /// Returns true once the scheduler task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the scheduler after any attempt in progress.
    pub async fn shutdown(self) {
        // A closed channel means the task already exited.
        let _ = self.tx.send(Command::Shutdown).await;
        let _ = self.task.await;
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::ForceSync(_) => f.write_str("ForceSync"),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, SyncConfig};
    use crate::state::SyncState;
    use crate::transport::{MockStep, MockTransport};
    use offsync_core::Database;
    use serde_json::json;
    use std::time::Duration;

    type Engine = SyncEngine<Arc<MockTransport>, Arc<Database>>;

    fn setup(config: SyncConfig) -> (Arc<Database>, Arc<MockTransport>, Arc<Engine>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let transport = Arc::new(MockTransport::new());
        let engine = Arc::new(SyncEngine::new(
            config,
            Arc::clone(&transport),
            Arc::clone(&db),
        ));
        (db, transport, engine)
    }

    fn config() -> SyncConfig {
        SyncConfig::new("d-1", "http://remote")
            .without_sync_interval()
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetryConfig::new(Duration::from_secs(2)).with_jitter(false))
    }

    #[tokio::test(start_paused = true)]
    async fn online_edge_triggers_attempt() {
        let (db, transport, engine) = setup(config());
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let handle = SyncScheduler::spawn(Arc::clone(&engine), Arc::clone(&monitor));

        db.put("clients", "c-1", json!({})).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.calls(), 0);

        let mut status = engine.subscribe();
        monitor.set_online(true);
        status
            .wait_for(|s| s.state == SyncState::Synced)
            .await
            .unwrap();
        assert_eq!(db.pending_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_timer_retries() {
        let (db, transport, engine) = setup(config());
        db.put("clients", "c-1", json!({})).unwrap();
        transport.push_step(MockStep::Fail("unreachable".into()));
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let handle = SyncScheduler::spawn(Arc::clone(&engine), monitor);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.status().state, SyncState::RetryWait);
        assert_eq!(db.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(transport.calls(), 2);
        assert_eq!(db.pending_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_for_connectivity() {
        let (db, transport, engine) = setup(config());
        db.put("clients", "c-1", json!({})).unwrap();
        transport.push_step(MockStep::Fail("unreachable".into()));
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let handle = SyncScheduler::spawn(Arc::clone(&engine), Arc::clone(&monitor));

        tokio::time::sleep(Duration::from_millis(500)).await;
        monitor.set_online(false);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.calls(), 1);

        monitor.set_online(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.calls(), 2);
        assert_eq!(db.pending_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sync_skips_while_offline() {
        let (db, transport, engine) = setup(config().with_sync_interval(Duration::from_secs(30)));
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let handle = SyncScheduler::spawn(Arc::clone(&engine), Arc::clone(&monitor));
        db.put("clients", "c-1", json!({})).unwrap();

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(transport.calls(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn skipped_tick_publishes_offline_writes() {
        let (db, _transport, engine) = setup(config().with_sync_interval(Duration::from_secs(30)));
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let handle = SyncScheduler::spawn(Arc::clone(&engine), monitor);
        let mut status = engine.subscribe();

        db.put("clients", "c-1", json!({})).unwrap();
        db.put("clients", "c-2", json!({})).unwrap();
        assert_eq!(status.borrow_and_update().pending_count, 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(status.has_changed().unwrap());
        assert_eq!(status.borrow_and_update().pending_count, 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_sync_drains_new_writes() {
        let (db, transport, engine) = setup(config().with_sync_interval(Duration::from_secs(30)));
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let handle = SyncScheduler::spawn(Arc::clone(&engine), monitor);

        tokio::time::sleep(Duration::from_secs(1)).await;
        db.put("clients", "c-1", json!({})).unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(transport.calls(), 1);
        assert_eq!(db.pending_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn force_sync_ignores_backoff() {
        let (db, transport, engine) = setup(config());
        db.put("clients", "c-1", json!({})).unwrap();
        transport.push_step(MockStep::Fail("unreachable".into()));
        let monitor = Arc::new(ConnectivityMonitor::new(false));
        let handle = SyncScheduler::spawn(Arc::clone(&engine), monitor);

        let first = handle.force_sync().await.unwrap();
        assert!(!first.success);
        assert!(engine.in_backoff());

        let second = handle.force_sync().await.unwrap();
        assert!(second.success);
        assert_eq!(db.pending_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn stopped_scheduler_refuses_commands() {
        let (_db, _transport, engine) = setup(config());
        let handle = SyncScheduler::spawn(engine, Arc::new(ConnectivityMonitor::new(false)));
        handle.tx.send(Command::Shutdown).await.unwrap();
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            handle.force_sync().await,
            Err(SyncError::SchedulerStopped)
        ));
    }
}
