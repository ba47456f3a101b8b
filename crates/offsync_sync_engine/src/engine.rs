//! The sync engine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::state::{SyncOutcome, SyncState};
use crate::status::{StatusReporter, SyncStatus};
use crate::store::OutboxStore;
use crate::transport::SyncTransport;
use chrono::Utc;
use offsync_core::SyncEvent;
use offsync_sync_protocol::{AckStatus, PushRequest};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Failure reason recorded for an event the remote refuses even alone.
pub const TOO_LARGE_REASON: &str = "too large for the remote";

/// Drains the outbox against the remote.
///
/// At most one attempt runs at a time. A call to [`sync_now`](Self::sync_now)
/// that arrives while an attempt is in flight waits for it and returns its
/// outcome instead of starting a second network session.
///
/// The engine never fails: every outcome, including local store errors,
/// is reported through [`SyncOutcome`] and the status.
pub struct SyncEngine<T: SyncTransport, S: OutboxStore> {
    config: SyncConfig,
    transport: T,
    store: S,
    gate: tokio::sync::Mutex<()>,
    completed: AtomicU64,
    last_outcome: Mutex<Option<SyncOutcome>>,
    retry_deadline: Mutex<Option<Instant>>,
    status: StatusReporter,
}

impl<T: SyncTransport, S: OutboxStore> SyncEngine<T, S> {
    /// Creates an engine.
    pub fn new(config: SyncConfig, transport: T, store: S) -> Self {
        let status = StatusReporter::new(SyncStatus {
            pending_count: store.pending_count(),
            failed_count: store.failed_count(),
            ..SyncStatus::default()
        });
        Self {
            config,
            transport,
            store,
            gate: tokio::sync::Mutex::new(()),
            completed: AtomicU64::new(0),
            last_outcome: Mutex::new(None),
            retry_deadline: Mutex::new(None),
            status,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The outbox store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current status with counts read fresh from the outbox.
    pub fn status(&self) -> SyncStatus {
        let mut status = self.status.snapshot();
        status.pending_count = self.store.pending_count();
        status.failed_count = self.store.failed_count();
        status
    }

    /// Receiver notified on every engine state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Republishes outbox counts to [`subscribe`](Self::subscribe) receivers.
    ///
    /// Attempts publish counts on their own and the scheduler calls this on
    /// skipped periodic ticks. Call it after a local write to publish the
    /// new count at once.
    pub fn refresh_counts(&self) {
        let pending = self.store.pending_count();
        let failed = self.store.failed_count();
        self.status.update(|s| {
            s.pending_count = pending;
            s.failed_count = failed;
        });
    }

    /// Outcome of the most recent attempt.
    pub fn last_outcome(&self) -> Option<SyncOutcome> {
        self.last_outcome.lock().clone()
    }

    /// When the backoff window closes, if one is open or pending.
    pub fn retry_deadline(&self) -> Option<Instant> {
        *self.retry_deadline.lock()
    }

    /// Returns true while a backoff window is open.
    pub fn in_backoff(&self) -> bool {
        self.retry_deadline()
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    /// Runs one attempt, or joins the one in flight.
    pub async fn sync_now(&self) -> SyncOutcome {
        let seen = self.completed.load(Ordering::SeqCst);
        let _gate = self.gate.lock().await;

        if self.completed.load(Ordering::SeqCst) != seen {
            let joined = self.last_outcome.lock().clone();
            if let Some(outcome) = joined {
                debug!("joined in-flight sync attempt");
                return outcome;
            }
        }

        let outcome = self.run_attempt().await;
        *self.last_outcome.lock() = Some(outcome.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn run_attempt(&self) -> SyncOutcome {
        let started = Instant::now();
        self.status.update(|s| {
            s.in_flight = true;
            s.state = SyncState::Pushing;
            s.last_attempt_at = Some(Utc::now());
        });

        let mut outcome = SyncOutcome::default();
        let result = self.push_pending(&mut outcome).await;
        outcome.deferred = outcome
            .attempted
            .saturating_sub(outcome.acknowledged + outcome.rejected);
        outcome.duration = started.elapsed();

        match result {
            Ok(()) => {
                outcome.success = true;
                self.on_success(&outcome);
            }
            Err(e) => {
                outcome.error = Some(e.to_string());
                outcome.retryable = e.is_retryable();
                self.on_failure(&outcome);
            }
        }
        outcome
    }

    /// Sends the pending snapshot in order, one chunk per request.
    ///
    /// Stops at the first chunk that fails or is answered only in part,
    /// so a later chunk never overtakes an earlier one. A chunk the remote
    /// refuses as too large is halved and resent; a single event it still
    /// refuses is marked failed so it cannot block the events behind it.
    async fn push_pending(&self, outcome: &mut SyncOutcome) -> SyncResult<()> {
        let pending = self.store.list_pending()?;
        outcome.attempted = pending.len();
        if pending.is_empty() {
            debug!("outbox empty, nothing to push");
            return Ok(());
        }

        let mut batch_size = self.config.push_batch_size.max(1);
        let mut start = 0;
        while start < pending.len() {
            let chunk = &pending[start..pending.len().min(start + batch_size)];
            let request = PushRequest::new(
                self.config.device_id.clone(),
                chunk.iter().map(SyncEvent::to_envelope).collect(),
            );
            debug!(events = chunk.len(), "pushing batch");

            let sent = tokio::time::timeout(self.config.timeout, self.transport.push(&request))
                .await
                .unwrap_or(Err(SyncError::Timeout));
            let response = match sent {
                Err(SyncError::BatchTooLarge { .. }) if chunk.len() > 1 => {
                    batch_size = chunk.len() / 2;
                    debug!(refused = chunk.len(), batch_size, "remote refused batch, splitting");
                    continue;
                }
                Err(SyncError::BatchTooLarge { .. }) => {
                    let event = &chunk[0];
                    warn!(event = %event.id, kind = %event.kind, "event too large for the remote");
                    self.store.mark_failed(&event.id, TOO_LARGE_REASON)?;
                    outcome.rejected += 1;
                    start += 1;
                    continue;
                }
                other => other?,
            };

            let verdicts = response.by_id();
            let mut missing = 0;
            for event in chunk {
                match verdicts.get(&event.id) {
                    Some(result) if result.status == AckStatus::Ack => {
                        self.store.mark_synced(&event.id)?;
                        outcome.acknowledged += 1;
                    }
                    Some(result) => {
                        let reason = result.reason.as_deref().unwrap_or("rejected by remote");
                        warn!(event = %event.id, kind = %event.kind, reason, "event rejected");
                        self.store.mark_failed(&event.id, reason)?;
                        outcome.rejected += 1;
                    }
                    None => missing += 1,
                }
            }
            if missing > 0 {
                return Err(SyncError::IncompleteResponse { missing });
            }
            start += chunk.len();
        }
        Ok(())
    }

    fn on_success(&self, outcome: &SyncOutcome) {
        *self.retry_deadline.lock() = None;
        let pending = self.store.pending_count();
        let failed = self.store.failed_count();
        self.status.update(|s| {
            s.in_flight = false;
            s.state = SyncState::Synced;
            s.last_synced_at = Some(Utc::now());
            s.last_error = None;
            s.consecutive_failures = 0;
            s.next_retry_at = None;
            s.pending_count = pending;
            s.failed_count = failed;
        });
        if outcome.attempted > 0 {
            info!(
                acknowledged = outcome.acknowledged,
                rejected = outcome.rejected,
                elapsed_ms = outcome.duration.as_millis() as u64,
                "sync attempt complete"
            );
        }
    }

    fn on_failure(&self, outcome: &SyncOutcome) {
        let failures = self.status.snapshot().consecutive_failures.saturating_add(1);
        let delay = outcome
            .retryable
            .then(|| self.config.retry.delay_for_attempt(failures));

        *self.retry_deadline.lock() = delay.map(|d| Instant::now() + d);
        let next_retry_at = delay
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        let pending = self.store.pending_count();
        let failed = self.store.failed_count();
        let error = outcome.error.clone();
        self.status.update(|s| {
            s.in_flight = false;
            s.state = if outcome.retryable {
                SyncState::RetryWait
            } else {
                SyncState::Error
            };
            s.last_error = error;
            s.consecutive_failures = failures;
            s.next_retry_at = next_retry_at;
            s.pending_count = pending;
            s.failed_count = failed;
        });

        warn!(
            error = outcome.error.as_deref().unwrap_or_default(),
            deferred = outcome.deferred,
            failures,
            retry_in_ms = delay.map(|d| d.as_millis() as u64),
            "sync attempt failed"
        );
    }
}
