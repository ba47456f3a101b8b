//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use offsync_sync_protocol::{EventResult, PushRequest, PushResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Carries push requests to the remote.
///
/// Implementations do not retry; the engine owns retry and timeout.
pub trait SyncTransport: Send + Sync {
    /// Sends one batch and returns the per-event verdicts.
    fn push(&self, request: &PushRequest) -> impl Future<Output = SyncResult<PushResponse>> + Send;
}

impl<T: SyncTransport> SyncTransport for Arc<T> {
    fn push(&self, request: &PushRequest) -> impl Future<Output = SyncResult<PushResponse>> + Send {
        (**self).push(request)
    }
}

type Responder = Arc<dyn Fn(&PushRequest) -> PushResponse + Send + Sync>;

/// One scripted reply of a [`MockTransport`].
#[derive(Clone)]
pub enum MockStep {
    /// Acknowledge every event.
    AckAll,
    /// Build the response from the request.
    Respond(Responder),
    /// Fail with a retryable transport error.
    Fail(String),
    /// Sleep, then acknowledge every event. Used to trip timeouts.
    Stall(Duration),
}

impl MockStep {
    /// Replies from a closure.
    pub fn respond(f: impl Fn(&PushRequest) -> PushResponse + Send + Sync + 'static) -> Self {
        Self::Respond(Arc::new(f))
    }
}

impl std::fmt::Debug for MockStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MockStep::AckAll => f.write_str("AckAll"),
            MockStep::Respond(_) => f.write_str("Respond(..)"),
            MockStep::Fail(msg) => f.debug_tuple("Fail").field(msg).finish(),
            MockStep::Stall(d) => f.debug_tuple("Stall").field(d).finish(),
        }
    }
}

/// A scripted transport for testing.
///
/// Steps are consumed in order; once the script is empty every push is
/// acknowledged in full. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockStep>>,
    latency: Mutex<Duration>,
    max_events: Mutex<Option<usize>>,
    requests: Mutex<Vec<PushRequest>>,
}

impl MockTransport {
    /// Creates a transport that acknowledges everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply.
    pub fn push_step(&self, step: MockStep) {
        self.script.lock().push_back(step);
    }

    /// Sets a delay applied before every reply.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Refuses batches of more than `max` events with
    /// [`SyncError::BatchTooLarge`], as a remote with a body limit does.
    pub fn refuse_batches_over(&self, max: usize) {
        *self.max_events.lock() = Some(max);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<PushRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

fn ack_all(request: &PushRequest) -> PushResponse {
    PushResponse::new(request.events.iter().map(|e| EventResult::ack(e.id)).collect())
}

impl SyncTransport for MockTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.requests.lock().push(request.clone());
        let step = self.script.lock().pop_front().unwrap_or(MockStep::AckAll);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let max_events = *self.max_events.lock();
        if max_events.is_some_and(|max| request.events.len() > max) {
            return Err(SyncError::BatchTooLarge {
                events: request.events.len(),
            });
        }

        match step {
            MockStep::AckAll => Ok(ack_all(request)),
            MockStep::Respond(f) => Ok(f(request)),
            MockStep::Fail(message) => Err(SyncError::transport_retryable(message)),
            MockStep::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(ack_all(request))
            }
        }
    }
}
