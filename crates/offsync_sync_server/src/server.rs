//! Main sync server.

use crate::authority::RecordAuthority;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use offsync_sync_protocol::{
    AckStatus, ErrorReply, LoopbackServer, PushRequest, PushResponse, STATUS_PAYLOAD_TOO_LARGE,
    SYNC_PATH,
};
use std::sync::Arc;
use tracing::{debug, info};

/// The sync server.
///
/// Answers every event of a push with `ACK` or `REJECT`. Requests are
/// processed in event order and a re-delivered id never applies twice.
///
/// # Example
///
/// ```
/// use offsync_sync_server::{ServerConfig, SyncServer};
/// use offsync_sync_protocol::{EventEnvelope, EventId, MutationKind, PushRequest};
///
/// let server = SyncServer::new(ServerConfig::default());
/// let event = EventEnvelope {
///     id: EventId::new(),
///     kind: MutationKind::create("clients"),
///     record_id: "c-1".into(),
///     payload: serde_json::json!({"name": "Ana"}),
///     timestamp: 1,
/// };
/// let response = server.handle_push(PushRequest::new("front-desk-1", vec![event])).unwrap();
/// assert_eq!(response.results.len(), 1);
/// ```
#[derive(Clone)]
pub struct SyncServer {
    config: ServerConfig,
    authority: Arc<RecordAuthority>,
}

impl SyncServer {
    /// Creates a new sync server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_authority(config, Arc::new(RecordAuthority::new()))
    }

    /// Creates a sync server over an existing authority.
    pub fn with_authority(config: ServerConfig, authority: Arc<RecordAuthority>) -> Self {
        Self { config, authority }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The record authority.
    pub fn authority(&self) -> &Arc<RecordAuthority> {
        &self.authority
    }

    /// Handles a push request.
    pub fn handle_push(&self, request: PushRequest) -> ServerResult<PushResponse> {
        if request.events.len() > self.config.max_push_batch {
            return Err(ServerError::BatchTooLarge {
                events: request.events.len(),
                max: self.config.max_push_batch,
            });
        }

        let results: Vec<_> = request
            .events
            .iter()
            .map(|event| self.authority.apply(event))
            .collect();

        let rejected = results
            .iter()
            .filter(|r| r.status == AckStatus::Reject)
            .count();
        info!(
            device = %request.device_id,
            events = results.len(),
            rejected,
            "push handled"
        );
        Ok(PushResponse::new(results))
    }

    /// Decodes a CBOR push body, handles it and encodes the response.
    pub fn handle_push_bytes(&self, body: &[u8]) -> ServerResult<Vec<u8>> {
        let request = PushRequest::decode(body)?;
        let response = self.handle_push(request)?;
        Ok(response.encode()?)
    }
}

impl LoopbackServer for SyncServer {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, ErrorReply> {
        if path != SYNC_PATH {
            debug!(path, "loopback post to unknown path");
            return Err(ErrorReply::new(404, format!("no route for {path}")));
        }
        if body.len() > self.config.max_body_bytes {
            return Err(ErrorReply::new(
                STATUS_PAYLOAD_TOO_LARGE,
                format!("body of {} bytes exceeds {}", body.len(), self.config.max_body_bytes),
            ));
        }
        self.handle_push_bytes(body)
            .map_err(|e| ErrorReply::new(e.status_code(), e.to_string()))
    }
}
