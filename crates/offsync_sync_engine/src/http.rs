//! HTTP transport implementation.
//!
//! The HTTP client is abstracted behind [`HttpClient`] so the same
//! transport runs over `reqwest` in production and over an in-process
//! [`LoopbackClient`] in tests.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use offsync_sync_protocol::{
    ErrorReply, LoopbackServer, PushRequest, PushResponse, CBOR_CONTENT_TYPE, SYNC_PATH,
};
use parking_lot::RwLock;
use std::future::Future;
use thiserror::Error;

/// Why an HTTP exchange failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// No usable response: connect, TLS or body read failure.
    #[error("{0}")]
    Network(String),
    /// The remote answered with a non-success status.
    #[error("{0}")]
    Status(ErrorReply),
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a CBOR body and returns the response body.
    ///
    /// A non-success status is an error.
    fn post(&self, url: &str, body: Vec<u8>) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;
}

/// HTTP-based sync transport using CBOR bodies.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let body = request
            .encode()
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;

        let url = format!("{}{}", self.base_url, SYNC_PATH);
        let response = match self.client.post(&url, body).await {
            Ok(bytes) => {
                *self.last_error.write() = None;
                bytes
            }
            Err(e) => {
                *self.last_error.write() = Some(e.to_string());
                return Err(match e {
                    HttpError::Status(reply) if reply.is_payload_too_large() => {
                        SyncError::BatchTooLarge {
                            events: request.events.len(),
                        }
                    }
                    other => SyncError::transport_retryable(other.to_string()),
                });
            }
        };

        PushResponse::decode(&response)
            .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))
    }
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with default settings. Timeouts are applied by
    /// the engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpClient for ReqwestClient {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, HttpError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, CBOR_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| HttpError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HttpError::Status(ErrorReply::new(status.as_u16(), message)));
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| HttpError::Network(e.to_string()))
    }
}

/// An HTTP client that routes requests directly to an in-process server.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a loopback client for the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, HttpError> {
        let path = url.find(SYNC_PATH).map_or(url, |i| &url[i..]);
        self.server.handle_post(path, &body).map_err(HttpError::Status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_sync_protocol::{EventEnvelope, EventId, EventResult, MutationKind};

    struct TestClient {
        response: RwLock<Result<Vec<u8>, HttpError>>,
        seen_url: RwLock<Option<String>>,
    }

    impl TestClient {
        fn new(response: Result<Vec<u8>, HttpError>) -> Self {
            Self {
                response: RwLock::new(response),
                seen_url: RwLock::new(None),
            }
        }
    }

    impl HttpClient for TestClient {
        async fn post(&self, url: &str, _body: Vec<u8>) -> Result<Vec<u8>, HttpError> {
            *self.seen_url.write() = Some(url.to_string());
            self.response.read().clone()
        }
    }

    fn request() -> PushRequest {
        PushRequest::new(
            "device",
            vec![EventEnvelope {
                id: EventId::new(),
                kind: MutationKind::create("clients"),
                record_id: "c-1".into(),
                payload: serde_json::json!({"name": "Ana"}),
                timestamp: 1,
            }],
        )
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let transport = HttpTransport::new("https://sync.example.com/", TestClient::new(Ok(vec![])));
        assert_eq!(transport.base_url(), "https://sync.example.com");
    }

    #[tokio::test]
    async fn push_posts_to_sync_path() {
        let request = request();
        let response = PushResponse::new(vec![EventResult::ack(request.events[0].id)]);
        let client = TestClient::new(Ok(response.encode().unwrap()));
        let transport = HttpTransport::new("https://sync.example.com", client);

        let decoded = transport.push(&request).await.unwrap();
        assert_eq!(decoded, response);
        assert_eq!(
            transport.client.seen_url.read().as_deref(),
            Some("https://sync.example.com/sync")
        );
    }

    #[tokio::test]
    async fn client_error_is_retryable_and_remembered() {
        let transport = HttpTransport::new("http://x", TestClient::new(Err(HttpError::Network("refused".into()))));
        let err = transport.push(&request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("refused"));
    }

    #[tokio::test]
    async fn payload_too_large_is_its_own_error() {
        let reply = ErrorReply::new(413, "length limit exceeded");
        let transport = HttpTransport::new("http://x", TestClient::new(Err(HttpError::Status(reply))));
        let err = transport.push(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::BatchTooLarge { events: 1 }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn other_statuses_stay_retryable() {
        let reply = ErrorReply::new(503, "busy");
        let transport = HttpTransport::new("http://x", TestClient::new(Err(HttpError::Status(reply))));
        let err = transport.push(&request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            transport.last_error().as_deref(),
            Some("remote returned HTTP 503: busy")
        );
    }

    #[tokio::test]
    async fn undecodable_body_is_protocol_error() {
        let transport = HttpTransport::new("http://x", TestClient::new(Ok(vec![0xFF, 0x00])));
        assert!(matches!(
            transport.push(&request()).await,
            Err(SyncError::Protocol(_))
        ));
    }
}
