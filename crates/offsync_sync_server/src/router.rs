//! HTTP surface.
//!
//! - `POST /sync`: CBOR [`PushRequest`](offsync_sync_protocol::PushRequest)
//!   in, CBOR [`PushResponse`](offsync_sync_protocol::PushResponse) out
//! - `GET /health`: liveness

use crate::error::ServerError;
use crate::server::SyncServer;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use offsync_sync_protocol::{CBOR_CONTENT_TYPE, HEALTH_PATH, SYNC_PATH};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Builds the router for `server`.
///
/// Push bodies above [`ServerConfig::max_body_bytes`](crate::ServerConfig)
/// are answered with 413.
pub fn router(server: SyncServer) -> Router {
    let body_limit = server.config().max_body_bytes;
    Router::new()
        .route(SYNC_PATH, post(push))
        .route(HEALTH_PATH, get(health))
        .with_state(server)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until the process exits.
pub async fn serve(server: SyncServer) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(server.config().bind_addr).await?;
    serve_listener(listener, server).await
}

/// Serves on an already bound listener.
pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    server: SyncServer,
) -> Result<(), ServerError> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "sync server listening");
    axum::serve(listener, router(server)).await?;
    Ok(())
}

async fn push(State(server): State<SyncServer>, body: Bytes) -> Response {
    match server.handle_push_bytes(&body) {
        Ok(bytes) => ([(header::CONTENT_TYPE, CBOR_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            warn!(error = %e, "push refused");
            e.into_response()
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use offsync_sync_protocol::{
        AckStatus, EventEnvelope, EventId, MutationKind, PushRequest, PushResponse,
    };
    use tower::ServiceExt;

    fn push_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(SYNC_PATH)
            .header(header::CONTENT_TYPE, CBOR_CONTENT_TYPE)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(SyncServer::new(ServerConfig::default()));
        let response = app
            .oneshot(Request::builder().uri(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn push_answers_in_cbor() {
        let app = router(SyncServer::new(ServerConfig::default()));
        let event = EventEnvelope {
            id: EventId::new(),
            kind: MutationKind::create("clients"),
            record_id: "c-1".into(),
            payload: serde_json::json!({"name": "Ana"}),
            timestamp: 1,
        };
        let body = PushRequest::new("d-1", vec![event.clone()]).encode().unwrap();

        let response = app.oneshot(push_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CBOR_CONTENT_TYPE
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let decoded = PushResponse::decode(&bytes).unwrap();
        assert_eq!(decoded.results[0].id, event.id);
        assert_eq!(decoded.results[0].status, AckStatus::Ack);
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let config = ServerConfig::default().with_max_body_bytes(64);
        let server = SyncServer::new(config);
        let app = router(server.clone());

        let response = app.oneshot(push_request(vec![0u8; 1024])).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(server.authority().event_count(), 0);
    }

    #[tokio::test]
    async fn too_many_events_is_413() {
        let app = router(SyncServer::new(ServerConfig::default().with_max_push_batch(1)));
        let events = (0..2)
            .map(|i| EventEnvelope {
                id: EventId::new(),
                kind: MutationKind::create("clients"),
                record_id: format!("c-{i}"),
                payload: serde_json::json!({}),
                timestamp: i,
            })
            .collect();
        let body = PushRequest::new("d-1", events).encode().unwrap();

        let response = app.oneshot(push_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn garbage_body_is_bad_request() {
        let app = router(SyncServer::new(ServerConfig::default()));
        let response = app.oneshot(push_request(vec![0xFF, 0x01])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
