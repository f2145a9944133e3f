//! HTTP routes
//!
//! - `GET  /ws/stream/{key}`: status WebSocket (see [`super::ws`])
//! - `POST /api/stream/browser/{key}`: multipart field `segment`
//! - `POST /api/stream/webrtc/{key}`: multipart field `chunk`
//! - `GET  /api/stream/status/{key}`: one-shot status snapshot
//! - `GET  /api/streams`: live sessions
//! - `GET  /api/stats`: counters
//! - `POST /hooks/{event}`: media engine callbacks, form or JSON `{ name }`

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::broadcast::{StatusBroadcaster, StatusSnapshot};
use crate::error::{Error, Result};
use crate::ingest::{ChunkTransport, HookEvent, HookResult, IngestAdapter};
use crate::registry::{StreamRegistry, StreamSession};
use crate::stats::{LiveStats, StatsSnapshot};

use super::ws;

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StreamRegistry>,
    pub broadcaster: Arc<StatusBroadcaster>,
    pub adapter: Arc<IngestAdapter>,
    pub stats: Arc<LiveStats>,
}

/// Build the application router
pub fn router(state: AppState, max_chunk_bytes: usize) -> Router {
    let uploads = Router::new()
        .route("/api/stream/browser/{key}", post(upload_browser))
        .route("/api/stream/webrtc/{key}", post(upload_webrtc))
        .layer(DefaultBodyLimit::max(max_chunk_bytes));

    Router::new()
        .route("/ws/stream/{key}", get(ws::ws_upgrade))
        .route("/api/stream/status/{key}", get(stream_status))
        .route("/api/streams", get(list_streams))
        .route("/api/stats", get(stats))
        .route("/hooks/{event}", post(hook))
        .merge(uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Body of an accepted chunk upload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadAccepted {
    stream_key: String,
    bytes_received: u64,
}

async fn upload_browser(
    State(state): State<AppState>,
    Path(key): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadAccepted>> {
    upload(&state, &key, ChunkTransport::Browser, multipart).await
}

async fn upload_webrtc(
    State(state): State<AppState>,
    Path(key): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadAccepted>> {
    upload(&state, &key, ChunkTransport::WebRtc, multipart).await
}

async fn upload(
    state: &AppState,
    key: &str,
    transport: ChunkTransport,
    multipart: Multipart,
) -> Result<Json<UploadAccepted>> {
    let payload = read_field(multipart, transport.field_name()).await?;
    let session = state.adapter.on_chunk(key, transport, payload).await?;

    Ok(Json(UploadAccepted {
        stream_key: session.stream_key.into_inner(),
        bytes_received: session.bytes_received,
    }))
}

/// Read the named file field, skipping any others
async fn read_field(mut multipart: Multipart, name: &str) -> Result<Bytes> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Transport(e.body_text()))?
    {
        if field.name() == Some(name) {
            return field
                .bytes()
                .await
                .map_err(|e| Error::Transport(e.body_text()));
        }
    }

    Err(Error::Transport(format!("missing multipart field `{name}`")))
}

async fn stream_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<StatusSnapshot> {
    Json(state.broadcaster.snapshot_for(&key).await)
}

async fn list_streams(State(state): State<AppState>) -> Json<Vec<StreamSession>> {
    Json(state.registry.list().await)
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    let mut snapshot = state.stats.snapshot();
    snapshot.live_streams = state.registry.len().await as u64;
    snapshot.subscribers = state.broadcaster.total_subscribers() as u64;
    Json(snapshot)
}

/// Media engine callback body
#[derive(Debug, Deserialize)]
struct HookBody {
    /// Stream key
    name: String,
    /// Optional `WIDTHxHEIGHT` reported on publish
    #[serde(default)]
    resolution: Option<String>,
}

async fn hook(
    State(state): State<AppState>,
    Path(event): Path<String>,
    request: Request,
) -> Response {
    let event: HookEvent = match event.parse() {
        Ok(event) => event,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };

    let body = match hook_body(request).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let result = event.dispatch(state.adapter.as_ref(), &body.name).await;

    if let (HookEvent::PostPublish, Some(resolution)) = (event, body.resolution.as_deref()) {
        if let Err(e) = state.adapter.report_resolution(&body.name, resolution).await {
            tracing::debug!(key = %body.name, error = %e, "Ignoring reported resolution");
        }
    }

    match result {
        HookResult::Accept => (StatusCode::OK, "OK").into_response(),
        HookResult::Reject(reason) => (StatusCode::FORBIDDEN, reason).into_response(),
    }
}

/// Decode a hook body as JSON or as a urlencoded form
async fn hook_body(request: Request) -> std::result::Result<HookBody, Response> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    if is_json {
        Json::<HookBody>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .map_err(IntoResponse::into_response)
    } else {
        Form::<HookBody>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .map_err(IntoResponse::into_response)
    }
}
