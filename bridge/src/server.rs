//! Axum router: bridge HTTP surface.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::{AuthError, CredentialManager};
use crate::client::UpstreamClient;
use crate::events::Aggregator;
use crate::sanitizer::sanitize_packet;
use crate::UpstreamError;

const SERVICE_NAME: &str = "warp-bridge";

/// Shared bridge state: the upstream client and the credential manager.
pub struct AppState {
    pub upstream: UpstreamClient,
    pub creds: Arc<CredentialManager>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/api/warp/send_stream", post(send_stream))
        .route("/api/warp/send_stream_sse", post(send_stream_sse))
        .route("/api/auth/refresh", post(auth_refresh))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"service": SERVICE_NAME, "status": "ok"}))
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok", "service": SERVICE_NAME}))
}

/// Bridge request body: a JSON packet plus the schema type to encode it as.
#[derive(Debug, Deserialize)]
pub struct SendStreamRequest {
    pub json_data: Value,
    #[serde(default = "default_message_type")]
    pub message_type: String,
}

fn default_message_type() -> String {
    warp_protocol::REQUEST_TYPE.to_string()
}

fn encode_packet(body: &mut SendStreamRequest) -> Result<Vec<u8>, Response> {
    sanitize_packet(&mut body.json_data);
    warp_protocol::encode_message(&body.message_type, &body.json_data).map_err(|e| {
        error!("packet encode failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("protobuf encode failed: {e}")})),
        )
            .into_response()
    })
}

fn upstream_error_response(err: UpstreamError) -> Response {
    match err {
        // Non-200s pass through with their original status and body.
        UpstreamError::Status { status, body } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        )
            .into_response(),
        UpstreamError::Transport(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": format!("upstream transport: {e}")})),
        )
            .into_response(),
        UpstreamError::Auth(AuthError::Unauthenticated) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": AuthError::Unauthenticated.to_string()})),
        )
            .into_response(),
        UpstreamError::Auth(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// Buffered path: runs the upstream stream to completion and returns the
/// aggregate (full text, ids, numbered parsed events).
async fn send_stream(
    State(state): State<Arc<AppState>>,
    Json(mut body): Json<SendStreamRequest>,
) -> Response {
    let bytes = match encode_packet(&mut body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let mut events = match state.upstream.send(bytes).await {
        Ok(ev) => ev,
        Err(e) => return upstream_error_response(e),
    };
    let mut agg = Aggregator::default();
    loop {
        match events.next_event().await {
            Ok(Some(event)) => agg.observe(&event),
            Ok(None) => break,
            Err(e) => return upstream_error_response(e),
        }
    }
    let summary = agg.finish();
    info!(
        "upstream stream done: {} events, {} response chars",
        summary.parsed_events.len(),
        summary.response.len()
    );
    Json(json!({
        "response": summary.response,
        "conversation_id": summary.conversation_id,
        "task_id": summary.task_id,
        "parsed_events": summary.parsed_events,
    }))
    .into_response()
}

/// Streaming path: re-emits each parsed upstream event as one SSE event
/// wrapped as `{"parsed_data": ...}`, terminated by `[DONE]`.
async fn send_stream_sse(
    State(state): State<Arc<AppState>>,
    Json(mut body): Json<SendStreamRequest>,
) -> Response {
    let bytes = match encode_packet(&mut body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let mut events = match state.upstream.send(bytes).await {
        Ok(ev) => ev,
        Err(e) => return upstream_error_response(e),
    };
    let stream = async_stream::stream! {
        loop {
            match events.next_event().await {
                Ok(Some(event)) => {
                    yield Ok::<_, Infallible>(
                        Event::default().data(json!({"parsed_data": event}).to_string()),
                    );
                }
                Ok(None) => break,
                Err(e) => {
                    error!("upstream stream failed mid-flight: {e}");
                    break;
                }
            }
        }
        yield Ok(Event::default().data("[DONE]"));
    };
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Best-effort JWT refresh, used by the compat layer after a 429.
async fn auth_refresh(State(state): State<Arc<AppState>>) -> Json<Value> {
    let refreshed = state.creds.refresh_if_needed().await;
    Json(json!({"refreshed": refreshed}))
}
