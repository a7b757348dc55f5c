//! Axum router: OpenAI-compatible endpoints.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::{ChatCompletion, ChunkMeta};
use crate::content::{normalize_content_to_list, segments_to_text};
use crate::extract::collect_tool_calls;
use crate::models::all_unique_models;
use crate::packets::{
    attach_user_and_tools_to_inputs, map_history_to_warp_messages, packet_template, PacketError,
};
use crate::reorder::reorder_messages;
use crate::request::{ChatCompletionsRequest, ChatMessage};
use crate::settings::{CompatSettings, FALLBACK_MODEL_ID, REQUEST_MESSAGE_TYPE};
use crate::sse::stream_openai_sse;
use crate::state::BridgeState;
use crate::warmup;

const SERVICE_NAME: &str = "OpenAI Chat Completions (Warp bridge) - Streaming";

/// Shared compat state: conversation baseline, bridge HTTP client, knobs,
/// and the warmup single-flight guard.
pub struct AppState {
    pub state: Mutex<BridgeState>,
    pub http: reqwest::Client,
    pub settings: CompatSettings,
    pub warmup: tokio::sync::OnceCell<()>,
}

impl AppState {
    pub fn new(settings: CompatSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            state: Mutex::new(BridgeState::default()),
            http,
            settings,
            warmup: tokio::sync::OnceCell::new(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/v1/models", get(models))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"service": SERVICE_NAME, "status": "ok"}))
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok", "service": SERVICE_NAME}))
}

async fn models() -> Json<Value> {
    Json(json!({"object": "list", "data": all_unique_models()}))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({"error": {"message": message.into(), "type": "invalid_request_error"}})),
    )
        .into_response()
}

/// Concatenation of all system messages' text, blank-stripped, joined with
/// blank lines.
fn system_prompt_text(history: &[ChatMessage]) -> Option<String> {
    let chunks: Vec<String> = history
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| segments_to_text(&normalize_content_to_list(m.content.as_ref())))
        .filter(|text| !text.trim().is_empty())
        .collect();
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}

/// Builds the upstream packet: transcoded history under the baseline task,
/// current-turn input, model override, and any function tools.
fn build_packet(
    app: &AppState,
    req: &ChatCompletionsRequest,
    history: &[ChatMessage],
    system_prompt: Option<&str>,
) -> Result<Value, PacketError> {
    let (task_id, tool_call_id, tool_message_id, conversation_id) = {
        let mut state = app.state.lock().unwrap_or_else(|e| e.into_inner());
        let (tool_call_id, tool_message_id) = state.ensure_tool_ids();
        let task_id = state
            .baseline_task_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        (task_id, tool_call_id, tool_message_id, state.conversation_id.clone())
    };

    let messages = map_history_to_warp_messages(history, &task_id, &tool_call_id, &tool_message_id);
    let mut packet = packet_template();
    packet["task_context"] = json!({
        "tasks": [{
            "id": task_id.clone(),
            "description": "",
            "status": {"in_progress": {}},
            "messages": messages,
        }],
        "active_task_id": task_id,
    });

    if let Some(model) = req.model.as_ref().filter(|m| !m.is_empty()) {
        packet["settings"]["model_config"]["base"] = json!(model);
    }
    if let Some(conversation_id) = conversation_id {
        packet["metadata"]["conversation_id"] = json!(conversation_id);
    }

    attach_user_and_tools_to_inputs(&mut packet, history, system_prompt)?;

    if let Some(tools) = &req.tools {
        let mcp_tools: Vec<Value> = tools
            .iter()
            .filter(|t| t.tool_type == "function")
            .filter_map(|t| t.function.as_ref())
            .map(|f| {
                json!({
                    "name": f.name,
                    "description": f.description.clone().unwrap_or_default(),
                    "input_schema": f.parameters.clone().unwrap_or_else(|| json!({})),
                })
            })
            .collect();
        if !mcp_tools.is_empty() {
            packet["mcp_context"] = json!({"tools": mcp_tools});
        }
    }

    Ok(packet)
}

async fn chat_completions(
    State(app): State<Arc<AppState>>,
    Json(req): Json<ChatCompletionsRequest>,
) -> Response {
    if let Err(e) = warmup::initialize_once(&app).await {
        warn!("warmup failed or skipped: {e}");
    }

    if req.messages.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "messages must not be empty");
    }

    let history = reorder_messages(req.messages.clone());
    let system_prompt = system_prompt_text(&history);

    let packet = match build_packet(&app, &req, &history, system_prompt.as_deref()) {
        Ok(packet) => packet,
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let meta = ChunkMeta {
        id: Uuid::new_v4().to_string(),
        model: req
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_MODEL_ID.to_string()),
        created: Utc::now().timestamp(),
    };

    if req.stream {
        let stream = stream_openai_sse(app.http.clone(), app.settings.clone(), packet, meta);
        let mut resp = Sse::new(stream)
            .keep_alive(KeepAlive::default())
            .into_response();
        resp.headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        resp.headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        return resp;
    }

    let bridge_resp = match post_buffered(&app, &packet).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    {
        let mut state = app.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = bridge_resp.get("conversation_id").and_then(Value::as_str) {
            state.conversation_id = Some(id.to_string());
        }
        if let Some(id) = bridge_resp
            .get("task_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
        {
            state.baseline_task_id = Some(id.to_string());
        }
    }

    let parsed_events = bridge_resp
        .get("parsed_events")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let tool_calls = collect_tool_calls(&parsed_events);
    let content = bridge_resp
        .get("response")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    info!(
        "chat completion done: {} tool call(s), {} content chars",
        tool_calls.len(),
        content.len()
    );
    Json(ChatCompletion::new(&meta, content, tool_calls)).into_response()
}

/// Buffered bridge call with one refresh-and-retry on 429.
async fn post_buffered(app: &AppState, packet: &Value) -> Result<Value, Response> {
    let url = format!("{}/api/warp/send_stream", app.settings.bridge_base_url);
    let wrapper = json!({
        "json_data": packet,
        "message_type": REQUEST_MESSAGE_TYPE,
    });
    let send = || {
        app.http
            .post(&url)
            .timeout(Duration::from_secs(180))
            .json(&wrapper)
            .send()
    };

    let mut resp = match send().await {
        Ok(resp) => resp,
        Err(e) => {
            return Err(error_response(
                StatusCode::BAD_GATEWAY,
                format!("bridge_unreachable: {e}"),
            ))
        }
    };
    if resp.status().as_u16() == 429 {
        let refresh = app
            .http
            .post(format!("{}/api/auth/refresh", app.settings.bridge_base_url))
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        match refresh {
            Ok(r) => warn!("bridge returned 429, tried JWT refresh -> HTTP {}", r.status()),
            Err(e) => warn!("JWT refresh attempt failed after 429: {e}"),
        }
        resp = match send().await {
            Ok(resp) => resp,
            Err(e) => {
                return Err(error_response(
                    StatusCode::BAD_GATEWAY,
                    format!("bridge_unreachable: {e}"),
                ))
            }
        };
    }

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(error_response(
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            format!("bridge_error: {body}"),
        ));
    }
    resp.json()
        .await
        .map_err(|e| error_response(StatusCode::BAD_GATEWAY, format!("bridge_unreachable: {e}")))
}
