//! Startup warmup: wait for the bridge, then establish the conversation
//! baseline with a one-shot `"warmup"` query.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::packets::packet_template;
use crate::router::AppState;
use crate::settings::REQUEST_MESSAGE_TYPE;

#[derive(Debug, Error)]
pub enum WarmupError {
    #[error("bridge server not ready: {0}")]
    BridgeNotReady(String),
    #[error("warmup request failed: {0}")]
    Request(String),
}

/// Initializes the conversation baseline exactly once per process. Runs
/// under a single-flight guard so concurrent requests do not re-initialize;
/// a failed attempt leaves the guard unset and the next request retries.
pub async fn initialize_once(app: &AppState) -> Result<(), WarmupError> {
    app.warmup
        .get_or_try_init(|| async { warm(app).await })
        .await
        .map(|_| ())
}

async fn warm(app: &AppState) -> Result<(), WarmupError> {
    if app.state.lock().is_ok_and(|s| s.conversation_id.is_some()) {
        return Ok(());
    }

    let first_task_id = {
        let mut state = app.state.lock().map_err(|_| {
            WarmupError::Request("state lock poisoned".to_string())
        })?;
        state.ensure_tool_ids();
        let id = state
            .baseline_task_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        state.baseline_task_id = Some(id.clone());
        id
    };

    wait_for_bridge(app).await?;

    let mut packet = packet_template();
    packet["task_context"]["active_task_id"] = json!(first_task_id);
    packet["input"]["user_inputs"]["inputs"] = json!([{"user_query": {"query": "warmup"}}]);

    let resp = send_warmup(app, &packet).await?;

    let mut state = app
        .state
        .lock()
        .map_err(|_| WarmupError::Request("state lock poisoned".to_string()))?;
    if let Some(id) = resp.get("conversation_id").and_then(Value::as_str) {
        state.conversation_id = Some(id.to_string());
    }
    if let Some(id) = resp
        .get("task_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    {
        state.baseline_task_id = Some(id.to_string());
    }
    info!(
        "warmup complete: conversation_id={:?} baseline_task_id={:?}",
        state.conversation_id, state.baseline_task_id
    );
    Ok(())
}

/// Polls bridge `/healthz` until 200 or the retry budget runs out.
async fn wait_for_bridge(app: &AppState) -> Result<(), WarmupError> {
    let url = format!("{}/healthz", app.settings.bridge_base_url);
    let mut last_err = String::new();
    for attempt in 1..=app.settings.init_retries {
        match app
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!("bridge server is ready at {url}");
                return Ok(());
            }
            Ok(resp) => last_err = format!("HTTP {} at {url}", resp.status()),
            Err(e) => last_err = format!("{e} at {url}"),
        }
        warn!(
            "bridge health attempt {attempt}/{} failed: {last_err}",
            app.settings.init_retries
        );
        tokio::time::sleep(app.settings.init_delay).await;
    }
    Err(WarmupError::BridgeNotReady(last_err))
}

async fn send_warmup(app: &AppState, packet: &Value) -> Result<Value, WarmupError> {
    let url = format!("{}/api/warp/send_stream", app.settings.bridge_base_url);
    let wrapper = json!({
        "json_data": packet,
        "message_type": REQUEST_MESSAGE_TYPE,
    });
    let mut last_err = String::new();
    for attempt in 1..=app.settings.warmup_retries {
        let result = app
            .http
            .post(&url)
            .timeout(Duration::from_secs(180))
            .json(&wrapper)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                return resp
                    .json()
                    .await
                    .map_err(|e| WarmupError::Request(e.to_string()));
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                last_err = format!("HTTP {status}: {snippet}");
            }
            Err(e) => last_err = e.to_string(),
        }
        warn!(
            "warmup attempt {attempt}/{} failed: {last_err}",
            app.settings.warmup_retries
        );
        if attempt < app.settings.warmup_retries {
            tokio::time::sleep(app.settings.warmup_delay).await;
        }
    }
    Err(WarmupError::Request(last_err))
}
