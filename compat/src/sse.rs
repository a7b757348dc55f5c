//! Streaming transformer: bridge SSE → OpenAI `chat.completion.chunk` SSE.
//!
//! State machine per request: emit a role-only opener, re-encode each bridge
//! event's deltas in source order, close with `finish_reason`
//! (`tool_calls` when any tool call was emitted, else `stop`) and a literal
//! `[DONE]`. A first-attempt 429 triggers a best-effort bridge JWT refresh
//! and one retry. Transport or decode failures after the headers are
//! committed emit an error chunk, then `[DONE]`.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::Stream;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::chunk::ChunkMeta;
use crate::extract::{deltas_from_event, is_finished, EventDelta};
use crate::settings::{CompatSettings, REQUEST_MESSAGE_TYPE};

/// Reads blank-line-delimited `data:` events carrying JSON payloads from a
/// bridge SSE response. Undecodable payloads are skipped.
struct JsonSseReader {
    resp: reqwest::Response,
    buf: Vec<u8>,
    current: String,
    done: bool,
}

impl JsonSseReader {
    fn new(resp: reqwest::Response) -> Self {
        Self {
            resp,
            buf: Vec::new(),
            current: String::new(),
            done: false,
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Next event payload parsed as JSON, or `None` at `[DONE]` / EOF.
    async fn next_event(&mut self) -> Result<Option<Value>, reqwest::Error> {
        loop {
            while let Some(line) = self.take_line() {
                if let Some(rest) = line.strip_prefix("data:") {
                    let payload = rest.trim();
                    if payload.is_empty() {
                        continue;
                    }
                    if payload == "[DONE]" {
                        self.done = true;
                        return Ok(None);
                    }
                    self.current.push_str(payload);
                    continue;
                }
                if line.trim().is_empty() && !self.current.is_empty() {
                    let raw = std::mem::take(&mut self.current);
                    match serde_json::from_str::<Value>(&raw) {
                        Ok(v) => return Ok(Some(v)),
                        Err(_) => continue,
                    }
                }
            }
            if self.done {
                return Ok(None);
            }
            match self.resp.chunk().await? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }
}

async fn open_bridge_stream(
    http: &reqwest::Client,
    settings: &CompatSettings,
    wrapper: &Value,
) -> Result<reqwest::Response, String> {
    let url = format!("{}/api/warp/send_stream_sse", settings.bridge_base_url);
    let send = || {
        http.post(&url)
            .header("accept", "text/event-stream")
            .json(wrapper)
            .send()
    };

    let mut resp = send().await.map_err(|e| format!("bridge error: {e}"))?;
    if resp.status().as_u16() == 429 {
        let refresh = http
            .post(format!("{}/api/auth/refresh", settings.bridge_base_url))
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        match refresh {
            Ok(r) => warn!("bridge returned 429, tried JWT refresh -> HTTP {}", r.status()),
            Err(e) => warn!("JWT refresh attempt failed after 429: {e}"),
        }
        resp = send().await.map_err(|e| format!("bridge error: {e}"))?;
    }
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(300).collect();
        return Err(format!("bridge error: HTTP {status} {snippet}"));
    }
    Ok(resp)
}

/// Produces the OpenAI SSE body for one streaming chat request.
pub fn stream_openai_sse(
    http: reqwest::Client,
    settings: CompatSettings,
    packet: Value,
    meta: ChunkMeta,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok(Event::default().data(meta.role_chunk().to_sse_data()));

        let wrapper = json!({
            "json_data": packet,
            "message_type": REQUEST_MESSAGE_TYPE,
        });
        let resp = match open_bridge_stream(&http, &settings, &wrapper).await {
            Ok(resp) => resp,
            Err(message) => {
                warn!("stream processing failed: {message}");
                yield Ok(Event::default().data(meta.error_chunk(message).to_sse_data()));
                yield Ok(Event::default().data("[DONE]"));
                return;
            }
        };

        let mut reader = JsonSseReader::new(resp);
        let mut tool_calls_emitted = false;
        loop {
            match reader.next_event().await {
                Ok(Some(wrapped)) => {
                    let event = wrapped.get("parsed_data").cloned().unwrap_or(Value::Null);
                    for delta in deltas_from_event(&event) {
                        match delta {
                            EventDelta::Content(text) => {
                                yield Ok(Event::default().data(meta.content_chunk(text).to_sse_data()));
                            }
                            EventDelta::Reasoning(text) => {
                                yield Ok(Event::default().data(meta.reasoning_chunk(text).to_sse_data()));
                            }
                            EventDelta::ToolCall { id, name, arguments } => {
                                tool_calls_emitted = true;
                                yield Ok(Event::default().data(
                                    meta.tool_call_chunk(id, name, arguments).to_sse_data(),
                                ));
                            }
                        }
                    }
                    if is_finished(&event) {
                        let reason = if tool_calls_emitted { "tool_calls" } else { "stop" };
                        yield Ok(Event::default().data(meta.finish_chunk(reason).to_sse_data()));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("stream processing failed: {e}");
                    yield Ok(Event::default().data(
                        meta.error_chunk(format!("bridge stream error: {e}")).to_sse_data(),
                    ));
                    break;
                }
            }
        }
        info!("stream complete");
        yield Ok(Event::default().data("[DONE]"));
    }
}
