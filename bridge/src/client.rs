//! Upstream HTTPS streaming client.
//!
//! POSTs protobuf bytes to the multi-agent endpoint and exposes the SSE
//! reply as a sequence of parsed event dictionaries. Up to two attempts: a
//! first-attempt 429 with a quota-exhaustion body triggers anonymous token
//! acquisition and one retry; every other non-200 is surfaced verbatim.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialManager;
use crate::settings::{CLIENT_VERSION, OS_CATEGORY, OS_NAME, OS_VERSION, WARP_URL};
use crate::sse::{parse_payload_bytes, Frame, FrameAccumulator};
use crate::UpstreamError;

/// True for the upstream's quota-exhaustion 429 bodies.
pub fn is_quota_exhausted(body: &str) -> bool {
    body.contains("No remaining quota") || body.contains("No AI requests remaining")
}

pub struct UpstreamClient {
    http: reqwest::Client,
    url: String,
    creds: Arc<CredentialManager>,
}

impl UpstreamClient {
    pub fn new(creds: Arc<CredentialManager>) -> Result<Self, UpstreamError> {
        // Read timeout rather than a total-request timeout: the SSE body
        // stays open as long as the upstream keeps sending.
        let mut builder = reqwest::Client::builder()
            .read_timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5));
        if warp_config::env_flag("WARP_INSECURE_TLS") {
            warn!("TLS verification disabled via WARP_INSECURE_TLS");
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            http: builder.build()?,
            url: WARP_URL.to_string(),
            creds,
        })
    }

    async fn start_stream(
        &self,
        body: &[u8],
        jwt: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let resp = self
            .http
            .post(&self.url)
            .header("accept", "text/event-stream")
            .header("content-type", "application/x-protobuf")
            .header("x-warp-client-version", CLIENT_VERSION)
            .header("x-warp-os-category", OS_CATEGORY)
            .header("x-warp-os-name", OS_NAME)
            .header("x-warp-os-version", OS_VERSION)
            .header("authorization", format!("Bearer {jwt}"))
            .body(body.to_vec())
            .send()
            .await?;
        Ok(resp)
    }

    /// Opens the upstream stream, handling the quota-429 retry. The returned
    /// [`UpstreamEvents`] yields parsed `ResponseEvent` dictionaries.
    pub async fn send(&self, body: Vec<u8>) -> Result<UpstreamEvents, UpstreamError> {
        info!("sending {} bytes to upstream", body.len());
        let mut jwt = self.creds.get_valid_jwt().await?;
        let mut attempt = 0;
        loop {
            let resp = self.start_stream(&body, &jwt).await?;
            let status = resp.status();
            if status.is_success() {
                return Ok(UpstreamEvents::new(resp));
            }
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 429 && attempt == 0 && is_quota_exhausted(&text) {
                warn!("upstream returned 429 (quota exhausted), acquiring anonymous token");
                match self.creds.acquire_anonymous_access_token().await {
                    Ok(new_jwt) => {
                        jwt = new_jwt;
                        attempt += 1;
                        continue;
                    }
                    Err(e) => {
                        error!("anonymous token acquisition failed: {e}");
                        return Err(UpstreamError::Status {
                            status: status.as_u16(),
                            body: text,
                        });
                    }
                }
            }
            let snippet: String = text.chars().take(300).collect();
            error!("upstream HTTP error {status}: {snippet}");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
    }
}

/// Incremental reader over the upstream SSE body. Per-event decode failures
/// are logged and skipped; they never terminate the stream.
pub struct UpstreamEvents {
    resp: reqwest::Response,
    buf: Vec<u8>,
    frames: FrameAccumulator,
    done: bool,
}

impl UpstreamEvents {
    fn new(resp: reqwest::Response) -> Self {
        Self {
            resp,
            buf: Vec::new(),
            frames: FrameAccumulator::default(),
            done: false,
        }
    }

    /// Next parsed event, or `None` at `[DONE]` / end of stream.
    pub async fn next_event(&mut self) -> Result<Option<Value>, UpstreamError> {
        loop {
            while let Some(line) = self.take_line() {
                match self.frames.push_line(&line) {
                    Frame::Pending => {}
                    Frame::Done => {
                        info!("received [DONE] marker");
                        self.done = true;
                        return Ok(None);
                    }
                    Frame::Payload(payload) => {
                        let Some(bytes) = parse_payload_bytes(&payload) else {
                            debug!("skipping undecodable SSE chunk (not hex/base64)");
                            continue;
                        };
                        match warp_protocol::decode_message(
                            warp_protocol::RESPONSE_EVENT_TYPE,
                            &bytes,
                        ) {
                            Ok(event) => return Ok(Some(event)),
                            Err(e) => {
                                debug!("skipping unparsable event: {e}");
                                continue;
                            }
                        }
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

    /// Pops one complete line (without the trailing newline) from the
    /// buffer.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_markers_detected() {
        assert!(is_quota_exhausted("No remaining quota"));
        assert!(is_quota_exhausted("error: No AI requests remaining today"));
        assert!(!is_quota_exhausted("rate limited"));
    }
}
