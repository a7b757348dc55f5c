//! Bridge server for the upstream multi-agent API.
//!
//! Owns the upstream HTTPS client, the credential manager, and the schema
//! sanitizer, and exposes them over HTTP: `POST /api/warp/send_stream`
//! (buffered), `POST /api/warp/send_stream_sse` (streaming), and
//! `POST /api/auth/refresh`. The compat front end is its only client.
//!
//! **Public API**: [`router`], [`AppState`], [`auth::CredentialManager`],
//! [`client::UpstreamClient`].

pub mod auth;
pub mod client;
pub mod events;
pub mod sanitizer;
mod server;
pub mod settings;
pub mod sse;

pub use server::{router, AppState};

use thiserror::Error;

/// Errors talking to the upstream service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, DNS, TLS, or timeout failure.
    #[error("upstream transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-200 response after retries; surfaced verbatim to the caller.
    #[error("upstream returned HTTP {status}")]
    Status { status: u16, body: String },

    /// Credential failure after refresh and anonymous acquisition.
    #[error(transparent)]
    Auth(#[from] auth::AuthError),
}
