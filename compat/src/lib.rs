//! OpenAI Chat Completions compatible front end.
//!
//! Accepts OpenAI-shaped requests, normalizes tool-call adjacency, transcodes
//! chat history into the upstream task/message packet, and proxies it to the
//! bridge server. Responses come back either buffered or re-encoded in real
//! time as `chat.completion.chunk` SSE.
//!
//! **Public API**: [`router`], [`AppState`], [`settings::CompatSettings`].

pub mod chunk;
pub mod content;
pub mod extract;
pub mod models;
pub mod packets;
pub mod reorder;
pub mod request;
mod router;
pub mod settings;
pub mod sse;
pub mod state;
pub mod warmup;

pub use router::{router, AppState};
