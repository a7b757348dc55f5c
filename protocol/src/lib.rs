//! Wire schema for the upstream multi-agent protocol.
//!
//! This crate owns everything that touches protobuf bytes: the
//! `warp.multi_agent.v1` message definitions (a typed subset of the upstream
//! schema), JSON packet ↔ protobuf conversion, the opaque
//! `server_message_data` varint codec, and the message-type registry the
//! bridge dispatches on.
//!
//! **Public API**: [`encode_message`], [`decode_message`], [`v1`] types,
//! [`server_message_data`], [`ProtoError`].

mod error;
pub mod json;
pub mod registry;
pub mod server_message_data;
pub mod v1;

pub use error::ProtoError;
pub use registry::{decode_message, encode_message, REQUEST_TYPE, RESPONSE_EVENT_TYPE};
