//! Message-type dispatch for the bridge API.
//!
//! Bridge requests carry a `message_type` string naming the schema type of
//! `json_data`. Only the canonical request and response-event types exist;
//! anything else is rejected loudly rather than guessed at.

use serde_json::Value;

use crate::error::ProtoError;
use crate::json;

pub const REQUEST_TYPE: &str = "warp.multi_agent.v1.Request";
pub const RESPONSE_EVENT_TYPE: &str = "warp.multi_agent.v1.ResponseEvent";

/// Encodes a JSON packet as protobuf bytes for the named message type.
pub fn encode_message(message_type: &str, packet: &Value) -> Result<Vec<u8>, ProtoError> {
    match message_type {
        REQUEST_TYPE => json::request_to_bytes(packet),
        other => Err(ProtoError::UnknownMessageType(other.to_string())),
    }
}

/// Decodes protobuf bytes of the named message type into JSON dictionary
/// form.
pub fn decode_message(message_type: &str, bytes: &[u8]) -> Result<Value, ProtoError> {
    match message_type {
        RESPONSE_EVENT_TYPE => json::response_event_json_from_bytes(bytes),
        other => Err(ProtoError::UnknownMessageType(other.to_string())),
    }
}
