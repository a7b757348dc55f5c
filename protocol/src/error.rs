//! Protobuf conversion errors.

use thiserror::Error;

/// Errors from JSON ↔ protobuf conversion and message-type dispatch.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The `message_type` string names no known schema type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The payload did not parse as the expected protobuf message.
    #[error("protobuf decode: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The JSON packet root (or a required sub-object) was not an object.
    #[error("expected a JSON object at {0}")]
    NotAnObject(String),
}
