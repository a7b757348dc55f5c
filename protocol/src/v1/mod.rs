//! Typed subset of the `warp.multi_agent.v1` protobuf schema.
//!
//! Hand-written prost definitions covering the request/response surface the
//! gateway exchanges with the upstream. Field numbers are stable; anything
//! the upstream sends outside this subset lands in prost's unknown-field
//! handling and is ignored.

mod request;
mod response;
mod task;

pub use request::*;
pub use response::*;
pub use task::*;
