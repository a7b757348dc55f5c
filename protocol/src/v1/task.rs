//! Task graph messages shared by the request and response sides.
//!
//! A conversation turn is a `Task` holding ordered `TaskMessage`s; each
//! message is one of user query, agent output, tool call, or tool result.

use std::collections::HashMap;

/// One unit of conversation turn-history. The request carries exactly one
/// active task; response actions may create or update tasks.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Task {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub description: String,
    #[prost(message, optional, tag = "3")]
    pub status: Option<TaskStatus>,
    #[prost(message, repeated, tag = "4")]
    pub messages: Vec<TaskMessage>,
}

/// Task status. `in_progress` is presence-only: the empty sub-message being
/// set is the signal.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskStatus {
    #[prost(message, optional, tag = "1")]
    pub in_progress: Option<InProgress>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct InProgress {}

/// A single message in a task's history.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskMessage {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub task_id: String,
    #[prost(oneof = "task_message::Kind", tags = "3, 4, 5, 6")]
    pub kind: Option<task_message::Kind>,
}

pub mod task_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "3")]
        UserQuery(super::UserQuery),
        #[prost(message, tag = "4")]
        AgentOutput(super::AgentOutput),
        #[prost(message, tag = "5")]
        ToolCall(super::ToolCall),
        #[prost(message, tag = "6")]
        ToolCallResult(super::ToolCallResult),
    }
}

/// A user turn. `referenced_attachments` carries named side-channel texts
/// (the gateway uses the `SYSTEM_PROMPT` key).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserQuery {
    #[prost(string, tag = "1")]
    pub query: String,
    #[prost(map = "string, message", tag = "2")]
    pub referenced_attachments: HashMap<String, Attachment>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Attachment {
    #[prost(string, tag = "1")]
    pub plain_text: String,
}

/// Assistant-visible model output.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentOutput {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(string, tag = "2")]
    pub reasoning: String,
}

/// A tool invocation. Exactly one variant names the tool; `call_mcp_tool`
/// is the client-tool path, `server` the opaque server-originated one.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolCall {
    #[prost(string, tag = "1")]
    pub tool_call_id: String,
    #[prost(oneof = "tool_call::Tool", tags = "2, 3")]
    pub tool: Option<tool_call::Tool>,
}

pub mod tool_call {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Tool {
        #[prost(message, tag = "2")]
        CallMcpTool(super::CallMcpTool),
        #[prost(message, tag = "3")]
        Server(super::ServerToolCall),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CallMcpTool {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub args: Option<::prost_types::Struct>,
}

/// Server-originated tool call: an opaque payload plus an optional
/// Base64URL-wrapped `server_message_data` envelope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerToolCall {
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,
    #[prost(string, optional, tag = "2")]
    pub server_message_data: Option<String>,
}

/// Result of a prior tool call, keyed by `tool_call_id`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolCallResult {
    #[prost(string, tag = "1")]
    pub tool_call_id: String,
    #[prost(oneof = "tool_call_result::Result", tags = "2")]
    pub result: Option<tool_call_result::Result>,
}

pub mod tool_call_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "2")]
        CallMcpTool(super::McpToolResult),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct McpToolResult {
    #[prost(oneof = "mcp_tool_result::Outcome", tags = "1")]
    pub outcome: Option<mcp_tool_result::Outcome>,
}

pub mod mcp_tool_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Outcome {
        #[prost(message, tag = "1")]
        Success(super::McpToolSuccess),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct McpToolSuccess {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<ToolResultItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolResultItem {
    #[prost(oneof = "tool_result_item::Content", tags = "1")]
    pub content: Option<tool_result_item::Content>,
}

pub mod tool_result_item {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        #[prost(message, tag = "1")]
        Text(super::TextContent),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TextContent {
    #[prost(string, tag = "1")]
    pub text: String,
}
