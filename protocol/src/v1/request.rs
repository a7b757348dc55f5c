//! Request-side messages: task context, current-turn inputs, settings,
//! metadata, and exposed MCP tools.

use super::{Task, ToolCallResult, UserQuery};

/// Top-level upstream request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(message, optional, tag = "1")]
    pub task_context: Option<TaskContext>,
    #[prost(message, optional, tag = "2")]
    pub input: Option<Input>,
    #[prost(message, optional, tag = "3")]
    pub settings: Option<Settings>,
    #[prost(message, optional, tag = "4")]
    pub metadata: Option<RequestMetadata>,
    #[prost(message, optional, tag = "5")]
    pub mcp_context: Option<McpContext>,
}

/// Turn history: every task plus the id of the one the inputs extend.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskContext {
    #[prost(message, repeated, tag = "1")]
    pub tasks: Vec<Task>,
    #[prost(string, tag = "2")]
    pub active_task_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Input {
    #[prost(message, optional, tag = "1")]
    pub context: Option<InputContext>,
    #[prost(message, optional, tag = "2")]
    pub user_inputs: Option<UserInputs>,
}

/// Ambient input context. `resume_conversation` is presence-only.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InputContext {
    #[prost(message, optional, tag = "1")]
    pub resume_conversation: Option<ResumeConversation>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ResumeConversation {}

/// Carries exactly the current turn: one user query or one tool result.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserInputs {
    #[prost(message, repeated, tag = "1")]
    pub inputs: Vec<UserInput>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserInput {
    #[prost(oneof = "user_input::Input", tags = "1, 2")]
    pub input: Option<user_input::Input>,
}

pub mod user_input {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Input {
        #[prost(message, tag = "1")]
        UserQuery(super::UserQuery),
        #[prost(message, tag = "2")]
        ToolCallResult(super::ToolCallResult),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Settings {
    #[prost(message, optional, tag = "1")]
    pub model_config: Option<ModelConfig>,
    #[prost(bool, tag = "2")]
    pub rules_enabled: bool,
    #[prost(bool, tag = "3")]
    pub web_context_retrieval_enabled: bool,
    #[prost(bool, tag = "4")]
    pub supports_parallel_tool_calls: bool,
    #[prost(bool, tag = "5")]
    pub planning_enabled: bool,
    #[prost(bool, tag = "6")]
    pub warp_drive_context_enabled: bool,
    #[prost(bool, tag = "7")]
    pub supports_create_files: bool,
    #[prost(bool, tag = "8")]
    pub use_anthropic_text_editor_tools: bool,
    #[prost(bool, tag = "9")]
    pub supports_long_running_commands: bool,
    #[prost(bool, tag = "10")]
    pub should_preserve_file_content_in_history: bool,
    #[prost(bool, tag = "11")]
    pub supports_todos_ui: bool,
    #[prost(bool, tag = "12")]
    pub supports_linked_code_blocks: bool,
    #[prost(enumeration = "SupportedTool", repeated, tag = "13")]
    pub supported_tools: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelConfig {
    #[prost(string, tag = "1")]
    pub base: String,
    #[prost(string, tag = "2")]
    pub planning: String,
    #[prost(string, tag = "3")]
    pub coding: String,
}

/// Tool families the client declares support for. The gateway always sends
/// `[CALL_MCP_TOOL]` (wire value 9, opaque upstream invariant).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SupportedTool {
    Unspecified = 0,
    CallMcpTool = 9,
}

impl SupportedTool {
    /// Resolves an enum name as it appears on the wire schema.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "SUPPORTED_TOOL_UNSPECIFIED" => Some(Self::Unspecified),
            "CALL_MCP_TOOL" => Some(Self::CallMcpTool),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestMetadata {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(message, optional, tag = "2")]
    pub logging: Option<LoggingMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoggingMetadata {
    #[prost(bool, tag = "1")]
    pub is_autodetected_user_query: bool,
    #[prost(enumeration = "Entrypoint", tag = "2")]
    pub entrypoint: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Entrypoint {
    Unspecified = 0,
    UserInitiated = 1,
}

impl Entrypoint {
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "ENTRYPOINT_UNSPECIFIED" => Some(Self::Unspecified),
            "USER_INITIATED" => Some(Self::UserInitiated),
            _ => None,
        }
    }
}

/// Tools exposed to the upstream model for this request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct McpContext {
    #[prost(message, repeated, tag = "1")]
    pub tools: Vec<McpTool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct McpTool {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub description: String,
    #[prost(message, optional, tag = "3")]
    pub input_schema: Option<::prost_types::Struct>,
}
