//! OpenAI-compatible chat completion request DTOs.
//!
//! Field names match the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//! Message `content` can be a string, an array of parts, or a bare object
//! with `text`; we accept all three.

use serde::Deserialize;
use serde_json::Value;

/// Chat completion request body (OpenAI-compatible).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionsRequest {
    /// Model name. Falls through to the packet template default when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Ordered message history; must be non-empty.
    pub messages: Vec<ChatMessage>,
    /// When true, the response is streamed as SSE.
    #[serde(default)]
    pub stream: bool,
    /// Tool definitions; only `type == "function"` entries are forwarded.
    #[serde(default)]
    pub tools: Option<Vec<OpenAiTool>>,
    /// Accepted and ignored.
    #[serde(default)]
    pub tool_choice: Option<Value>,
}

/// A single message in the chat request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    /// "system", "user", "assistant", or "tool".
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
    /// Set on `role == "tool"` results.
    #[serde(default)]
    pub tool_call_id: Option<String>,
    /// Set on assistant messages that invoke tools.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn user(content: MessageContent) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content),
            tool_call_id: None,
            tool_calls: None,
            name: None,
        }
    }

    pub fn assistant(content: Option<MessageContent>, tool_calls: Option<Vec<ToolCallPayload>>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_call_id: None,
            tool_calls,
            name: None,
        }
    }

    /// Ids of all tool calls carried by this message, in order.
    pub fn tool_call_ids(&self) -> Vec<String> {
        self.tool_calls
            .iter()
            .flatten()
            .filter_map(|tc| tc.id.clone())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// Message content union: `"hello"`, `[{"type":"text","text":"hello"}]`, or
/// `{"text":"hello"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Other(Value),
}

/// One part of a content array. Only `type` and `text` are meaningful for
/// transcoding; anything else is dropped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub part_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// An assistant tool call as sent by OpenAI clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionPayload>,
}

/// Function name plus arguments (a JSON string or an inline object).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// OpenAI tool definition.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiTool {
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    #[serde(default)]
    pub function: Option<OpenAiFunctionDef>,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiFunctionDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
}
