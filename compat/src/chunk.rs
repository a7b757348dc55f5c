//! OpenAI response DTOs: streaming chunks and the buffered completion.
//!
//! Serialized field names match the OpenAI Chat Completions API; absent
//! fields are omitted rather than null where clients are known to care.

use serde::Serialize;
use serde_json::Value;

/// Shared metadata for all chunks of one stream (same id, created, model).
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub id: String,
    pub model: String,
    pub created: i64,
}

impl ChunkMeta {
    fn chunk(&self, delta: Delta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: ChatCompletionChunk::OBJECT,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            error: None,
        }
    }

    /// Role-only opener.
    pub fn role_chunk(&self) -> ChatCompletionChunk {
        self.chunk(
            Delta {
                role: Some("assistant".to_string()),
                ..Delta::default()
            },
            None,
        )
    }

    pub fn content_chunk(&self, text: impl Into<String>) -> ChatCompletionChunk {
        self.chunk(
            Delta {
                content: Some(text.into()),
                ..Delta::default()
            },
            None,
        )
    }

    pub fn reasoning_chunk(&self, text: impl Into<String>) -> ChatCompletionChunk {
        self.chunk(
            Delta {
                reasoning: Some(text.into()),
                ..Delta::default()
            },
            None,
        )
    }

    pub fn tool_call_chunk(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> ChatCompletionChunk {
        self.chunk(
            Delta {
                tool_calls: Some(vec![DeltaToolCall {
                    index: 0,
                    id: id.into(),
                    call_type: "function",
                    function: DeltaToolCallFunction {
                        name: name.into(),
                        arguments: arguments.into(),
                    },
                }]),
                ..Delta::default()
            },
            None,
        )
    }

    /// Final chunk: empty delta plus `"stop"` or `"tool_calls"`.
    pub fn finish_chunk(&self, finish_reason: &str) -> ChatCompletionChunk {
        self.chunk(Delta::default(), Some(finish_reason))
    }

    /// Post-header failure chunk: `finish_reason: "error"` plus the message.
    pub fn error_chunk(&self, message: impl Into<String>) -> ChatCompletionChunk {
        let mut chunk = self.chunk(Delta::default(), Some("error"));
        chunk.error = Some(ChunkError {
            message: message.into(),
        });
        chunk
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
}

impl ChatCompletionChunk {
    pub const OBJECT: &'static str = "chat.completion.chunk";

    /// One SSE line: `data: <JSON>\n\n`.
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaToolCall {
    pub index: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: &'static str,
    pub function: DeltaToolCallFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkError {
    pub message: String,
}

/// Buffered (non-stream) completion response.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
}

impl ChatCompletion {
    pub const OBJECT: &'static str = "chat.completion";

    pub fn new(meta: &ChunkMeta, content: String, tool_calls: Vec<Value>) -> Self {
        let (message, finish_reason) = if tool_calls.is_empty() {
            (
                AssistantMessage {
                    role: "assistant",
                    content,
                    tool_calls: None,
                },
                "stop",
            )
        } else {
            (
                AssistantMessage {
                    role: "assistant",
                    content: String::new(),
                    tool_calls: Some(tool_calls),
                },
                "tool_calls",
            )
        };
        Self {
            id: meta.id.clone(),
            object: Self::OBJECT,
            created: meta.created,
            model: meta.model.clone(),
            choices: vec![CompletionChoice {
                index: 0,
                message,
                finish_reason: finish_reason.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> ChunkMeta {
        ChunkMeta {
            id: "chatcmpl-1".to_string(),
            model: "gpt-5".to_string(),
            created: 1_700_000_000,
        }
    }

    #[test]
    fn role_chunk_shape() {
        let v: Value = serde_json::from_str(&meta().role_chunk().to_sse_data()).unwrap();
        assert_eq!(v["object"], "chat.completion.chunk");
        assert_eq!(v["choices"][0]["delta"], json!({"role": "assistant"}));
        assert!(v["choices"][0].get("finish_reason").is_none());
        assert!(v.get("error").is_none());
    }

    #[test]
    fn content_chunk_shape() {
        let v: Value = serde_json::from_str(&meta().content_chunk("hel").to_sse_data()).unwrap();
        assert_eq!(v["choices"][0]["delta"]["content"], "hel");
    }

    #[test]
    fn tool_call_chunk_shape() {
        let v: Value =
            serde_json::from_str(&meta().tool_call_chunk("x", "ls", "{}").to_sse_data()).unwrap();
        let tc = &v["choices"][0]["delta"]["tool_calls"][0];
        assert_eq!(tc["index"], 0);
        assert_eq!(tc["id"], "x");
        assert_eq!(tc["type"], "function");
        assert_eq!(tc["function"]["name"], "ls");
        assert_eq!(tc["function"]["arguments"], "{}");
    }

    #[test]
    fn finish_and_error_chunks() {
        let v: Value = serde_json::from_str(&meta().finish_chunk("stop").to_sse_data()).unwrap();
        assert_eq!(v["choices"][0]["finish_reason"], "stop");
        assert_eq!(v["choices"][0]["delta"], json!({}));

        let v: Value = serde_json::from_str(&meta().error_chunk("boom").to_sse_data()).unwrap();
        assert_eq!(v["choices"][0]["finish_reason"], "error");
        assert_eq!(v["error"]["message"], "boom");
    }

    #[test]
    fn completion_stop_vs_tool_calls() {
        let c = ChatCompletion::new(&meta(), "hello".into(), vec![]);
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["object"], "chat.completion");
        assert_eq!(v["choices"][0]["message"]["content"], "hello");
        assert_eq!(v["choices"][0]["finish_reason"], "stop");

        let c = ChatCompletion::new(&meta(), String::new(), vec![json!({"id": "x"})]);
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["choices"][0]["finish_reason"], "tool_calls");
        assert_eq!(v["choices"][0]["message"]["tool_calls"][0]["id"], "x");
        assert_eq!(v["choices"][0]["message"]["content"], "");
    }
}
