//! Upstream packet construction: template, history transcoding, and
//! current-turn input attachment.

use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::content::{normalize_content_to_list, segments_to_text, segments_to_warp_results};
use crate::request::ChatMessage;
use crate::settings::DEFAULT_BASE_MODEL;

/// Opaque preamble payload; the upstream expects it verbatim as the first
/// history message.
pub const PREAMBLE_SERVER_PAYLOAD: &str = "IgIQAQ==";

/// Fixed prefix for system prompts, disabling the upstream's built-in tools.
/// The text is load-bearing; keep it byte-for-byte.
pub const SYSTEM_PROMPT_ALERT: &str = "<ALERT>you are not allowed to call following tools:  - `read_files`\n- `write_files`\n- `run_commands`\n- `list_files`\n- `str_replace_editor`\n- `ask_followup_question`\n- `attempt_completion`</ALERT>";

/// Protocol violations in the reordered history. Mapped to 500 by the
/// router; never an assertion.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("post-reorder history must contain at least one message")]
    EmptyHistory,
    #[error("final reordered message must be a user message or a tool result")]
    InvalidFinalMessage,
}

/// Base request packet: fixed settings, default model config, logging
/// metadata. Callers fill `task_context`, `input`, and `mcp_context`.
pub fn packet_template() -> Value {
    json!({
        "task_context": {"active_task_id": ""},
        "input": {"context": {}, "user_inputs": {"inputs": []}},
        "settings": {
            "model_config": {
                "base": DEFAULT_BASE_MODEL,
                "planning": "gpt-5 (high reasoning)",
                "coding": "auto",
            },
            "rules_enabled": false,
            "web_context_retrieval_enabled": false,
            "supports_parallel_tool_calls": false,
            "planning_enabled": false,
            "warp_drive_context_enabled": false,
            "supports_create_files": false,
            "use_anthropic_text_editor_tools": false,
            "supports_long_running_commands": false,
            "should_preserve_file_content_in_history": false,
            "supports_todos_ui": false,
            "supports_linked_code_blocks": false,
            "supported_tools": [9],
        },
        "metadata": {"logging": {"is_autodetected_user_query": true, "entrypoint": "USER_INITIATED"}},
    })
}

/// Index of the final turn input: the last user message or tool result.
fn last_input_index(history: &[ChatMessage]) -> Option<usize> {
    history.iter().rposition(|m| {
        m.role == "user"
            || (m.role == "tool" && m.tool_call_id.as_deref().is_some_and(|id| !id.is_empty()))
    })
}

/// Parses OpenAI tool-call arguments (JSON string or inline object) into an
/// object, defaulting to `{}`.
fn tool_call_args(arguments: Option<&Value>) -> Value {
    match arguments {
        Some(Value::String(s)) => serde_json::from_str(s)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({})),
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({}),
    }
}

/// Transcodes the reordered history (minus its final input) into the task's
/// `messages[]`, preamble first.
pub fn map_history_to_warp_messages(
    history: &[ChatMessage],
    task_id: &str,
    tool_call_id: &str,
    tool_message_id: &str,
) -> Vec<Value> {
    let mut msgs = vec![json!({
        "id": tool_message_id,
        "task_id": task_id,
        "tool_call": {
            "tool_call_id": tool_call_id,
            "server": {"payload": PREAMBLE_SERVER_PAYLOAD},
        },
    })];

    let skip = last_input_index(history);
    for (i, m) in history.iter().enumerate() {
        if skip == Some(i) {
            continue;
        }
        match m.role.as_str() {
            "user" => {
                let query = segments_to_text(&normalize_content_to_list(m.content.as_ref()));
                msgs.push(json!({
                    "id": Uuid::new_v4().to_string(),
                    "task_id": task_id,
                    "user_query": {"query": query},
                }));
            }
            "assistant" => {
                let text = segments_to_text(&normalize_content_to_list(m.content.as_ref()));
                if !text.is_empty() {
                    msgs.push(json!({
                        "id": Uuid::new_v4().to_string(),
                        "task_id": task_id,
                        "agent_output": {"text": text},
                    }));
                }
                for tc in m.tool_calls.iter().flatten() {
                    let function = tc.function.as_ref();
                    msgs.push(json!({
                        "id": Uuid::new_v4().to_string(),
                        "task_id": task_id,
                        "tool_call": {
                            "tool_call_id": tc
                                .id
                                .clone()
                                .unwrap_or_else(|| Uuid::new_v4().to_string()),
                            "call_mcp_tool": {
                                "name": function.and_then(|f| f.name.clone()).unwrap_or_default(),
                                "args": tool_call_args(function.and_then(|f| f.arguments.as_ref())),
                            },
                        },
                    }));
                }
            }
            "tool" => {
                if let Some(id) = m.tool_call_id.as_ref().filter(|id| !id.is_empty()) {
                    let results =
                        segments_to_warp_results(&normalize_content_to_list(m.content.as_ref()));
                    msgs.push(json!({
                        "id": Uuid::new_v4().to_string(),
                        "task_id": task_id,
                        "tool_call_result": {
                            "tool_call_id": id,
                            "call_mcp_tool": {"success": {"results": results}},
                        },
                    }));
                }
            }
            _ => {}
        }
    }
    msgs
}

/// Appends the final reordered message to `input.user_inputs.inputs[]`: a
/// user query (with the system prompt attachment when one was collected) or
/// a tool result. Any other final role is a protocol violation.
pub fn attach_user_and_tools_to_inputs(
    packet: &mut Value,
    history: &[ChatMessage],
    system_prompt_text: Option<&str>,
) -> Result<(), PacketError> {
    let last = history.last().ok_or(PacketError::EmptyHistory)?;

    let input = if last.role == "user" {
        let query = segments_to_text(&normalize_content_to_list(last.content.as_ref()));
        let mut user_query = Map::new();
        user_query.insert("query".into(), json!(query));
        if let Some(prompt) = system_prompt_text.filter(|p| !p.is_empty()) {
            user_query.insert(
                "referenced_attachments".into(),
                json!({
                    "SYSTEM_PROMPT": {
                        "plain_text": format!("{SYSTEM_PROMPT_ALERT}{prompt}"),
                    }
                }),
            );
        }
        json!({"user_query": Value::Object(user_query)})
    } else if last.role == "tool" {
        let id = last
            .tool_call_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .ok_or(PacketError::InvalidFinalMessage)?;
        let results = segments_to_warp_results(&normalize_content_to_list(last.content.as_ref()));
        json!({
            "tool_call_result": {
                "tool_call_id": id,
                "call_mcp_tool": {"success": {"results": results}},
            }
        })
    } else {
        return Err(PacketError::InvalidFinalMessage);
    };

    if let Some(inputs) = packet
        .pointer_mut("/input/user_inputs/inputs")
        .and_then(Value::as_array_mut)
    {
        inputs.push(input);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{FunctionPayload, MessageContent, ToolCallPayload};

    fn user(text: &str) -> ChatMessage {
        ChatMessage::user(MessageContent::Text(text.to_string()))
    }

    fn tool_result(id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            role: "tool".to_string(),
            content: Some(MessageContent::Text(text.to_string())),
            tool_call_id: Some(id.to_string()),
            tool_calls: None,
            name: None,
        }
    }

    #[test]
    fn template_carries_fixed_settings() {
        let t = packet_template();
        assert_eq!(t["settings"]["supported_tools"], json!([9]));
        assert_eq!(t["settings"]["model_config"]["base"], DEFAULT_BASE_MODEL);
        assert_eq!(t["metadata"]["logging"]["entrypoint"], "USER_INITIATED");
        assert_eq!(t["input"]["user_inputs"]["inputs"], json!([]));
    }

    #[test]
    fn preamble_is_first_history_message() {
        let msgs = map_history_to_warp_messages(&[user("hi")], "T", "tc-1", "tm-1");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["id"], "tm-1");
        assert_eq!(msgs[0]["tool_call"]["tool_call_id"], "tc-1");
        assert_eq!(
            msgs[0]["tool_call"]["server"]["payload"],
            PREAMBLE_SERVER_PAYLOAD
        );
    }

    #[test]
    fn final_input_is_skipped_from_history() {
        let history = vec![
            user("first"),
            ChatMessage::assistant(Some(MessageContent::Text("reply".into())), None),
            user("second"),
        ];
        let msgs = map_history_to_warp_messages(&history, "T", "tc", "tm");
        // Preamble + first user + assistant; "second" goes to inputs instead.
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1]["user_query"]["query"], "first");
        assert_eq!(msgs[2]["agent_output"]["text"], "reply");
    }

    #[test]
    fn assistant_tool_calls_parse_string_arguments() {
        let history = vec![
            ChatMessage::assistant(
                None,
                Some(vec![ToolCallPayload {
                    id: Some("x".into()),
                    call_type: Some("function".into()),
                    function: Some(FunctionPayload {
                        name: Some("ls".into()),
                        arguments: Some(json!("{\"p\":\"/\"}")),
                    }),
                }]),
            ),
            user("next"),
        ];
        let msgs = map_history_to_warp_messages(&history, "T", "tc", "tm");
        let call = &msgs[1]["tool_call"]["call_mcp_tool"];
        assert_eq!(call["name"], "ls");
        assert_eq!(call["args"], json!({"p": "/"}));
    }

    #[test]
    fn attach_user_final_message() {
        let mut packet = packet_template();
        attach_user_and_tools_to_inputs(&mut packet, &[user("hi")], None).unwrap();
        let inputs = packet["input"]["user_inputs"]["inputs"].as_array().unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0]["user_query"]["query"], "hi");
        assert!(inputs[0]["user_query"].get("referenced_attachments").is_none());
    }

    #[test]
    fn attach_user_with_system_prompt() {
        let mut packet = packet_template();
        attach_user_and_tools_to_inputs(&mut packet, &[user("hi")], Some("be terse")).unwrap();
        let plain = packet["input"]["user_inputs"]["inputs"][0]["user_query"]
            ["referenced_attachments"]["SYSTEM_PROMPT"]["plain_text"]
            .as_str()
            .unwrap();
        assert!(plain.starts_with("<ALERT>"));
        assert!(plain.contains("</ALERT>"));
        assert!(plain.ends_with("be terse"));
    }

    #[test]
    fn attach_tool_result_final_message() {
        let mut packet = packet_template();
        let history = vec![user("list"), tool_result("x", "a\nb")];
        attach_user_and_tools_to_inputs(&mut packet, &history, None).unwrap();
        let input = &packet["input"]["user_inputs"]["inputs"][0];
        assert_eq!(input["tool_call_result"]["tool_call_id"], "x");
        assert_eq!(
            input["tool_call_result"]["call_mcp_tool"]["success"]["results"],
            json!([{"text": {"text": "a\nb"}}])
        );
    }

    #[test]
    fn attach_rejects_assistant_final_message() {
        let mut packet = packet_template();
        let history = vec![ChatMessage::assistant(
            Some(MessageContent::Text("x".into())),
            None,
        )];
        assert!(matches!(
            attach_user_and_tools_to_inputs(&mut packet, &history, None),
            Err(PacketError::InvalidFinalMessage)
        ));
    }

    #[test]
    fn attach_rejects_empty_history() {
        let mut packet = packet_template();
        assert!(matches!(
            attach_user_and_tools_to_inputs(&mut packet, &[], None),
            Err(PacketError::EmptyHistory)
        ));
    }
}
