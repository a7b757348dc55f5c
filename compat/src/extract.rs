//! Response-event decoding: parsed event dictionaries → OpenAI deltas.
//!
//! Shared by the streaming transformer (per-event) and the buffered path
//! (whole `parsed_events` listing).

use serde_json::{json, Value};
use uuid::Uuid;

/// One OpenAI-visible delta produced by a response event.
#[derive(Clone, Debug, PartialEq)]
pub enum EventDelta {
    Content(String),
    Reasoning(String),
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
}

/// camelCase/snake_case tolerant key lookup.
fn get<'a>(d: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| d.get(n))
}

fn agent_output(message: &Value) -> Option<&Value> {
    get(message, &["agent_output", "agentOutput"])
}

/// Extracts a tool-call delta from a `tool_call` sub-message.
///
/// `call_mcp_tool` carries the function name directly and its `args` become
/// the arguments object. Any other single variant falls back to the variant
/// name as the function name with the variant body as arguments.
fn tool_call_delta(tool_call: &Value) -> Option<EventDelta> {
    let obj = tool_call.as_object()?;
    let id = get(tool_call, &["tool_call_id", "toolCallId"])
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Some(call_mcp) = get(tool_call, &["call_mcp_tool", "callMcpTool"]) {
        let name = call_mcp.get("name").and_then(Value::as_str)?;
        let args = call_mcp.get("args").cloned().unwrap_or_else(|| json!({}));
        return Some(EventDelta::ToolCall {
            id,
            name: name.to_string(),
            arguments: args.to_string(),
        });
    }

    // Oneof-name fallback: the first non-id key names the tool.
    let (name, body) = obj
        .iter()
        .find(|(k, _)| !matches!(k.as_str(), "tool_call_id" | "toolCallId"))?;
    Some(EventDelta::ToolCall {
        id,
        name: name.clone(),
        arguments: if body.is_object() {
            body.to_string()
        } else {
            "{}".to_string()
        },
    })
}

fn message_deltas(message: &Value, deltas: &mut Vec<EventDelta>) {
    if let Some(output) = agent_output(message) {
        if let Some(text) = output.get("text").and_then(Value::as_str) {
            if !text.is_empty() {
                deltas.push(EventDelta::Content(text.to_string()));
            }
        }
        if let Some(reasoning) = output.get("reasoning").and_then(Value::as_str) {
            if !reasoning.is_empty() {
                deltas.push(EventDelta::Reasoning(reasoning.to_string()));
            }
        }
    }
    if let Some(tool_call) = get(message, &["tool_call", "toolCall"]) {
        if let Some(delta) = tool_call_delta(tool_call) {
            deltas.push(delta);
        }
    }
}

/// All deltas produced by one parsed event, in source order.
pub fn deltas_from_event(event: &Value) -> Vec<EventDelta> {
    let mut deltas = Vec::new();
    let actions = get(event, &["client_actions", "clientActions"])
        .and_then(|ca| get(ca, &["actions", "Actions"]))
        .and_then(Value::as_array);
    for action in actions.into_iter().flatten() {
        if let Some(append) = get(action, &["append_to_message_content", "appendToMessageContent"])
        {
            if let Some(message) = append.get("message") {
                message_deltas(message, &mut deltas);
            }
        }
        if let Some(add) = get(action, &["add_messages_to_task", "addMessagesToTask"]) {
            for message in add
                .get("messages")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                message_deltas(message, &mut deltas);
            }
        }
        if let Some(update) = get(action, &["update_task_message", "updateTaskMessage"]) {
            if let Some(text) = update
                .get("message")
                .and_then(agent_output)
                .and_then(|o| o.get("text"))
                .and_then(Value::as_str)
            {
                if !text.is_empty() {
                    deltas.push(EventDelta::Content(text.to_string()));
                }
            }
        }
        if let Some(create) = get(action, &["create_task", "createTask"]) {
            for message in create
                .pointer("/task/messages")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                if let Some(text) = agent_output(message)
                    .and_then(|o| o.get("text"))
                    .and_then(Value::as_str)
                {
                    if !text.is_empty() {
                        deltas.push(EventDelta::Content(text.to_string()));
                    }
                }
            }
        }
        if let Some(update) = get(action, &["update_task_summary", "updateTaskSummary"]) {
            if let Some(summary) = update.get("summary").and_then(Value::as_str) {
                if !summary.is_empty() {
                    deltas.push(EventDelta::Content(summary.to_string()));
                }
            }
        }
    }
    deltas
}

/// True when the event carries the stream-terminating `finished` marker.
pub fn is_finished(event: &Value) -> bool {
    event.get("finished").is_some()
}

/// Collects OpenAI tool-call objects from a buffered `parsed_events` listing.
pub fn collect_tool_calls(parsed_events: &[Value]) -> Vec<Value> {
    let mut tool_calls = Vec::new();
    let null = Value::Null;
    for ev in parsed_events {
        let event_data = get(ev, &["parsed_data", "raw_data"]).unwrap_or(&null);
        for delta in deltas_from_event(event_data) {
            if let EventDelta::ToolCall {
                id,
                name,
                arguments,
            } = delta
            {
                tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments},
                }));
            }
        }
    }
    tool_calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_content_yields_text_delta() {
        let ev = json!({"client_actions": {"actions": [
            {"append_to_message_content": {"message": {"agent_output": {"text": "hel", "reasoning": "because"}}}}
        ]}});
        assert_eq!(
            deltas_from_event(&ev),
            vec![
                EventDelta::Content("hel".to_string()),
                EventDelta::Reasoning("because".to_string()),
            ]
        );
    }

    #[test]
    fn add_messages_yields_tool_call() {
        let ev = json!({"client_actions": {"actions": [
            {"add_messages_to_task": {"messages": [{
                "tool_call": {
                    "tool_call_id": "x",
                    "call_mcp_tool": {"name": "ls", "args": {"p": "/"}}
                }
            }]}}
        ]}});
        let deltas = deltas_from_event(&ev);
        assert_eq!(deltas.len(), 1);
        let EventDelta::ToolCall { id, name, arguments } = &deltas[0] else {
            panic!("expected tool call");
        };
        assert_eq!(id, "x");
        assert_eq!(name, "ls");
        assert_eq!(
            serde_json::from_str::<Value>(arguments).unwrap(),
            json!({"p": "/"})
        );
    }

    #[test]
    fn oneof_fallback_names_the_tool() {
        let ev = json!({"client_actions": {"actions": [
            {"add_messages_to_task": {"messages": [{
                "tool_call": {"tool_call_id": "y", "run_command": {"command": "ls"}}
            }]}}
        ]}});
        let deltas = deltas_from_event(&ev);
        let EventDelta::ToolCall { name, arguments, .. } = &deltas[0] else {
            panic!("expected tool call");
        };
        assert_eq!(name, "run_command");
        assert_eq!(
            serde_json::from_str::<Value>(arguments).unwrap(),
            json!({"command": "ls"})
        );
    }

    #[test]
    fn missing_tool_call_id_gets_generated() {
        let ev = json!({"client_actions": {"actions": [
            {"add_messages_to_task": {"messages": [{
                "tool_call": {"call_mcp_tool": {"name": "ls"}}
            }]}}
        ]}});
        let deltas = deltas_from_event(&ev);
        let EventDelta::ToolCall { id, .. } = &deltas[0] else {
            panic!("expected tool call");
        };
        assert!(!id.is_empty());
    }

    #[test]
    fn update_create_and_summary_become_content() {
        let ev = json!({"client_actions": {"actions": [
            {"update_task_message": {"message": {"agent_output": {"text": "a"}}}},
            {"create_task": {"task": {"messages": [{"agent_output": {"text": "b"}}]}}},
            {"update_task_summary": {"summary": "c"}},
        ]}});
        assert_eq!(
            deltas_from_event(&ev),
            vec![
                EventDelta::Content("a".to_string()),
                EventDelta::Content("b".to_string()),
                EventDelta::Content("c".to_string()),
            ]
        );
    }

    #[test]
    fn finished_detection() {
        assert!(is_finished(&json!({"finished": {}})));
        assert!(!is_finished(&json!({"init": {}})));
    }

    #[test]
    fn collect_tool_calls_from_parsed_events() {
        let events = vec![
            json!({"parsed_data": {"client_actions": {"actions": [
                {"add_messages_to_task": {"messages": [{
                    "tool_call": {"tool_call_id": "x", "call_mcp_tool": {"name": "ls", "args": {}}}
                }]}}
            ]}}}),
            json!({"parsed_data": {"finished": {}}}),
        ];
        let calls = collect_tool_calls(&events);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["id"], "x");
        assert_eq!(calls[0]["type"], "function");
        assert_eq!(calls[0]["function"]["name"], "ls");
    }
}
