//! JSON packet ↔ protobuf conversion.
//!
//! The bridge receives request packets as JSON (the compat layer builds
//! them) and hands back parsed response events as JSON. Conversion walks the
//! packet by field name: unknown fields are logged and skipped, leaf type
//! mismatches are logged and left at their default, and structural errors
//! (a non-object where a message is required) fail the conversion.
//!
//! Special cases, mirroring the upstream schema:
//! - `google.protobuf.Struct` fields (`args`, `input_schema`) are built as
//!   value trees from arbitrary JSON;
//! - map entries (`referenced_attachments`) recurse per key;
//! - enum fields accept wire names or numbers;
//! - `in_progress` and `resume_conversation` are presence-only;
//! - `server_message_data` objects are re-encoded to their Base64URL wire
//!   form before population, and decoded back after parsing;
//! - bytes fields (`server.payload`) carry standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prost::Message;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::ProtoError;
use crate::server_message_data;
use crate::v1::*;

/// Converts a request packet to protobuf bytes.
pub fn request_to_bytes(value: &Value) -> Result<Vec<u8>, ProtoError> {
    Ok(request_from_json(value)?.encode_to_vec())
}

/// Parses a response event and converts it to its JSON dictionary form.
pub fn response_event_json_from_bytes(bytes: &[u8]) -> Result<Value, ProtoError> {
    let ev = ResponseEvent::decode(bytes)?;
    Ok(response_event_to_json(&ev))
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ProtoError> {
    value
        .as_object()
        .ok_or_else(|| ProtoError::NotAnObject(path.to_string()))
}

fn skip_unknown(path: &str, key: &str) {
    warn!("ignoring unknown field: {path}.{key}");
}

fn str_value(v: &Value, path: &str) -> Option<String> {
    match v.as_str() {
        Some(s) => Some(s.to_string()),
        None => {
            warn!("expected string at {path}, skipping");
            None
        }
    }
}

fn bool_value(v: &Value, path: &str) -> Option<bool> {
    match v.as_bool() {
        Some(b) => Some(b),
        None => {
            warn!("expected bool at {path}, skipping");
            None
        }
    }
}

/// Builds a `google.protobuf.Struct` from a JSON object.
pub fn json_to_struct(obj: &Map<String, Value>) -> prost_types::Struct {
    prost_types::Struct {
        fields: obj
            .iter()
            .map(|(k, v)| (k.clone(), json_to_struct_value(v)))
            .collect(),
    }
}

fn json_to_struct_value(v: &Value) -> prost_types::Value {
    use prost_types::value::Kind;
    let kind = match v {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(json_to_struct_value).collect(),
        }),
        Value::Object(map) => Kind::StructValue(json_to_struct(map)),
    };
    prost_types::Value { kind: Some(kind) }
}

/// Renders a `google.protobuf.Struct` back to a JSON object.
pub fn struct_to_json(s: &prost_types::Struct) -> Value {
    Value::Object(
        s.fields
            .iter()
            .map(|(k, v)| (k.clone(), struct_value_to_json(v)))
            .collect(),
    )
}

fn struct_value_to_json(v: &prost_types::Value) -> Value {
    use prost_types::value::Kind;
    match &v.kind {
        Some(Kind::NullValue(_)) | None => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.iter().map(struct_value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => struct_to_json(s),
    }
}

pub fn request_from_json(value: &Value) -> Result<Request, ProtoError> {
    let obj = as_object(value, "$")?;
    let mut req = Request::default();
    for (key, v) in obj {
        let path = format!("$.{key}");
        match key.as_str() {
            "task_context" => req.task_context = Some(task_context_from_json(v, &path)?),
            "input" => req.input = Some(input_from_json(v, &path)?),
            "settings" => req.settings = Some(settings_from_json(v, &path)?),
            "metadata" => req.metadata = Some(metadata_from_json(v, &path)?),
            "mcp_context" => req.mcp_context = Some(mcp_context_from_json(v, &path)?),
            _ => skip_unknown("$", key),
        }
    }
    Ok(req)
}

fn task_context_from_json(value: &Value, path: &str) -> Result<TaskContext, ProtoError> {
    let obj = as_object(value, path)?;
    let mut ctx = TaskContext::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "tasks" => {
                for (idx, item) in v.as_array().into_iter().flatten().enumerate() {
                    ctx.tasks.push(task_from_json(item, &format!("{sub}[{idx}]"))?);
                }
            }
            "active_task_id" => {
                if let Some(s) = str_value(v, &sub) {
                    ctx.active_task_id = s;
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(ctx)
}

fn task_from_json(value: &Value, path: &str) -> Result<Task, ProtoError> {
    let obj = as_object(value, path)?;
    let mut task = Task::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "id" => {
                if let Some(s) = str_value(v, &sub) {
                    task.id = s;
                }
            }
            "description" => {
                if let Some(s) = str_value(v, &sub) {
                    task.description = s;
                }
            }
            "status" => {
                let status_obj = as_object(v, &sub)?;
                let mut status = TaskStatus::default();
                for (sk, _) in status_obj {
                    match sk.as_str() {
                        // Presence-only: being set is the whole signal.
                        "in_progress" => status.in_progress = Some(InProgress {}),
                        _ => skip_unknown(&sub, sk),
                    }
                }
                task.status = Some(status);
            }
            "messages" => {
                for (idx, item) in v.as_array().into_iter().flatten().enumerate() {
                    task.messages
                        .push(task_message_from_json(item, &format!("{sub}[{idx}]"))?);
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(task)
}

fn task_message_from_json(value: &Value, path: &str) -> Result<TaskMessage, ProtoError> {
    let obj = as_object(value, path)?;
    let mut msg = TaskMessage::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "id" => {
                if let Some(s) = str_value(v, &sub) {
                    msg.id = s;
                }
            }
            "task_id" => {
                if let Some(s) = str_value(v, &sub) {
                    msg.task_id = s;
                }
            }
            "user_query" => {
                msg.kind = Some(task_message::Kind::UserQuery(user_query_from_json(
                    v, &sub,
                )?));
            }
            "agent_output" => {
                msg.kind = Some(task_message::Kind::AgentOutput(agent_output_from_json(
                    v, &sub,
                )?));
            }
            "tool_call" => {
                msg.kind = Some(task_message::Kind::ToolCall(tool_call_from_json(v, &sub)?));
            }
            "tool_call_result" => {
                msg.kind = Some(task_message::Kind::ToolCallResult(
                    tool_call_result_from_json(v, &sub)?,
                ));
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(msg)
}

fn user_query_from_json(value: &Value, path: &str) -> Result<UserQuery, ProtoError> {
    let obj = as_object(value, path)?;
    let mut uq = UserQuery::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "query" => {
                if let Some(s) = str_value(v, &sub) {
                    uq.query = s;
                }
            }
            "referenced_attachments" => {
                let map = as_object(v, &sub)?;
                for (name, att) in map {
                    uq.referenced_attachments.insert(
                        name.clone(),
                        attachment_from_json(att, &format!("{sub}.{name}"))?,
                    );
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(uq)
}

fn attachment_from_json(value: &Value, path: &str) -> Result<Attachment, ProtoError> {
    let obj = as_object(value, path)?;
    let mut att = Attachment::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "plain_text" => {
                if let Some(s) = str_value(v, &sub) {
                    att.plain_text = s;
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(att)
}

fn agent_output_from_json(value: &Value, path: &str) -> Result<AgentOutput, ProtoError> {
    let obj = as_object(value, path)?;
    let mut out = AgentOutput::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "text" => {
                if let Some(s) = str_value(v, &sub) {
                    out.text = s;
                }
            }
            "reasoning" => {
                if let Some(s) = str_value(v, &sub) {
                    out.reasoning = s;
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(out)
}

fn tool_call_from_json(value: &Value, path: &str) -> Result<ToolCall, ProtoError> {
    let obj = as_object(value, path)?;
    let mut tc = ToolCall::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "tool_call_id" => {
                if let Some(s) = str_value(v, &sub) {
                    tc.tool_call_id = s;
                }
            }
            "call_mcp_tool" => {
                tc.tool = Some(tool_call::Tool::CallMcpTool(call_mcp_tool_from_json(
                    v, &sub,
                )?));
            }
            "server" => {
                tc.tool = Some(tool_call::Tool::Server(server_tool_call_from_json(
                    v, &sub,
                )?));
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(tc)
}

fn call_mcp_tool_from_json(value: &Value, path: &str) -> Result<CallMcpTool, ProtoError> {
    let obj = as_object(value, path)?;
    let mut call = CallMcpTool::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "name" => {
                if let Some(s) = str_value(v, &sub) {
                    call.name = s;
                }
            }
            "args" => match v.as_object() {
                Some(map) => call.args = Some(json_to_struct(map)),
                None => warn!("expected object at {sub}, skipping"),
            },
            _ => skip_unknown(path, key),
        }
    }
    Ok(call)
}

fn server_tool_call_from_json(value: &Value, path: &str) -> Result<ServerToolCall, ProtoError> {
    let obj = as_object(value, path)?;
    let mut server = ServerToolCall::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "payload" => match v.as_str().and_then(|s| STANDARD.decode(s).ok()) {
                Some(bytes) => server.payload = bytes,
                None => warn!("expected base64 string at {sub}, skipping"),
            },
            "server_message_data" | "serverMessageData" => match v {
                Value::String(s) => server.server_message_data = Some(s.clone()),
                Value::Object(map) => {
                    server.server_message_data = Some(server_message_data::encode_from_json(map));
                }
                _ => warn!("expected string or object at {sub}, skipping"),
            },
            _ => skip_unknown(path, key),
        }
    }
    Ok(server)
}

fn tool_call_result_from_json(value: &Value, path: &str) -> Result<ToolCallResult, ProtoError> {
    let obj = as_object(value, path)?;
    let mut result = ToolCallResult::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "tool_call_id" => {
                if let Some(s) = str_value(v, &sub) {
                    result.tool_call_id = s;
                }
            }
            "call_mcp_tool" => {
                result.result = Some(tool_call_result::Result::CallMcpTool(
                    mcp_tool_result_from_json(v, &sub)?,
                ));
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(result)
}

fn mcp_tool_result_from_json(value: &Value, path: &str) -> Result<McpToolResult, ProtoError> {
    let obj = as_object(value, path)?;
    let mut result = McpToolResult::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "success" => {
                result.outcome = Some(mcp_tool_result::Outcome::Success(
                    mcp_tool_success_from_json(v, &sub)?,
                ));
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(result)
}

fn mcp_tool_success_from_json(value: &Value, path: &str) -> Result<McpToolSuccess, ProtoError> {
    let obj = as_object(value, path)?;
    let mut success = McpToolSuccess::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "results" => {
                for (idx, item) in v.as_array().into_iter().flatten().enumerate() {
                    success
                        .results
                        .push(tool_result_item_from_json(item, &format!("{sub}[{idx}]"))?);
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(success)
}

fn tool_result_item_from_json(value: &Value, path: &str) -> Result<ToolResultItem, ProtoError> {
    let obj = as_object(value, path)?;
    let mut item = ToolResultItem::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "text" => {
                let text_obj = as_object(v, &sub)?;
                let mut text = TextContent::default();
                for (tk, tv) in text_obj {
                    match tk.as_str() {
                        "text" => {
                            if let Some(s) = str_value(tv, &format!("{sub}.text")) {
                                text.text = s;
                            }
                        }
                        _ => skip_unknown(&sub, tk),
                    }
                }
                item.content = Some(tool_result_item::Content::Text(text));
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(item)
}

fn input_from_json(value: &Value, path: &str) -> Result<Input, ProtoError> {
    let obj = as_object(value, path)?;
    let mut input = Input::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "context" => {
                let ctx_obj = as_object(v, &sub)?;
                let mut ctx = InputContext::default();
                for (ck, _) in ctx_obj {
                    match ck.as_str() {
                        "resume_conversation" => ctx.resume_conversation = Some(ResumeConversation {}),
                        _ => skip_unknown(&sub, ck),
                    }
                }
                input.context = Some(ctx);
            }
            "user_inputs" => {
                let ui_obj = as_object(v, &sub)?;
                let mut user_inputs = UserInputs::default();
                for (uk, uv) in ui_obj {
                    match uk.as_str() {
                        "inputs" => {
                            for (idx, item) in uv.as_array().into_iter().flatten().enumerate() {
                                user_inputs.inputs.push(user_input_from_json(
                                    item,
                                    &format!("{sub}.inputs[{idx}]"),
                                )?);
                            }
                        }
                        _ => skip_unknown(&sub, uk),
                    }
                }
                input.user_inputs = Some(user_inputs);
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(input)
}

fn user_input_from_json(value: &Value, path: &str) -> Result<UserInput, ProtoError> {
    let obj = as_object(value, path)?;
    let mut input = UserInput::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "user_query" => {
                input.input = Some(user_input::Input::UserQuery(user_query_from_json(
                    v, &sub,
                )?));
            }
            "tool_call_result" => {
                input.input = Some(user_input::Input::ToolCallResult(
                    tool_call_result_from_json(v, &sub)?,
                ));
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(input)
}

fn settings_from_json(value: &Value, path: &str) -> Result<Settings, ProtoError> {
    let obj = as_object(value, path)?;
    let mut settings = Settings::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "model_config" => {
                let mc_obj = as_object(v, &sub)?;
                let mut mc = ModelConfig::default();
                for (mk, mv) in mc_obj {
                    let mc_sub = format!("{sub}.{mk}");
                    match mk.as_str() {
                        "base" => {
                            if let Some(s) = str_value(mv, &mc_sub) {
                                mc.base = s;
                            }
                        }
                        "planning" => {
                            if let Some(s) = str_value(mv, &mc_sub) {
                                mc.planning = s;
                            }
                        }
                        "coding" => {
                            if let Some(s) = str_value(mv, &mc_sub) {
                                mc.coding = s;
                            }
                        }
                        _ => skip_unknown(&sub, mk),
                    }
                }
                settings.model_config = Some(mc);
            }
            "supported_tools" => {
                for item in v.as_array().into_iter().flatten() {
                    match supported_tool_number(item) {
                        Some(n) => settings.supported_tools.push(n),
                        None => warn!("cannot resolve enum value {item} at {sub}, skipping"),
                    }
                }
            }
            "rules_enabled" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.rules_enabled = b;
                }
            }
            "web_context_retrieval_enabled" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.web_context_retrieval_enabled = b;
                }
            }
            "supports_parallel_tool_calls" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.supports_parallel_tool_calls = b;
                }
            }
            "planning_enabled" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.planning_enabled = b;
                }
            }
            "warp_drive_context_enabled" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.warp_drive_context_enabled = b;
                }
            }
            "supports_create_files" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.supports_create_files = b;
                }
            }
            "use_anthropic_text_editor_tools" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.use_anthropic_text_editor_tools = b;
                }
            }
            "supports_long_running_commands" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.supports_long_running_commands = b;
                }
            }
            "should_preserve_file_content_in_history" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.should_preserve_file_content_in_history = b;
                }
            }
            "supports_todos_ui" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.supports_todos_ui = b;
                }
            }
            "supports_linked_code_blocks" => {
                if let Some(b) = bool_value(v, &sub) {
                    settings.supports_linked_code_blocks = b;
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(settings)
}

/// Enum values arrive as wire names or numbers.
fn supported_tool_number(v: &Value) -> Option<i32> {
    if let Some(n) = v.as_i64() {
        return Some(n as i32);
    }
    let s = v.as_str()?;
    if let Some(tool) = SupportedTool::from_wire_name(s) {
        return Some(tool as i32);
    }
    s.parse().ok()
}

fn metadata_from_json(value: &Value, path: &str) -> Result<RequestMetadata, ProtoError> {
    let obj = as_object(value, path)?;
    let mut meta = RequestMetadata::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "conversation_id" => {
                if let Some(s) = str_value(v, &sub) {
                    meta.conversation_id = s;
                }
            }
            "logging" => {
                let log_obj = as_object(v, &sub)?;
                let mut logging = LoggingMetadata::default();
                for (lk, lv) in log_obj {
                    let log_sub = format!("{sub}.{lk}");
                    match lk.as_str() {
                        "is_autodetected_user_query" => {
                            if let Some(b) = bool_value(lv, &log_sub) {
                                logging.is_autodetected_user_query = b;
                            }
                        }
                        "entrypoint" => match entrypoint_number(lv) {
                            Some(n) => logging.entrypoint = n,
                            None => warn!("cannot resolve enum value {lv} at {log_sub}, skipping"),
                        },
                        _ => skip_unknown(&sub, lk),
                    }
                }
                meta.logging = Some(logging);
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(meta)
}

fn entrypoint_number(v: &Value) -> Option<i32> {
    if let Some(n) = v.as_i64() {
        return Some(n as i32);
    }
    let s = v.as_str()?;
    if let Some(e) = Entrypoint::from_wire_name(s) {
        return Some(e as i32);
    }
    s.parse().ok()
}

fn mcp_context_from_json(value: &Value, path: &str) -> Result<McpContext, ProtoError> {
    let obj = as_object(value, path)?;
    let mut ctx = McpContext::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "tools" => {
                for (idx, item) in v.as_array().into_iter().flatten().enumerate() {
                    ctx.tools
                        .push(mcp_tool_from_json(item, &format!("{sub}[{idx}]"))?);
                }
            }
            _ => skip_unknown(path, key),
        }
    }
    Ok(ctx)
}

fn mcp_tool_from_json(value: &Value, path: &str) -> Result<McpTool, ProtoError> {
    let obj = as_object(value, path)?;
    let mut tool = McpTool::default();
    for (key, v) in obj {
        let sub = format!("{path}.{key}");
        match key.as_str() {
            "name" => {
                if let Some(s) = str_value(v, &sub) {
                    tool.name = s;
                }
            }
            "description" => {
                if let Some(s) = str_value(v, &sub) {
                    tool.description = s;
                }
            }
            "input_schema" | "inputSchema" => match v.as_object() {
                Some(map) => tool.input_schema = Some(json_to_struct(map)),
                None => warn!("expected object at {sub}, skipping"),
            },
            _ => skip_unknown(path, key),
        }
    }
    Ok(tool)
}

/// Renders a response event as a JSON dictionary preserving proto field
/// names; default-valued scalars are omitted, set sub-messages are kept even
/// when empty (callers key on presence of `init` / `finished`).
pub fn response_event_to_json(ev: &ResponseEvent) -> Value {
    let mut root = Map::new();
    if let Some(init) = &ev.init {
        let mut obj = Map::new();
        if !init.conversation_id.is_empty() {
            obj.insert("conversation_id".into(), json!(init.conversation_id));
        }
        if !init.task_id.is_empty() {
            obj.insert("task_id".into(), json!(init.task_id));
        }
        root.insert("init".into(), Value::Object(obj));
    }
    if let Some(actions) = &ev.client_actions {
        let mut obj = Map::new();
        if !actions.actions.is_empty() {
            obj.insert(
                "actions".into(),
                Value::Array(actions.actions.iter().map(action_to_json).collect()),
            );
        }
        root.insert("client_actions".into(), Value::Object(obj));
    }
    if ev.finished.is_some() {
        root.insert("finished".into(), json!({}));
    }
    let mut value = Value::Object(root);
    rewrite_server_message_data(&mut value);
    value
}

fn action_to_json(action: &ClientAction) -> Value {
    use client_action::Action;
    let mut obj = Map::new();
    match &action.action {
        Some(Action::CreateTask(ct)) => {
            let mut inner = Map::new();
            if let Some(task) = &ct.task {
                inner.insert("task".into(), task_to_json(task));
            }
            obj.insert("create_task".into(), Value::Object(inner));
        }
        Some(Action::AppendToMessageContent(append)) => {
            let mut inner = Map::new();
            if !append.task_id.is_empty() {
                inner.insert("task_id".into(), json!(append.task_id));
            }
            if let Some(msg) = &append.message {
                inner.insert("message".into(), task_message_to_json(msg));
            }
            obj.insert("append_to_message_content".into(), Value::Object(inner));
        }
        Some(Action::AddMessagesToTask(add)) => {
            let mut inner = Map::new();
            if !add.task_id.is_empty() {
                inner.insert("task_id".into(), json!(add.task_id));
            }
            if !add.messages.is_empty() {
                inner.insert(
                    "messages".into(),
                    Value::Array(add.messages.iter().map(task_message_to_json).collect()),
                );
            }
            obj.insert("add_messages_to_task".into(), Value::Object(inner));
        }
        Some(Action::UpdateTaskMessage(update)) => {
            let mut inner = Map::new();
            if !update.task_id.is_empty() {
                inner.insert("task_id".into(), json!(update.task_id));
            }
            if let Some(msg) = &update.message {
                inner.insert("message".into(), task_message_to_json(msg));
            }
            obj.insert("update_task_message".into(), Value::Object(inner));
        }
        Some(Action::UpdateTaskSummary(update)) => {
            let mut inner = Map::new();
            if !update.task_id.is_empty() {
                inner.insert("task_id".into(), json!(update.task_id));
            }
            if !update.summary.is_empty() {
                inner.insert("summary".into(), json!(update.summary));
            }
            obj.insert("update_task_summary".into(), Value::Object(inner));
        }
        None => {}
    }
    Value::Object(obj)
}

fn task_to_json(task: &Task) -> Value {
    let mut obj = Map::new();
    if !task.id.is_empty() {
        obj.insert("id".into(), json!(task.id));
    }
    if !task.description.is_empty() {
        obj.insert("description".into(), json!(task.description));
    }
    if let Some(status) = &task.status {
        let mut inner = Map::new();
        if status.in_progress.is_some() {
            inner.insert("in_progress".into(), json!({}));
        }
        obj.insert("status".into(), Value::Object(inner));
    }
    if !task.messages.is_empty() {
        obj.insert(
            "messages".into(),
            Value::Array(task.messages.iter().map(task_message_to_json).collect()),
        );
    }
    Value::Object(obj)
}

fn task_message_to_json(msg: &TaskMessage) -> Value {
    use task_message::Kind;
    let mut obj = Map::new();
    if !msg.id.is_empty() {
        obj.insert("id".into(), json!(msg.id));
    }
    if !msg.task_id.is_empty() {
        obj.insert("task_id".into(), json!(msg.task_id));
    }
    match &msg.kind {
        Some(Kind::UserQuery(uq)) => {
            let mut inner = Map::new();
            if !uq.query.is_empty() {
                inner.insert("query".into(), json!(uq.query));
            }
            if !uq.referenced_attachments.is_empty() {
                inner.insert(
                    "referenced_attachments".into(),
                    Value::Object(
                        uq.referenced_attachments
                            .iter()
                            .map(|(k, a)| (k.clone(), json!({ "plain_text": a.plain_text })))
                            .collect(),
                    ),
                );
            }
            obj.insert("user_query".into(), Value::Object(inner));
        }
        Some(Kind::AgentOutput(out)) => {
            let mut inner = Map::new();
            if !out.text.is_empty() {
                inner.insert("text".into(), json!(out.text));
            }
            if !out.reasoning.is_empty() {
                inner.insert("reasoning".into(), json!(out.reasoning));
            }
            obj.insert("agent_output".into(), Value::Object(inner));
        }
        Some(Kind::ToolCall(tc)) => {
            obj.insert("tool_call".into(), tool_call_to_json(tc));
        }
        Some(Kind::ToolCallResult(result)) => {
            obj.insert("tool_call_result".into(), tool_call_result_to_json(result));
        }
        None => {}
    }
    Value::Object(obj)
}

fn tool_call_to_json(tc: &ToolCall) -> Value {
    let mut obj = Map::new();
    if !tc.tool_call_id.is_empty() {
        obj.insert("tool_call_id".into(), json!(tc.tool_call_id));
    }
    match &tc.tool {
        Some(tool_call::Tool::CallMcpTool(call)) => {
            let mut inner = Map::new();
            if !call.name.is_empty() {
                inner.insert("name".into(), json!(call.name));
            }
            if let Some(args) = &call.args {
                inner.insert("args".into(), struct_to_json(args));
            }
            obj.insert("call_mcp_tool".into(), Value::Object(inner));
        }
        Some(tool_call::Tool::Server(server)) => {
            let mut inner = Map::new();
            if !server.payload.is_empty() {
                inner.insert("payload".into(), json!(STANDARD.encode(&server.payload)));
            }
            if let Some(smd) = &server.server_message_data {
                inner.insert("server_message_data".into(), json!(smd));
            }
            obj.insert("server".into(), Value::Object(inner));
        }
        None => {}
    }
    Value::Object(obj)
}

fn tool_call_result_to_json(result: &ToolCallResult) -> Value {
    let mut obj = Map::new();
    if !result.tool_call_id.is_empty() {
        obj.insert("tool_call_id".into(), json!(result.tool_call_id));
    }
    if let Some(tool_call_result::Result::CallMcpTool(mcp)) = &result.result {
        let mut inner = Map::new();
        if let Some(mcp_tool_result::Outcome::Success(success)) = &mcp.outcome {
            let results: Vec<Value> = success
                .results
                .iter()
                .map(|item| match &item.content {
                    Some(tool_result_item::Content::Text(t)) => {
                        json!({ "text": { "text": t.text } })
                    }
                    None => json!({}),
                })
                .collect();
            inner.insert("success".into(), json!({ "results": results }));
        }
        obj.insert("call_mcp_tool".into(), Value::Object(inner));
    }
    Value::Object(obj)
}

/// Walks a JSON tree and replaces every string under a
/// `server_message_data` / `serverMessageData` key with its decoded
/// structured form. Undecodable strings are left untouched.
pub fn rewrite_server_message_data(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if matches!(key.as_str(), "server_message_data" | "serverMessageData") {
                    if let Some(s) = v.as_str() {
                        if let Ok(decoded) = server_message_data::decode(s) {
                            *v = decoded.to_json();
                            continue;
                        }
                    }
                }
                rewrite_server_message_data(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_server_message_data(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn sample_packet() -> Value {
        json!({
            "task_context": {
                "tasks": [{
                    "id": "task-1",
                    "description": "",
                    "status": {"in_progress": {}},
                    "messages": [{
                        "id": "msg-1",
                        "task_id": "task-1",
                        "tool_call": {
                            "tool_call_id": "call-1",
                            "server": {"payload": "IgIQAQ=="}
                        }
                    }]
                }],
                "active_task_id": "task-1"
            },
            "input": {
                "context": {},
                "user_inputs": {"inputs": [{"user_query": {"query": "hi"}}]}
            },
            "settings": {
                "model_config": {"base": "gpt-5", "planning": "o3", "coding": "auto"},
                "rules_enabled": false,
                "supported_tools": [9]
            },
            "metadata": {
                "logging": {"is_autodetected_user_query": true, "entrypoint": "USER_INITIATED"}
            }
        })
    }

    #[test]
    fn request_from_json_maps_fields() {
        let req = request_from_json(&sample_packet()).unwrap();
        let ctx = req.task_context.unwrap();
        assert_eq!(ctx.active_task_id, "task-1");
        assert_eq!(ctx.tasks.len(), 1);
        let task = &ctx.tasks[0];
        assert!(task.status.as_ref().unwrap().in_progress.is_some());
        let Some(task_message::Kind::ToolCall(tc)) = &task.messages[0].kind else {
            panic!("expected tool_call message");
        };
        assert_eq!(tc.tool_call_id, "call-1");
        let Some(tool_call::Tool::Server(server)) = &tc.tool else {
            panic!("expected server tool call");
        };
        assert_eq!(server.payload, STANDARD.decode("IgIQAQ==").unwrap());

        let inputs = req.input.unwrap().user_inputs.unwrap().inputs;
        assert_eq!(inputs.len(), 1);
        let Some(user_input::Input::UserQuery(uq)) = &inputs[0].input else {
            panic!("expected user_query input");
        };
        assert_eq!(uq.query, "hi");

        let settings = req.settings.unwrap();
        assert_eq!(settings.model_config.unwrap().base, "gpt-5");
        assert_eq!(settings.supported_tools, vec![9]);

        let logging = req.metadata.unwrap().logging.unwrap();
        assert!(logging.is_autodetected_user_query);
        assert_eq!(logging.entrypoint, Entrypoint::UserInitiated as i32);
    }

    #[test]
    fn request_bytes_round_trip() {
        let bytes = request_to_bytes(&sample_packet()).unwrap();
        let decoded = Request::decode(bytes.as_slice()).unwrap();
        assert_eq!(
            decoded.task_context.as_ref().unwrap().active_task_id,
            "task-1"
        );
        assert_eq!(decoded.settings.as_ref().unwrap().supported_tools, vec![9]);
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let mut packet = sample_packet();
        packet["bogus_field"] = json!("x");
        packet["settings"]["another_unknown"] = json!(17);
        let req = request_from_json(&packet).unwrap();
        assert!(req.settings.is_some());
    }

    #[test]
    fn non_object_root_fails() {
        assert!(matches!(
            request_from_json(&json!("nope")),
            Err(ProtoError::NotAnObject(_))
        ));
    }

    #[test]
    fn supported_tools_accept_names_and_numbers() {
        let packet = json!({"settings": {"supported_tools": ["CALL_MCP_TOOL", 3]}});
        let req = request_from_json(&packet).unwrap();
        assert_eq!(req.settings.unwrap().supported_tools, vec![9, 3]);
    }

    #[test]
    fn referenced_attachments_map_entries() {
        let packet = json!({
            "input": {"user_inputs": {"inputs": [{
                "user_query": {
                    "query": "hi",
                    "referenced_attachments": {
                        "SYSTEM_PROMPT": {"plain_text": "be terse"}
                    }
                }
            }]}}
        });
        let req = request_from_json(&packet).unwrap();
        let inputs = req.input.unwrap().user_inputs.unwrap().inputs;
        let Some(user_input::Input::UserQuery(uq)) = &inputs[0].input else {
            panic!("expected user_query");
        };
        assert_eq!(
            uq.referenced_attachments.get("SYSTEM_PROMPT").unwrap().plain_text,
            "be terse"
        );
    }

    #[test]
    fn tool_args_become_struct() {
        let packet = json!({
            "task_context": {"tasks": [{"id": "t", "messages": [{
                "id": "m",
                "task_id": "t",
                "tool_call": {
                    "tool_call_id": "c",
                    "call_mcp_tool": {"name": "ls", "args": {"p": "/", "depth": 2}}
                }
            }]}], "active_task_id": "t"}
        });
        let req = request_from_json(&packet).unwrap();
        let task = &req.task_context.unwrap().tasks[0];
        let Some(task_message::Kind::ToolCall(tc)) = &task.messages[0].kind else {
            panic!("expected tool_call");
        };
        let Some(tool_call::Tool::CallMcpTool(call)) = &tc.tool else {
            panic!("expected call_mcp_tool");
        };
        let args = call.args.as_ref().unwrap();
        assert!(matches!(
            args.fields.get("p").and_then(|v| v.kind.as_ref()),
            Some(prost_types::value::Kind::StringValue(s)) if s == "/"
        ));
        assert_eq!(struct_to_json(args)["depth"], json!(2.0));
    }

    #[test]
    fn response_event_json_shape() {
        let ev = ResponseEvent {
            init: Some(Init {
                conversation_id: "C1".into(),
                task_id: "T1".into(),
            }),
            client_actions: Some(ClientActions {
                actions: vec![ClientAction {
                    action: Some(client_action::Action::AppendToMessageContent(
                        AppendToMessageContent {
                            task_id: String::new(),
                            message: Some(TaskMessage {
                                id: String::new(),
                                task_id: String::new(),
                                kind: Some(task_message::Kind::AgentOutput(AgentOutput {
                                    text: "hel".into(),
                                    reasoning: String::new(),
                                })),
                            }),
                        },
                    )),
                }],
            }),
            finished: None,
        };
        let v = response_event_to_json(&ev);
        assert_eq!(v["init"]["conversation_id"], "C1");
        assert_eq!(
            v["client_actions"]["actions"][0]["append_to_message_content"]["message"]
                ["agent_output"]["text"],
            "hel"
        );
    }

    #[test]
    fn finished_event_has_presence_marker() {
        let ev = ResponseEvent {
            init: None,
            client_actions: None,
            finished: Some(Finished {}),
        };
        let v = response_event_to_json(&ev);
        assert!(v.get("finished").is_some());
        assert!(v.get("init").is_none());
    }

    #[test]
    fn smd_strings_are_rewritten() {
        let encoded = server_message_data::encode(
            Some("3b41b7c2-98d0-4a51-aa9b-0c1f6ab0c001"),
            None,
            None,
        );
        let mut v = json!({
            "client_actions": {"actions": [{"add_messages_to_task": {"messages": [{
                "tool_call": {"server": {"server_message_data": encoded}}
            }]}}]}
        });
        rewrite_server_message_data(&mut v);
        let smd = &v["client_actions"]["actions"][0]["add_messages_to_task"]["messages"][0]
            ["tool_call"]["server"]["server_message_data"];
        assert_eq!(smd["type"], "UUID_ONLY");
        assert_eq!(smd["uuid"], "3b41b7c2-98d0-4a51-aa9b-0c1f6ab0c001");
    }

    #[test]
    fn undecodable_smd_left_untouched() {
        let mut v = json!({"server_message_data": "!not-base64!"});
        rewrite_server_message_data(&mut v);
        assert_eq!(v["server_message_data"], "!not-base64!");
    }
}
