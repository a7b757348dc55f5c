//! Tool input_schema sanitation.
//!
//! The upstream rejects malformed tool schemas, so every
//! `mcp_context.tools[*].input_schema` is normalized to a conservative JSON
//! Schema Draft-07 shape before encoding: empty values dropped, every
//! property given a non-empty `type` and `description`, `headers` forced to
//! a usable object schema, and `required` restricted to real properties.

use serde_json::{json, Map, Value};

const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Recursively drops null, empty string, empty list, empty object; trims
/// string whitespace.
fn deep_clean(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (k, v) in map {
                let vv = deep_clean(v);
                if !is_empty_value(&vv) {
                    cleaned.insert(k.clone(), vv);
                }
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(deep_clean)
                .filter(|v| !is_empty_value(v))
                .collect(),
        ),
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

/// Property types inferred from the name when a schema omits them.
fn infer_type_for_property(name: &str) -> &'static str {
    match name.to_lowercase().as_str() {
        "url" | "uri" | "href" | "link" => "string",
        "headers" | "options" | "params" | "payload" | "data" => "object",
        _ => "string",
    }
}

fn non_empty_string(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
}

fn ensure_property_schema(name: &str, schema: &Value) -> Value {
    let cleaned = deep_clean(schema);
    let mut prop = cleaned.as_object().cloned().unwrap_or_default();

    if !non_empty_string(prop.get("type")) {
        prop.insert("type".into(), json!(infer_type_for_property(name)));
    }
    if !non_empty_string(prop.get("description")) {
        prop.insert("description".into(), json!(format!("{name} parameter")));
    }

    if name.to_lowercase() == "headers" {
        prop.insert("type".into(), json!("object"));
        let headers_props = prop
            .get("properties")
            .map(deep_clean)
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        let headers_props = if headers_props.is_empty() {
            let mut m = Map::new();
            m.insert(
                "user-agent".into(),
                json!({
                    "type": "string",
                    "description": "User-Agent header for the request",
                }),
            );
            m
        } else {
            let mut fixed = Map::new();
            for (hk, hv) in &headers_props {
                let mut sub = deep_clean(hv).as_object().cloned().unwrap_or_default();
                if !non_empty_string(sub.get("type")) {
                    sub.insert("type".into(), json!("string"));
                }
                if !non_empty_string(sub.get("description")) {
                    sub.insert("description".into(), json!(format!("{hk} header")));
                }
                fixed.insert(hk.clone(), Value::Object(sub));
            }
            fixed
        };
        let keys: Vec<String> = headers_props.keys().cloned().collect();
        prop.insert("properties".into(), Value::Object(headers_props));
        normalize_required(&mut prop, &keys);
        drop_empty_additional_properties(&mut prop);
    }

    Value::Object(prop)
}

fn normalize_required(schema: &mut Map<String, Value>, property_names: &[String]) {
    let Some(required) = schema.get("required").and_then(Value::as_array).cloned() else {
        return;
    };
    let kept: Vec<Value> = required
        .into_iter()
        .filter(|r| {
            r.as_str()
                .map(|s| property_names.iter().any(|p| p == s))
                .unwrap_or(false)
        })
        .collect();
    if kept.is_empty() {
        schema.remove("required");
    } else {
        schema.insert("required".into(), Value::Array(kept));
    }
}

fn drop_empty_additional_properties(schema: &mut Map<String, Value>) {
    let empty = schema
        .get("additionalProperties")
        .and_then(Value::as_object)
        .map(Map::is_empty)
        .unwrap_or(false);
    if empty {
        schema.remove("additionalProperties");
    }
}

/// Sanitizes one tool input_schema.
pub fn sanitize_json_schema(schema: &Value) -> Value {
    let cleaned = deep_clean(schema);
    let mut s = cleaned.as_object().cloned().unwrap_or_default();

    if s.contains_key("properties") && !s.get("type").map(Value::is_string).unwrap_or(false) {
        s.insert("type".into(), json!("object"));
    }
    if !s.get("$schema").map(Value::is_string).unwrap_or(false) {
        s.insert("$schema".into(), json!(DRAFT_07));
    }

    let property_names: Vec<String> = s
        .get("properties")
        .and_then(Value::as_object)
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default();

    if let Some(props) = s.get("properties").and_then(Value::as_object).cloned() {
        let fixed: Map<String, Value> = props
            .iter()
            .map(|(name, sub)| (name.clone(), ensure_property_schema(name, sub)))
            .collect();
        s.insert("properties".into(), Value::Object(fixed));
    }

    normalize_required(&mut s, &property_names);
    drop_empty_additional_properties(&mut s);

    Value::Object(s)
}

/// Sanitizes `mcp_context.tools[*].input_schema` wherever it appears: under
/// a `json_data` wrapper or at the body root. The `inputSchema` camelCase
/// alias is normalized too.
pub fn sanitize_packet(body: &mut Value) {
    if let Some(json_data) = body.get_mut("json_data") {
        sanitize_root(json_data);
    }
    sanitize_root(body);
}

fn sanitize_root(root: &mut Value) {
    let Some(tools) = root
        .get_mut("mcp_context")
        .and_then(|ctx| ctx.get_mut("tools"))
        .and_then(Value::as_array_mut)
    else {
        return;
    };
    for tool in tools {
        let Some(tool_obj) = tool.as_object_mut() else {
            continue;
        };
        let schema = tool_obj
            .get("input_schema")
            .or_else(|| tool_obj.get("inputSchema"))
            .cloned();
        if let Some(schema) = schema.filter(Value::is_object) {
            let sanitized = sanitize_json_schema(&schema);
            tool_obj.remove("inputSchema");
            tool_obj.insert("input_schema".into(), sanitized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_property_gets_type_and_description() {
        let schema = json!({
            "properties": {
                "url": {},
                "options": {"description": "  "},
                "q": {"type": ""},
            }
        });
        let s = sanitize_json_schema(&schema);
        assert_eq!(s["type"], "object");
        assert_eq!(s["$schema"], DRAFT_07);
        assert_eq!(s["properties"]["url"]["type"], "string");
        assert_eq!(s["properties"]["url"]["description"], "url parameter");
        assert_eq!(s["properties"]["options"]["type"], "object");
        assert_eq!(s["properties"]["q"]["type"], "string");
    }

    #[test]
    fn headers_get_user_agent_when_empty() {
        let schema = json!({"properties": {"headers": {"properties": {}}}});
        let s = sanitize_json_schema(&schema);
        let headers = &s["properties"]["headers"];
        assert_eq!(headers["type"], "object");
        assert_eq!(headers["properties"]["user-agent"]["type"], "string");
        assert_eq!(
            headers["properties"]["user-agent"]["description"],
            "User-Agent header for the request"
        );
    }

    #[test]
    fn header_properties_forced_to_string() {
        let schema = json!({
            "properties": {"headers": {"properties": {
                "authorization": {"type": "number"},
                "accept": {},
            }}}
        });
        let s = sanitize_json_schema(&schema);
        let headers = &s["properties"]["headers"]["properties"];
        // Existing type survives; only missing types are filled in.
        assert_eq!(headers["authorization"]["type"], "number");
        assert_eq!(headers["accept"]["type"], "string");
        assert_eq!(headers["accept"]["description"], "accept header");
    }

    #[test]
    fn required_restricted_to_known_properties() {
        let schema = json!({
            "properties": {"a": {"type": "string"}},
            "required": ["a", "missing"],
        });
        let s = sanitize_json_schema(&schema);
        assert_eq!(s["required"], json!(["a"]));

        let schema = json!({
            "properties": {"a": {"type": "string"}},
            "required": ["missing"],
        });
        let s = sanitize_json_schema(&schema);
        assert!(s.get("required").is_none());
    }

    #[test]
    fn empty_values_are_dropped() {
        let schema = json!({
            "properties": {"a": {"type": "string", "enum": [], "default": null, "pattern": ""}},
            "additionalProperties": {},
        });
        let s = sanitize_json_schema(&schema);
        let a = &s["properties"]["a"];
        assert!(a.get("enum").is_none());
        assert!(a.get("default").is_none());
        assert!(a.get("pattern").is_none());
        assert!(s.get("additionalProperties").is_none());
    }

    #[test]
    fn sanitize_packet_reaches_wrapped_tools() {
        let mut body = json!({
            "json_data": {"mcp_context": {"tools": [
                {"name": "fetch", "inputSchema": {"properties": {"url": {}}}}
            ]}},
            "message_type": "warp.multi_agent.v1.Request",
        });
        sanitize_packet(&mut body);
        let tool = &body["json_data"]["mcp_context"]["tools"][0];
        assert!(tool.get("inputSchema").is_none());
        assert_eq!(tool["input_schema"]["properties"]["url"]["type"], "string");
    }

    #[test]
    fn sanitize_packet_handles_bare_root() {
        let mut body = json!({"mcp_context": {"tools": [
            {"name": "t", "input_schema": {"properties": {"q": {}}}}
        ]}});
        sanitize_packet(&mut body);
        assert_eq!(
            body["mcp_context"]["tools"][0]["input_schema"]["properties"]["q"]["description"],
            "q parameter"
        );
    }

    #[test]
    fn packet_without_tools_is_untouched() {
        let mut body = json!({"json_data": {"input": {}}});
        let before = body.clone();
        sanitize_packet(&mut body);
        assert_eq!(body, before);
    }
}
