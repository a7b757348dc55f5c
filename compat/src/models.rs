//! Model catalog: agent, planning, and coding model lists plus the
//! deduplicated union served at `/v1/models`.

use chrono::Utc;
use serde_json::{json, Value};

pub struct ModelEntry {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: Option<&'static str>,
    pub vision_supported: bool,
    pub category: &'static str,
}

const fn entry(
    id: &'static str,
    display_name: &'static str,
    description: Option<&'static str>,
    vision_supported: bool,
    category: &'static str,
) -> ModelEntry {
    ModelEntry {
        id,
        display_name,
        description,
        vision_supported,
        category,
    }
}

pub const AGENT_MODELS: &[ModelEntry] = &[
    entry("auto", "auto", Some("claude 4 sonnet"), true, "agent"),
    entry("warp-basic", "lite", Some("basic model"), true, "agent"),
    entry("gpt-5", "gpt-5", None, true, "agent"),
    entry("claude-4-sonnet", "claude 4 sonnet", None, true, "agent"),
    entry("claude-4-opus", "claude 4 opus", None, true, "agent"),
    entry("claude-4.1-opus", "claude 4.1 opus", None, true, "agent"),
    entry("gpt-4o", "gpt-4o", None, true, "agent"),
    entry("gpt-4.1", "gpt-4.1", None, true, "agent"),
    entry("o4-mini", "o4-mini", None, true, "agent"),
    entry("o3", "o3", None, true, "agent"),
    entry("gemini-2.5-pro", "gemini 2.5 pro", None, true, "agent"),
];

pub const PLANNING_MODELS: &[ModelEntry] = &[
    entry("warp-basic", "lite", Some("basic model"), true, "planning"),
    entry(
        "gpt-5 (high reasoning)",
        "gpt-5",
        Some("high reasoning"),
        false,
        "planning",
    ),
    entry("claude-4-opus", "claude 4 opus", None, true, "planning"),
    entry("claude-4.1-opus", "claude 4.1 opus", None, true, "planning"),
    entry("gpt-4.1", "gpt-4.1", None, true, "planning"),
    entry("o4-mini", "o4-mini", None, true, "planning"),
    entry("o3", "o3", None, true, "planning"),
];

pub const CODING_MODELS: &[ModelEntry] = &[
    entry("auto", "auto", Some("claude 4 sonnet"), true, "coding"),
    entry("warp-basic", "lite", Some("basic model"), true, "coding"),
    entry("gpt-5", "gpt-5", None, true, "coding"),
    entry("claude-4-sonnet", "claude 4 sonnet", None, true, "coding"),
    entry("claude-4-opus", "claude 4 opus", None, true, "coding"),
    entry("claude-4.1-opus", "claude 4.1 opus", None, true, "coding"),
    entry("gpt-4o", "gpt-4o", None, true, "coding"),
    entry("gpt-4.1", "gpt-4.1", None, true, "coding"),
    entry("o4-mini", "o4-mini", None, true, "coding"),
    entry("o3", "o3", None, true, "coding"),
    entry("gemini-2.5-pro", "gemini 2.5 pro", None, true, "coding"),
];

/// Deduplicated union of all categories as OpenAI model objects; a model in
/// several categories carries them all.
pub fn all_unique_models() -> Vec<Value> {
    let created = Utc::now().timestamp();
    let mut order: Vec<String> = Vec::new();
    let mut models: std::collections::HashMap<String, Value> = std::collections::HashMap::new();

    for m in AGENT_MODELS.iter().chain(PLANNING_MODELS).chain(CODING_MODELS) {
        match models.get_mut(m.id) {
            Some(existing) => {
                if let Some(categories) = existing
                    .get_mut("categories")
                    .and_then(Value::as_array_mut)
                {
                    let cat = json!(m.category);
                    if !categories.contains(&cat) {
                        categories.push(cat);
                    }
                }
            }
            None => {
                order.push(m.id.to_string());
                models.insert(
                    m.id.to_string(),
                    json!({
                        "id": m.id,
                        "object": "model",
                        "created": created,
                        "owned_by": "warp",
                        "display_name": m.display_name,
                        "description": m.description.unwrap_or(m.display_name),
                        "vision_supported": m.vision_supported,
                        "categories": [m.category],
                    }),
                );
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| models.remove(&id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_deduplicated() {
        let models = all_unique_models();
        let mut ids: Vec<&str> = models.iter().filter_map(|m| m["id"].as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(before, ids.len());
    }

    #[test]
    fn shared_model_carries_all_categories() {
        let models = all_unique_models();
        let opus = models
            .iter()
            .find(|m| m["id"] == "claude-4.1-opus")
            .unwrap();
        let categories = opus["categories"].as_array().unwrap();
        assert!(categories.contains(&json!("agent")));
        assert!(categories.contains(&json!("planning")));
        assert!(categories.contains(&json!("coding")));
    }

    #[test]
    fn entries_are_model_objects() {
        for m in all_unique_models() {
            assert_eq!(m["object"], "model");
            assert_eq!(m["owned_by"], "warp");
            assert!(m["description"].as_str().is_some_and(|d| !d.is_empty()));
        }
    }

    #[test]
    fn planning_only_model_is_present() {
        let models = all_unique_models();
        let high = models
            .iter()
            .find(|m| m["id"] == "gpt-5 (high reasoning)")
            .unwrap();
        assert_eq!(high["categories"], json!(["planning"]));
    }
}
