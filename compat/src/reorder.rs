//! Reorder pass: normalize tool-call/result adjacency in a possibly
//! compacted OpenAI history.
//!
//! Output contract: every assistant message carries at most one tool call;
//! every matched tool result sits immediately after its producing assistant
//! message; and when the final turn input is a tool result, its producing
//! assistant message is moved to the tail directly before it.

use std::collections::HashMap;

use crate::content::{normalize_content_to_list, segments_to_text};
use crate::request::{ChatMessage, ContentPart, MessageContent};

pub fn reorder_messages(history: Vec<ChatMessage>) -> Vec<ChatMessage> {
    if history.is_empty() {
        return Vec::new();
    }

    // 1. Expand multi-segment user messages and multi-call assistants into
    //    one logical message per segment/call.
    let mut expanded: Vec<ChatMessage> = Vec::new();
    for m in history {
        if m.role == "user" {
            let segments = normalize_content_to_list(m.content.as_ref());
            let is_multi_part =
                matches!(&m.content, Some(MessageContent::Parts(_))) && segments.len() > 1;
            if is_multi_part {
                for seg in segments {
                    if seg.is_text() {
                        expanded.push(ChatMessage::user(MessageContent::Text(
                            seg.text.unwrap_or_default(),
                        )));
                    } else {
                        expanded.push(ChatMessage::user(MessageContent::Parts(vec![
                            ContentPart {
                                part_type: seg.seg_type,
                                text: seg.text,
                            },
                        ])));
                    }
                }
            } else {
                expanded.push(m);
            }
        } else if m.role == "assistant"
            && m.tool_calls.as_ref().map(Vec::len).unwrap_or(0) > 1
        {
            let text = segments_to_text(&normalize_content_to_list(m.content.as_ref()));
            if !text.is_empty() {
                expanded.push(ChatMessage::assistant(Some(MessageContent::Text(text)), None));
            }
            for tc in m.tool_calls.into_iter().flatten() {
                expanded.push(ChatMessage::assistant(None, Some(vec![tc])));
            }
        } else {
            expanded.push(m);
        }
    }

    // 2. Anchor: walking from the end, the first user or tool result found
    //    is this turn's input.
    let mut last_input_tool_id: Option<String> = None;
    for m in expanded.iter().rev() {
        if m.role == "tool" {
            if let Some(id) = m.tool_call_id.as_ref().filter(|id| !id.is_empty()) {
                last_input_tool_id = Some(id.clone());
                break;
            }
        }
        if m.role == "user" {
            break;
        }
    }

    // 3. Index tool results by id (first wins) and collect the set of
    //    assistant-produced tool-call ids.
    let mut tool_results_by_id: HashMap<String, ChatMessage> = HashMap::new();
    let mut assistant_tc_ids: Vec<String> = Vec::new();
    for m in &expanded {
        if m.role == "tool" {
            if let Some(id) = m.tool_call_id.as_ref().filter(|id| !id.is_empty()) {
                tool_results_by_id.entry(id.clone()).or_insert_with(|| m.clone());
            }
        }
        if m.role == "assistant" {
            assistant_tc_ids.extend(m.tool_call_ids());
        }
    }

    // 4. Emit in order, pulling each matched tool result up behind its
    //    assistant; the anchor pair is deferred to the tail.
    let mut result: Vec<ChatMessage> = Vec::new();
    let mut trailing_assistant: Option<ChatMessage> = None;
    for m in expanded {
        if m.role == "tool" {
            // Unmatched tool results stay inline at their original position.
            let unmatched = m
                .tool_call_id
                .as_ref()
                .filter(|id| !id.is_empty())
                .map(|id| !assistant_tc_ids.contains(id))
                .unwrap_or(true);
            if unmatched {
                if let Some(id) = &m.tool_call_id {
                    tool_results_by_id.remove(id);
                }
                result.push(m);
            }
            continue;
        }
        if m.role == "assistant" && m.tool_calls.is_some() {
            let ids = m.tool_call_ids();
            if let Some(anchor_id) = &last_input_tool_id {
                if ids.iter().any(|id| id == anchor_id) && trailing_assistant.is_none() {
                    trailing_assistant = Some(m);
                    continue;
                }
            }
            result.push(m);
            for id in ids {
                if let Some(tr) = tool_results_by_id.remove(&id) {
                    result.push(tr);
                }
            }
            continue;
        }
        result.push(m);
    }

    // 5. The anchor tool result and its producer close the history.
    if let (Some(anchor_id), Some(assistant)) = (last_input_tool_id, trailing_assistant) {
        result.push(assistant);
        if let Some(tr) = tool_results_by_id.remove(&anchor_id) {
            result.push(tr);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{FunctionPayload, ToolCallPayload};
    use serde_json::json;

    fn user(text: &str) -> ChatMessage {
        ChatMessage::user(MessageContent::Text(text.to_string()))
    }

    fn tool_call(id: &str, name: &str) -> ToolCallPayload {
        ToolCallPayload {
            id: Some(id.to_string()),
            call_type: Some("function".to_string()),
            function: Some(FunctionPayload {
                name: Some(name.to_string()),
                arguments: Some(json!("{}")),
            }),
        }
    }

    fn assistant_with_calls(calls: Vec<ToolCallPayload>) -> ChatMessage {
        ChatMessage::assistant(None, Some(calls))
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
    fn empty_history_stays_empty() {
        assert!(reorder_messages(Vec::new()).is_empty());
    }

    #[test]
    fn plain_conversation_is_unchanged() {
        let history = vec![
            user("a"),
            ChatMessage::assistant(Some(MessageContent::Text("b".into())), None),
            user("c"),
        ];
        let out = reorder_messages(history.clone());
        assert_eq!(out, history);
    }

    #[test]
    fn multi_call_assistant_is_split() {
        let history = vec![
            user("go"),
            ChatMessage::assistant(
                Some(MessageContent::Text("doing".into())),
                Some(vec![tool_call("a", "ls"), tool_call("b", "cat")]),
            ),
            tool_result("a", "ra"),
            tool_result("b", "rb"),
            user("next"),
        ];
        let out = reorder_messages(history);
        let roles: Vec<&str> = out.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(
            roles,
            vec!["user", "assistant", "assistant", "tool", "assistant", "tool", "user"]
        );
        // Each split assistant carries exactly one call, followed by its result.
        assert_eq!(out[2].tool_call_ids(), vec!["a"]);
        assert_eq!(out[3].tool_call_id.as_deref(), Some("a"));
        assert_eq!(out[4].tool_call_ids(), vec!["b"]);
        assert_eq!(out[5].tool_call_id.as_deref(), Some("b"));
    }

    #[test]
    fn final_tool_result_moves_producer_to_tail() {
        let history = vec![
            user("list"),
            assistant_with_calls(vec![tool_call("x", "ls")]),
            tool_result("x", "a\nb"),
        ];
        let out = reorder_messages(history);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, "user");
        assert_eq!(out[1].tool_call_ids(), vec!["x"]);
        assert_eq!(out[2].tool_call_id.as_deref(), Some("x"));
    }

    #[test]
    fn matched_result_pulled_behind_assistant() {
        // Result separated from its call; a later user turn anchors the input.
        let history = vec![
            user("q1"),
            assistant_with_calls(vec![tool_call("x", "ls")]),
            user("noise"),
            tool_result("x", "out"),
            user("q2"),
        ];
        let out = reorder_messages(history);
        let roles: Vec<&str> = out.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "user", "user"]);
        assert_eq!(out[2].tool_call_id.as_deref(), Some("x"));
    }

    #[test]
    fn unmatched_tool_result_stays_inline() {
        let history = vec![user("a"), tool_result("ghost", "r"), user("b")];
        let out = reorder_messages(history);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].role, "tool");
        assert_eq!(out[1].tool_call_id.as_deref(), Some("ghost"));
    }

    #[test]
    fn tool_result_without_id_stays_inline() {
        let mut orphan = tool_result("", "r");
        orphan.tool_call_id = None;
        let history = vec![user("a"), orphan, user("b")];
        let out = reorder_messages(history);
        assert_eq!(out[1].role, "tool");
    }

    #[test]
    fn multi_segment_user_is_expanded() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "one"},
                {"type": "text", "text": "two"},
            ]
        }))
        .unwrap();
        let out = reorder_messages(vec![msg]);
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0].content,
            Some(MessageContent::Text("one".to_string()))
        );
        assert_eq!(
            out[1].content,
            Some(MessageContent::Text("two".to_string()))
        );
    }

    #[test]
    fn duplicate_tool_call_id_first_wins() {
        let history = vec![
            user("go"),
            assistant_with_calls(vec![tool_call("x", "ls")]),
            assistant_with_calls(vec![tool_call("x", "ls")]),
            tool_result("x", "r1"),
            user("next"),
        ];
        let out = reorder_messages(history);
        // The first assistant gets the result; the duplicate stands alone.
        let roles: Vec<&str> = out.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "assistant", "user"]);
    }
}
