//! Parsed response-event inspection: type labels and stream aggregation.

use serde_json::{json, Value};

/// camelCase/snake_case tolerant key lookup.
fn get<'a>(d: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| d.get(n))
}

/// Human-readable label for one parsed event, used in logs and the
/// `parsed_events` listing.
pub fn event_type_label(event: &Value) -> String {
    if event.get("init").is_some() {
        return "INITIALIZATION".to_string();
    }
    if let Some(client_actions) = get(event, &["client_actions", "clientActions"]) {
        let actions = get(client_actions, &["actions", "Actions"])
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if actions.is_empty() {
            return "CLIENT_ACTIONS_EMPTY".to_string();
        }
        let labels: Vec<&str> = actions
            .iter()
            .map(|action| {
                if get(action, &["create_task", "createTask"]).is_some() {
                    "CREATE_TASK"
                } else if get(action, &["append_to_message_content", "appendToMessageContent"])
                    .is_some()
                {
                    "APPEND_CONTENT"
                } else if get(action, &["add_messages_to_task", "addMessagesToTask"]).is_some() {
                    "ADD_MESSAGE"
                } else if get(action, &["update_task_message", "updateTaskMessage"]).is_some() {
                    "UPDATE_MESSAGE"
                } else if get(action, &["update_task_summary", "updateTaskSummary"]).is_some() {
                    "UPDATE_SUMMARY"
                } else {
                    "UNKNOWN_ACTION"
                }
            })
            .collect();
        return format!("CLIENT_ACTIONS({})", labels.join(", "));
    }
    if event.get("finished").is_some() {
        return "FINISHED".to_string();
    }
    "UNKNOWN_EVENT".to_string()
}

/// Buffered-path summary of one upstream stream.
#[derive(Debug, Default)]
pub struct StreamSummary {
    pub response: String,
    pub conversation_id: Option<String>,
    pub task_id: Option<String>,
    pub parsed_events: Vec<Value>,
}

/// Collects text fragments, conversation/task ids, and the numbered parsed
/// event listing as events arrive.
#[derive(Debug, Default)]
pub struct Aggregator {
    summary: StreamSummary,
    event_count: usize,
}

impl Aggregator {
    pub fn observe(&mut self, event: &Value) {
        self.event_count += 1;
        self.summary.parsed_events.push(json!({
            "event_number": self.event_count,
            "event_type": event_type_label(event),
            "parsed_data": event,
        }));

        if let Some(init) = event.get("init") {
            if let Some(id) = init.get("conversation_id").and_then(Value::as_str) {
                self.summary.conversation_id = Some(id.to_string());
            }
            if let Some(id) = init.get("task_id").and_then(Value::as_str) {
                self.summary.task_id = Some(id.to_string());
            }
        }

        let Some(actions) = get(event, &["client_actions", "clientActions"])
            .and_then(|ca| get(ca, &["actions", "Actions"]))
            .and_then(Value::as_array)
        else {
            return;
        };
        for action in actions {
            if let Some(append) =
                get(action, &["append_to_message_content", "appendToMessageContent"])
            {
                if let Some(text) = append
                    .get("message")
                    .and_then(|m| get(m, &["agent_output", "agentOutput"]))
                    .and_then(|o| o.get("text"))
                    .and_then(Value::as_str)
                {
                    self.summary.response.push_str(text);
                }
            }
            if let Some(add) = get(action, &["add_messages_to_task", "addMessagesToTask"]) {
                if let Some(id) = get(add, &["task_id", "taskId"]).and_then(Value::as_str) {
                    self.summary.task_id = Some(id.to_string());
                }
                for message in add
                    .get("messages")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                {
                    if let Some(text) = get(message, &["agent_output", "agentOutput"])
                        .and_then(|o| o.get("text"))
                        .and_then(Value::as_str)
                    {
                        self.summary.response.push_str(text);
                    }
                }
            }
        }
    }

    pub fn finish(self) -> StreamSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_init_and_finished() {
        assert_eq!(event_type_label(&json!({"init": {}})), "INITIALIZATION");
        assert_eq!(event_type_label(&json!({"finished": {}})), "FINISHED");
        assert_eq!(event_type_label(&json!({})), "UNKNOWN_EVENT");
    }

    #[test]
    fn labels_actions() {
        let ev = json!({"client_actions": {"actions": [
            {"append_to_message_content": {}},
            {"add_messages_to_task": {}},
            {"create_task": {}},
        ]}});
        assert_eq!(
            event_type_label(&ev),
            "CLIENT_ACTIONS(APPEND_CONTENT, ADD_MESSAGE, CREATE_TASK)"
        );
        assert_eq!(
            event_type_label(&json!({"client_actions": {}})),
            "CLIENT_ACTIONS_EMPTY"
        );
    }

    #[test]
    fn aggregates_text_and_ids() {
        let mut agg = Aggregator::default();
        agg.observe(&json!({"init": {"conversation_id": "C1", "task_id": "T1"}}));
        agg.observe(&json!({"client_actions": {"actions": [
            {"append_to_message_content": {"message": {"agent_output": {"text": "hel"}}}}
        ]}}));
        agg.observe(&json!({"client_actions": {"actions": [
            {"add_messages_to_task": {"task_id": "T2", "messages": [
                {"agent_output": {"text": "lo"}}
            ]}}
        ]}}));
        agg.observe(&json!({"finished": {}}));
        let s = agg.finish();
        assert_eq!(s.response, "hello");
        assert_eq!(s.conversation_id.as_deref(), Some("C1"));
        assert_eq!(s.task_id.as_deref(), Some("T2"));
        assert_eq!(s.parsed_events.len(), 4);
        assert_eq!(s.parsed_events[0]["event_number"], 1);
        assert_eq!(s.parsed_events[3]["event_type"], "FINISHED");
    }
}
