//! Process-wide conversation baseline.

use uuid::Uuid;

/// Conversation baseline carried across requests. `conversation_id` and
/// `baseline_task_id` come from the first successful upstream reply; the two
/// tool ids are lazily minted once and stay stable for the process lifetime.
///
/// Owned by the compat `AppState` behind a mutex; handlers take the lock for
/// read-modify-write only.
#[derive(Clone, Debug, Default)]
pub struct BridgeState {
    pub conversation_id: Option<String>,
    pub baseline_task_id: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_message_id: Option<String>,
}

impl BridgeState {
    /// Mints the preamble tool ids on first use; first writer wins under the
    /// caller's lock. Returns `(tool_call_id, tool_message_id)`.
    pub fn ensure_tool_ids(&mut self) -> (String, String) {
        if self.tool_call_id.is_none() {
            self.tool_call_id = Some(Uuid::new_v4().to_string());
        }
        if self.tool_message_id.is_none() {
            self.tool_message_id = Some(Uuid::new_v4().to_string());
        }
        (
            self.tool_call_id.clone().unwrap_or_default(),
            self.tool_message_id.clone().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_ids_minted_once() {
        let mut state = BridgeState::default();
        let (call_a, msg_a) = state.ensure_tool_ids();
        let (call_b, msg_b) = state.ensure_tool_ids();
        assert_eq!(call_a, call_b);
        assert_eq!(msg_a, msg_b);
        assert_ne!(call_a, msg_a);
    }
}
