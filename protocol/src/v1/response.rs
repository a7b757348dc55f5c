//! Response-side messages: one event per upstream SSE chunk.

use super::{Task, TaskMessage};

/// One upstream server-sent event. Carries at most one of `init`,
/// `client_actions`, `finished`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseEvent {
    #[prost(message, optional, tag = "1")]
    pub init: Option<Init>,
    #[prost(message, optional, tag = "2")]
    pub client_actions: Option<ClientActions>,
    #[prost(message, optional, tag = "3")]
    pub finished: Option<Finished>,
}

/// Stream opener: ids the rest of the conversation is keyed on.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Init {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(string, tag = "2")]
    pub task_id: String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Finished {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientActions {
    #[prost(message, repeated, tag = "1")]
    pub actions: Vec<ClientAction>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientAction {
    #[prost(oneof = "client_action::Action", tags = "1, 2, 3, 4, 5")]
    pub action: Option<client_action::Action>,
}

pub mod client_action {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Action {
        #[prost(message, tag = "1")]
        CreateTask(super::CreateTask),
        #[prost(message, tag = "2")]
        AppendToMessageContent(super::AppendToMessageContent),
        #[prost(message, tag = "3")]
        AddMessagesToTask(super::AddMessagesToTask),
        #[prost(message, tag = "4")]
        UpdateTaskMessage(super::UpdateTaskMessage),
        #[prost(message, tag = "5")]
        UpdateTaskSummary(super::UpdateTaskSummary),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateTask {
    #[prost(message, optional, tag = "1")]
    pub task: Option<Task>,
}

/// Streaming delta appended to an existing message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendToMessageContent {
    #[prost(string, tag = "1")]
    pub task_id: String,
    #[prost(message, optional, tag = "2")]
    pub message: Option<TaskMessage>,
}

/// Whole messages added to a task (tool calls arrive this way).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddMessagesToTask {
    #[prost(string, tag = "1")]
    pub task_id: String,
    #[prost(message, repeated, tag = "2")]
    pub messages: Vec<TaskMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateTaskMessage {
    #[prost(string, tag = "1")]
    pub task_id: String,
    #[prost(message, optional, tag = "2")]
    pub message: Option<TaskMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateTaskSummary {
    #[prost(string, tag = "1")]
    pub task_id: String,
    #[prost(string, tag = "2")]
    pub summary: String,
}
