use serde::{Deserialize, Serialize};

/// Agent document as returned by `agents:list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub session_key: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_heartbeat: Option<f64>,
}

/// Arguments of `agents:upsert` (idempotent by session key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegistration {
    pub name: String,
    pub role: String,
    pub session_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskMentioned,
    TaskCompleted,
    MessageReceived,
    ReviewRequested,
    Blocked,
    Custom,
}

impl NotificationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::TaskMentioned => "task_mentioned",
            Self::TaskCompleted => "task_completed",
            Self::MessageReceived => "message_received",
            Self::ReviewRequested => "review_requested",
            Self::Blocked => "blocked",
            Self::Custom => "custom",
        }
    }
}

/// Undelivered notification, enriched with its source agent and task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotification {
    #[serde(rename = "_id")]
    pub id: String,
    pub target_agent_id: String,
    #[serde(default)]
    pub source_agent_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub task_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub created_at: f64,
    #[serde(default)]
    pub delivered_at: Option<f64>,
    #[serde(default)]
    pub source_agent: Option<SourceAgent>,
    #[serde(default)]
    pub task: Option<TaskRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAgent {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub status: String,
}

/// Row of `agents:squad`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub session_key: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_heartbeat: Option<f64>,
    #[serde(default)]
    pub current_task: Option<TaskTitle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTitle {
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum TaskStatus {
    Inbox,
    Assigned,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }
}

/// Row of `tasks:getForAgent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// Row of `activities:feed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub created_at: f64,
    #[serde(default)]
    pub agent: Option<SourceAgent>,
}

/// Row of `documents:getForTask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub title: String,
    pub path: String,
    pub created_at: f64,
    #[serde(default)]
    pub creator: Option<SourceAgent>,
}

/// Result of `businessContext:get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessContext {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub approved: bool,
}
