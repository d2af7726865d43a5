use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope returned by `/tools/invoke`.
#[derive(Debug, Deserialize)]
pub(crate) struct ToolReply {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ToolErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolErrorBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Acknowledgement of a `sessions_send`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SendReceipt {
    #[serde(default)]
    pub response: Option<Value>,
}

/// A scheduled job as listed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub schedule: Option<CronSchedule>,
    #[serde(default)]
    pub session_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
}

impl CronSchedule {
    pub fn cron(expr: &str) -> Self {
        Self {
            kind: "cron".into(),
            expr: Some(expr.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CronListResult {
    #[serde(default)]
    pub jobs: Vec<CronJob>,
}

/// Job definition for `cron add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronAddJob {
    pub name: String,
    pub agent_id: String,
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub session_target: String,
    pub payload: CronPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronPayload {
    pub kind: String,
    pub message: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CronAddResult {
    #[serde(default)]
    pub id: Option<String>,
}

/// Live session as reported by `sessions_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub updated_at: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionsListResult {
    #[serde(default)]
    pub sessions: Vec<Session>,
}
