use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{
    Activity, Agent, AgentRegistration, BusinessContext, Deliverable, NotificationStore,
    NotificationType, PendingNotification, SquadMember, TaskStatus, TaskSummary,
};
use crate::error::{StoreError, reason_phrase};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Convex HTTP function API.
///
/// Queries go to `POST {url}/api/query`, mutations to `POST {url}/api/mutation`,
/// both with `{path, args, format: "json"}` bodies.
pub struct ConvexClient {
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct FunctionCall<'a> {
    path: &'a str,
    args: Value,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum FunctionReply {
    Success {
        #[serde(default)]
        value: Value,
    },
    Error {
        #[serde(rename = "errorMessage", default)]
        error_message: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum FunctionKind {
    Query,
    Mutation,
}

impl FunctionKind {
    const fn endpoint(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        }
    }
}

impl ConvexClient {
    pub fn new(base_url: &str) -> Self {
        // Convex reports function errors as JSON bodies on 4xx/5xx, so
        // statuses are inspected here instead of surfacing as ureq errors.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn query<T: DeserializeOwned>(&self, path: &str, args: Value) -> Result<T, StoreError> {
        self.call(FunctionKind::Query, path, args)
    }

    pub fn mutation<T: DeserializeOwned>(&self, path: &str, args: Value) -> Result<T, StoreError> {
        self.call(FunctionKind::Mutation, path, args)
    }

    fn call<T: DeserializeOwned>(
        &self,
        kind: FunctionKind,
        path: &str,
        args: Value,
    ) -> Result<T, StoreError> {
        let url = format!("{}/api/{}", self.base_url, kind.endpoint());
        tracing::trace!(%url, path, "convex call");

        let mut response = self
            .agent
            .post(&url)
            .send_json(FunctionCall {
                path,
                args,
                format: "json",
            })
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let reply = response.body_mut().read_json::<FunctionReply>();
        let reply = match reply {
            Ok(reply) => reply,
            Err(_) if !(200..300).contains(&status) => {
                return Err(StoreError::Http {
                    status,
                    reason: reason_phrase(status).to_string(),
                });
            }
            Err(e) => {
                return Err(StoreError::Decode {
                    path: path.to_string(),
                    message: e.to_string(),
                });
            }
        };

        decode_reply(path, reply)
    }

    // --- CLI-facing functions -------------------------------------------

    pub fn squad(&self) -> Result<Vec<SquadMember>, StoreError> {
        self.query("agents:squad", json!({}))
    }

    pub fn record_heartbeat(&self, session_key: &str) -> Result<(), StoreError> {
        self.mutation::<Value>("agents:heartbeat", json!({ "sessionKey": session_key }))
            .map(drop)
    }

    pub fn send_notification(
        &self,
        target_session_key: &str,
        source_session_key: Option<&str>,
        kind: NotificationType,
        task_id: Option<&str>,
        content: &str,
    ) -> Result<String, StoreError> {
        let mut args = json!({
            "targetSessionKey": target_session_key,
            "type": kind.as_str(),
            "content": content,
        });
        insert_opt(&mut args, "sourceSessionKey", source_session_key);
        insert_opt(&mut args, "taskId", task_id);
        self.mutation("notifications:send", args)
    }

    pub fn tasks_for_agent(&self, session_key: &str) -> Result<Vec<TaskSummary>, StoreError> {
        self.query("tasks:getForAgent", json!({ "sessionKey": session_key }))
    }

    pub fn update_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        by: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut args = json!({ "taskId": task_id, "status": status.as_str() });
        insert_opt(&mut args, "bySessionKey", by);
        self.mutation::<Value>("tasks:updateStatus", args).map(drop)
    }

    pub fn assign_task(
        &self,
        task_id: &str,
        assignee_session_key: &str,
        by: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut args = json!({
            "taskId": task_id,
            "assigneeSessionKeys": [assignee_session_key],
        });
        insert_opt(&mut args, "bySessionKey", by);
        self.mutation::<Value>("tasks:assign", args).map(drop)
    }

    pub fn add_comment(&self, task_id: &str, content: &str, by: Option<&str>) -> Result<(), StoreError> {
        let mut args = json!({ "taskId": task_id, "content": content });
        insert_opt(&mut args, "bySessionKey", by);
        self.mutation::<Value>("tasks:addComment", args).map(drop)
    }

    pub fn add_subtask(
        &self,
        task_id: &str,
        title: &str,
        description: Option<&str>,
        assignee: Option<&str>,
    ) -> Result<u64, StoreError> {
        let mut args = json!({ "taskId": task_id, "title": title });
        insert_opt(&mut args, "description", description);
        insert_opt(&mut args, "assigneeSessionKey", assignee);
        self.mutation("tasks:addSubtask", args)
    }

    pub fn update_subtask(
        &self,
        task_id: &str,
        index: u32,
        done: bool,
        by: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut args = json!({ "taskId": task_id, "subtaskIndex": index, "done": done });
        insert_opt(&mut args, "bySessionKey", by);
        self.mutation::<Value>("tasks:updateSubtask", args).map(drop)
    }

    pub fn feed(&self, limit: u32) -> Result<Vec<Activity>, StoreError> {
        self.query("activities:feed", json!({ "limit": limit }))
    }

    pub fn register_deliverable(
        &self,
        task_id: &str,
        path: &str,
        title: &str,
        by: &str,
    ) -> Result<(), StoreError> {
        self.mutation::<Value>(
            "documents:registerDeliverable",
            json!({
                "taskId": task_id,
                "path": path,
                "title": title,
                "createdBySessionKey": by,
            }),
        )
        .map(drop)
    }

    pub fn deliverables(&self, task_id: &str) -> Result<Vec<Deliverable>, StoreError> {
        self.query("documents:getForTask", json!({ "taskId": task_id }))
    }

    pub fn business_context(&self) -> Result<Option<BusinessContext>, StoreError> {
        self.query("businessContext:get", json!({}))
    }
}

impl NotificationStore for ConvexClient {
    fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        self.query("agents:list", json!({}))
    }

    fn upsert_agent(&self, registration: &AgentRegistration) -> Result<String, StoreError> {
        let args = serde_json::to_value(registration).map_err(|e| StoreError::Decode {
            path: "agents:upsert".into(),
            message: e.to_string(),
        })?;
        self.mutation("agents:upsert", args)
    }

    fn undelivered(&self, session_key: &str) -> Result<Vec<PendingNotification>, StoreError> {
        self.query(
            "notifications:getUndelivered",
            json!({ "sessionKey": session_key }),
        )
    }

    fn mark_delivered(&self, ids: &[String]) -> Result<(), StoreError> {
        self.mutation::<Value>(
            "notifications:markDelivered",
            json!({ "notificationIds": ids }),
        )
        .map(drop)
    }
}

fn decode_reply<T: DeserializeOwned>(path: &str, reply: FunctionReply) -> Result<T, StoreError> {
    match reply {
        FunctionReply::Success { value } => {
            serde_json::from_value(value).map_err(|e| StoreError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })
        }
        FunctionReply::Error { error_message } => Err(StoreError::Function {
            path: path.to_string(),
            message: error_message,
        }),
    }
}

fn insert_opt(args: &mut Value, key: &str, value: Option<&str>) {
    if let (Some(v), Some(map)) = (value, args.as_object_mut()) {
        map.insert(key.to_string(), Value::String(v.to_string()));
    }
}
