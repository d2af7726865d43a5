//! OpenClaw gateway client: every call is a `POST /tools/invoke`.

mod types;

pub use types::*;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::GatewayError;
use types::{CronListResult, SessionsListResult, ToolReply};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra HTTP time allowed on top of a `sessions_send` timeout, so the
/// gateway gets to report its own timeout before the socket gives up.
const SEND_GRACE: Duration = Duration::from_secs(2);

/// The gateway operations the watcher depends on.
pub trait Gateway {
    /// Push `message` into the live session `session_key`.
    fn sessions_send(
        &self,
        session_key: &str,
        message: &str,
        timeout_secs: u64,
    ) -> Result<SendReceipt, GatewayError>;

    fn cron_list(&self) -> Result<Vec<CronJob>, GatewayError>;

    fn cron_add(&self, job: &CronAddJob) -> Result<CronAddResult, GatewayError>;
}

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    tool: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<Value>,
}

/// Blocking HTTP client for the gateway's tool endpoint.
pub struct GatewayClient {
    base_url: String,
    token: String,
    agent: ureq::Agent,
}

impl GatewayClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            agent,
        }
    }

    /// Invoke a gateway tool and return its raw `result`.
    pub fn invoke_tool(
        &self,
        tool: &str,
        action: Option<&str>,
        args: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, GatewayError> {
        let url = format!("{}/tools/invoke", self.base_url);
        let request = InvokeRequest { tool, action, args };

        let mut builder = self
            .agent
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token));
        if let Some(timeout) = timeout {
            builder = builder.config().timeout_global(Some(timeout)).build();
        }

        let mut response = builder.send_json(&request).map_err(|e| {
            tracing::debug!(tool, ?action, error = %e, "gateway request failed");
            map_transport_error(&e)
        })?;

        let reply: ToolReply = response
            .body_mut()
            .read_json()
            .map_err(|e| GatewayError::new("invalid_response", e.to_string()))?;

        into_result(reply)
    }

    /// Connectivity check: `gateway config.get` must answer `ok`.
    pub fn check_health(&self) -> Result<Value, GatewayError> {
        self.invoke_tool("gateway", Some("config.get"), None, None)
            .map(Option::unwrap_or_default)
            .map_err(|e| match e.kind.as_str() {
                "http_error" | "network_error" | "timeout" => {
                    GatewayError::new("unreachable", "Gateway unreachable")
                }
                _ => GatewayError::new("unhealthy", "Gateway unhealthy"),
            })
    }

    pub fn list_sessions(&self, active_minutes: Option<u32>) -> Result<Vec<Session>, GatewayError> {
        let args = active_minutes.map(|m| json!({ "activeMinutes": m }));
        let result = self.invoke_tool("sessions_list", Some("json"), args, None)?;
        decode_or_default::<SessionsListResult>(result).map(|r| r.sessions)
    }
}

impl Gateway for GatewayClient {
    fn sessions_send(
        &self,
        session_key: &str,
        message: &str,
        timeout_secs: u64,
    ) -> Result<SendReceipt, GatewayError> {
        let args = json!({
            "sessionKey": session_key,
            "message": message,
            "timeoutSeconds": timeout_secs,
        });
        let timeout = Duration::from_secs(timeout_secs) + SEND_GRACE;
        let result = self.invoke_tool("sessions_send", None, Some(args), Some(timeout))?;
        decode_or_default(result)
    }

    fn cron_list(&self) -> Result<Vec<CronJob>, GatewayError> {
        let result = self.invoke_tool("cron", Some("list"), None, None)?;
        decode_or_default::<CronListResult>(result).map(|r| r.jobs)
    }

    fn cron_add(&self, job: &CronAddJob) -> Result<CronAddResult, GatewayError> {
        let args = json!({ "job": job });
        let result = self.invoke_tool("cron", Some("add"), Some(args), None)?;
        decode_or_default(result)
    }
}

fn into_result(reply: ToolReply) -> Result<Option<Value>, GatewayError> {
    if reply.ok {
        return Ok(reply.result);
    }
    let (kind, message) = reply
        .error
        .map(|e| (e.kind, e.message))
        .unwrap_or_default();
    Err(GatewayError::new(
        kind.unwrap_or_else(|| "tool_error".into()),
        message.unwrap_or_else(|| "unknown error".into()),
    ))
}

fn decode_or_default<T: DeserializeOwned + Default>(value: Option<Value>) -> Result<T, GatewayError> {
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| GatewayError::new("invalid_response", e.to_string())),
    }
}

fn map_transport_error(err: &ureq::Error) -> GatewayError {
    match err {
        ureq::Error::StatusCode(status) => GatewayError::http(*status),
        ureq::Error::Timeout(_) => GatewayError::new("timeout", "Gateway request timed out"),
        _ => GatewayError::network(),
    }
}
