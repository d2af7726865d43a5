use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ExitError;

/// Squad config file name.
pub const CONFIG_TOML: &str = "clawe.toml";

pub const DEFAULT_OPENCLAW_URL: &str = "http://localhost:18789";
pub const DEFAULT_CHAT_URL: &str = "http://localhost:3000";

/// Environment variables the watcher refuses to start without.
pub const REQUIRED_WATCHER_ENV: [&str; 3] = ["CONVEX_URL", "OPENCLAW_URL", "OPENCLAW_TOKEN"];

/// Endpoints and secrets, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub convex_url: String,
    pub openclaw_url: String,
    pub openclaw_token: String,
}

impl Endpoints {
    /// Read every endpoint the watcher needs. All of them are required.
    pub fn for_watcher() -> Result<Self, ExitError> {
        Self::for_watcher_from(|key| std::env::var(key).ok())
    }

    pub fn for_watcher_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ExitError> {
        let missing: Vec<String> = REQUIRED_WATCHER_ENV
            .iter()
            .copied()
            .filter(|key| lookup(key).is_none_or(|v| v.trim().is_empty()))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ExitError::MissingEnv(missing));
        }

        Ok(Self {
            convex_url: non_empty(&lookup, "CONVEX_URL").unwrap_or_default(),
            openclaw_url: non_empty(&lookup, "OPENCLAW_URL").unwrap_or_default(),
            openclaw_token: non_empty(&lookup, "OPENCLAW_TOKEN").unwrap_or_default(),
        })
    }
}

/// `CONVEX_URL` only, for store-backed CLI commands.
pub fn convex_url() -> Result<String, ExitError> {
    std::env::var("CONVEX_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ExitError::MissingEnv(vec!["CONVEX_URL".into()]))
}

/// Gateway URL (defaulted) and token (required), for gateway-backed CLI commands.
pub fn gateway_endpoint() -> Result<(String, String), ExitError> {
    let lookup = |key: &str| std::env::var(key).ok();
    let url = non_empty(&lookup, "OPENCLAW_URL").unwrap_or_else(|| DEFAULT_OPENCLAW_URL.into());
    let token = non_empty(&lookup, "OPENCLAW_TOKEN")
        .ok_or_else(|| ExitError::MissingEnv(vec!["OPENCLAW_TOKEN".into()]))?;
    Ok((url, token))
}

/// Base URL serving the chat send/abort/history endpoints.
pub fn chat_url() -> String {
    non_empty(&|key: &str| std::env::var(key).ok(), "CLAWE_CHAT_URL")
        .unwrap_or_else(|| DEFAULT_CHAT_URL.into())
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Find the squad config file.
///
/// Priority order (highest first):
/// 1. explicit path (`--config` or `CLAWE_CONFIG`), which must exist
/// 2. `./clawe.toml`
/// 3. `~/.config/clawe/clawe.toml`
///
/// Returns `Ok(None)` when no file exists and none was requested; the
/// built-in squad is used then.
pub fn find_config(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<Option<PathBuf>> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("CLAWE_CONFIG").map(PathBuf::from));
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ExitError::Config(format!("{} does not exist", path.display())).into());
        }
        return Ok(Some(path));
    }

    let local = cwd.join(CONFIG_TOML);
    if local.exists() {
        return Ok(Some(local));
    }

    if let Some(global) = global_config_path()
        && global.exists()
    {
        return Ok(Some(global));
    }

    Ok(None)
}

/// `~/.config/clawe/clawe.toml` (platform equivalent).
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clawe").join(CONFIG_TOML))
}

/// Top-level clawe.toml config.
///
/// Fields are snake_case with camelCase aliases, matching the JSON shapes the
/// dashboard uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SquadConfig {
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            heartbeat: HeartbeatConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

/// One squad member, as registered in the store and scheduled in the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AgentSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emoji: Option<String>,
    pub role: String,
    /// Cron expression for this agent's heartbeat.
    pub cron: String,
}

impl AgentSpec {
    fn new(id: &str, name: &str, emoji: &str, role: &str, cron: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            emoji: Some(emoji.into()),
            role: role.into(),
            cron: cron.into(),
        }
    }

    /// Gateway session key (`agent:{id}:main`).
    pub fn session_key(&self) -> String {
        format!("agent:{}:main", self.id)
    }

    /// Deterministic heartbeat job name (`{id}-heartbeat`).
    pub fn heartbeat_job_name(&self) -> String {
        format!("{}-heartbeat", self.id)
    }

    pub fn emoji_or_default(&self) -> &str {
        self.emoji.as_deref().unwrap_or("🤖")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_message")]
    pub message: String,
    #[serde(default = "default_heartbeat_model")]
    pub model: String,
    #[serde(default = "default_heartbeat_timeout", alias = "timeoutSeconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_session_target", alias = "sessionTarget")]
    pub session_target: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            message: default_heartbeat_message(),
            model: default_heartbeat_model(),
            timeout_seconds: default_heartbeat_timeout(),
            session_target: default_session_target(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeliveryConfig {
    #[serde(default = "default_poll_interval", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_send_timeout", alias = "sendTimeoutSecs")]
    pub send_timeout_secs: u64,
    /// minijinja template overriding the notification message format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            send_timeout_secs: default_send_timeout(),
            template: None,
        }
    }
}

impl DeliveryConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub const HEARTBEAT_MESSAGE: &str = "Read HEARTBEAT.md and follow it strictly. Check for notifications with 'clawe check'. If nothing needs attention, reply HEARTBEAT_OK.";

fn default_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new("main", "Clawe", "🦞", "Squad Lead", "0 * * * *"),
        AgentSpec::new("inky", "Inky", "✍️", "Writer", "3,18,33,48 * * * *"),
        AgentSpec::new("pixel", "Pixel", "🎨", "Designer", "7,22,37,52 * * * *"),
        AgentSpec::new("scout", "Scout", "🔍", "SEO", "11,26,41,56 * * * *"),
    ]
}

// Default value functions for serde
fn default_heartbeat_message() -> String { HEARTBEAT_MESSAGE.into() }
fn default_heartbeat_model() -> String { "anthropic/claude-sonnet-4-20250514".into() }
fn default_heartbeat_timeout() -> u64 { 600 }
fn default_session_target() -> String { "isolated".into() }
fn default_poll_interval() -> u64 { 2000 }
fn default_send_timeout() -> u64 { 10 }

impl SquadConfig {
    /// Load the config at `path`, or the built-in squad when `path` is None.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse_toml(&contents)
    }

    /// Parse and validate config from a TOML string.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ExitError::Config(format!("invalid {CONFIG_TOML}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ExitError> {
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(ExitError::Config(format!("agent {:?} has an empty id", agent.name)));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(ExitError::Config(format!("duplicate agent id {:?}", agent.id)));
            }
            if agent.cron.split_whitespace().count() != 5 {
                return Err(ExitError::Config(format!(
                    "agent {:?}: cron {:?} must have five fields",
                    agent.id, agent.cron
                )));
            }
        }
        if self.delivery.poll_interval_ms == 0 {
            return Err(ExitError::Config("delivery.poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Serialize config to a TOML string with helpful comments.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        let raw = toml::to_string_pretty(self).context("serializing config to TOML")?;

        let mut doc: toml_edit::DocumentMut = raw
            .parse()
            .context("parsing generated TOML for comment injection")?;

        doc.decor_mut()
            .set_prefix("# Clawe squad configuration\n# Endpoints and tokens come from CONVEX_URL, OPENCLAW_URL, OPENCLAW_TOKEN\n\n");

        if let Some(tables) = doc
            .get_mut("agents")
            .and_then(|item| item.as_array_of_tables_mut())
            && let Some(first) = tables.get_mut(0)
        {
            first
                .decor_mut()
                .set_prefix("\n# Squad members: one heartbeat cron job per agent\n");
        }

        fn set_table_comment(doc: &mut toml_edit::DocumentMut, key: &str, comment: &str) {
            if let Some(tbl) = doc.get_mut(key).and_then(|item| item.as_table_mut()) {
                tbl.decor_mut().set_prefix(comment);
            }
        }

        set_table_comment(&mut doc, "heartbeat", "\n# Payload of every heartbeat job\n");
        set_table_comment(&mut doc, "delivery", "\n# Notification watcher\n");

        Ok(doc.to_string())
    }

    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.id == id)
    }
}
