use clap::{Args, Subcommand};

use super::{OutputFormat, local_time, print_json, store};
use crate::store::{AgentRegistration, NotificationStore, NotificationType, PendingNotification, SquadMember};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Session key of the checking agent (e.g. agent:inky:main)
    pub session_key: String,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl CheckArgs {
    /// Record a heartbeat, then claim and print every pending notification.
    pub fn execute(&self) -> anyhow::Result<()> {
        let store = store()?;
        store.record_heartbeat(&self.session_key)?;

        let pending = store.undelivered(&self.session_key)?;
        if !pending.is_empty() {
            let ids: Vec<String> = pending.iter().map(|n| n.id.clone()).collect();
            store.mark_delivered(&ids)?;
        }
        tracing::debug!(session_key = %self.session_key, count = pending.len(), "checked notifications");

        match self.format {
            OutputFormat::Json => print_json(&pending),
            OutputFormat::Text => {
                print!("{}", render_check(&pending));
                Ok(())
            }
        }
    }
}

fn render_check(pending: &[PendingNotification]) -> String {
    if pending.is_empty() {
        return "HEARTBEAT_OK\n".to_string();
    }
    let mut out = format!("📬 {} notification(s):\n\n", pending.len());
    for n in pending {
        let from = n.source_agent.as_ref().map_or("System", |a| a.name.as_str());
        out.push_str(&format!("[{}] from {from}: {}\n", n.kind.as_str(), n.content));
        if let Some(task) = &n.task {
            out.push_str(&format!("   Task: \"{}\" ({})\n", task.title, task.status));
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Args)]
pub struct NotifyArgs {
    /// Session key of the recipient
    pub target: String,
    pub message: String,
    /// Session key of the sender
    #[arg(long)]
    pub from: Option<String>,
    #[arg(long = "type", value_enum, default_value_t = NotificationType::Custom)]
    pub kind: NotificationType,
    /// Related task id
    #[arg(long)]
    pub task: Option<String>,
}

impl NotifyArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let id = store()?.send_notification(
            &self.target,
            self.from.as_deref(),
            self.kind,
            self.task.as_deref(),
            &self.message,
        )?;
        tracing::debug!(%id, target = %self.target, "notification queued");
        println!("✅ Notification sent");
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct SquadArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl SquadArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let squad = store()?.squad()?;
        match self.format {
            OutputFormat::Json => print_json(&squad),
            OutputFormat::Text => {
                print!("{}", render_squad(&squad));
                Ok(())
            }
        }
    }
}

fn render_squad(squad: &[SquadMember]) -> String {
    let mut out = String::from("🤖 Squad Status:\n\n");
    for member in squad {
        let status = member.status.as_deref().unwrap_or("unknown");
        let icon = match status {
            "active" => "🟢",
            "idle" => "⚪",
            _ => "🔴",
        };
        out.push_str(&format!(
            "{} {} ({})\n   Status: {icon} {status}\n   Session: {}\n",
            member.emoji.as_deref().unwrap_or("🤖"),
            member.name,
            member.role,
            member.session_key
        ));
        if let Some(task) = &member.current_task {
            out.push_str(&format!("   Working on: {}\n", task.title));
        }
        if let Some(seen) = member.last_heartbeat {
            out.push_str(&format!("   Last seen: {}\n", local_time(seen, true)));
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Subcommand)]
pub enum AgentCommand {
    /// Register (or update) an agent in the store
    Register(RegisterArgs),
}

impl AgentCommand {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Self::Register(args) => args.execute(),
        }
    }
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    pub name: String,
    pub role: String,
    pub session_key: String,
    #[arg(long)]
    pub emoji: Option<String>,
}

impl RegisterArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let id = store()?.upsert_agent(&AgentRegistration {
            name: self.name.clone(),
            role: self.role.clone(),
            session_key: self.session_key.clone(),
            emoji: self.emoji.clone(),
        })?;
        println!("✅ Agent registered: {} ({id})", self.name);
        Ok(())
    }
}
