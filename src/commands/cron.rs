use std::path::PathBuf;

use clap::{Args, Subcommand};

use super::{OutputFormat, print_json};
use crate::config::{self, SquadConfig};
use crate::error::ExitError;
use crate::gateway::{CronJob, Gateway, GatewayClient};
use crate::watcher::ensure_heartbeats;

fn gateway() -> anyhow::Result<GatewayClient> {
    let (url, token) = config::gateway_endpoint()?;
    Ok(GatewayClient::new(&url, &token))
}

#[derive(Debug, Subcommand)]
pub enum CronCommand {
    /// List scheduled jobs on the gateway
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Add any missing heartbeat jobs for the configured squad
    Sync {
        /// Path to clawe.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl CronCommand {
    pub fn execute(&self) -> anyhow::Result<()> {
        let gateway = gateway()?;
        match self {
            Self::List { format } => {
                let jobs = gateway.cron_list()?;
                match format {
                    OutputFormat::Json => print_json(&jobs)?,
                    OutputFormat::Text => print!("{}", render_jobs(&jobs)),
                }
            }
            Self::Sync { config: path } => {
                let cwd = std::env::current_dir()?;
                let found = config::find_config(path.as_deref(), &cwd)?;
                let squad = SquadConfig::load_or_default(found.as_deref())?;

                let report = ensure_heartbeats(&gateway, &squad.agents, &squad.heartbeat);
                if report.skipped {
                    return Err(ExitError::new(4, "could not list cron jobs".into()).into());
                }
                for name in &report.existing {
                    println!("✓ {name} exists");
                }
                for name in &report.added {
                    println!("✅ {name} added");
                }
                for name in &report.failed {
                    println!("❌ {name} failed");
                }
                if !report.failed.is_empty() {
                    return Err(ExitError::new(
                        4,
                        format!("{} heartbeat job(s) could not be added", report.failed.len()),
                    )
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn render_jobs(jobs: &[CronJob]) -> String {
    if jobs.is_empty() {
        return "No cron jobs.\n".to_string();
    }
    let mut out = format!("⏰ {} cron job(s):\n\n", jobs.len());
    for job in jobs {
        let expr = job
            .schedule
            .as_ref()
            .and_then(|s| s.expr.as_deref())
            .unwrap_or("-");
        let state = if job.enabled.unwrap_or(true) { "" } else { " (disabled)" };
        out.push_str(&format!("{}{state}\n   Schedule: {expr}\n", job.name));
        if let Some(agent) = &job.agent_id {
            out.push_str(&format!("   Agent: {agent}\n"));
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Also list sessions active within this many minutes
    #[arg(long)]
    pub sessions: Option<u32>,
}

impl HealthArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let gateway = gateway()?;
        gateway.check_health()?;
        println!("✅ Gateway healthy");

        if let Some(minutes) = self.sessions {
            let sessions = gateway.list_sessions(Some(minutes))?;
            println!("{} session(s) active in the last {minutes} min", sessions.len());
            for session in &sessions {
                println!("   {}", session.key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CronSchedule;

    #[test]
    fn jobs_render_schedule_and_state() {
        let jobs = vec![
            CronJob {
                id: Some("j1".into()),
                name: "inky-heartbeat".into(),
                agent_id: Some("inky".into()),
                enabled: Some(true),
                schedule: Some(CronSchedule::cron("3,18,33,48 * * * *")),
                session_target: None,
            },
            CronJob {
                id: None,
                name: "cleanup".into(),
                agent_id: None,
                enabled: Some(false),
                schedule: None,
                session_target: None,
            },
        ];
        let out = render_jobs(&jobs);
        assert!(out.contains("inky-heartbeat\n   Schedule: 3,18,33,48 * * * *\n   Agent: inky\n"));
        assert!(out.contains("cleanup (disabled)\n   Schedule: -\n"));
    }
}
