use std::collections::HashSet;

use crate::config::{AgentSpec, HeartbeatConfig};
use crate::gateway::{CronAddJob, CronPayload, CronSchedule, Gateway};

/// What the heartbeat bootstrap did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub existing: Vec<String>,
    pub added: Vec<String>,
    pub failed: Vec<String>,
    /// The job list could not be fetched; nothing was attempted.
    pub skipped: bool,
}

/// Build the heartbeat job for one agent.
pub fn heartbeat_job(agent: &AgentSpec, heartbeat: &HeartbeatConfig) -> CronAddJob {
    CronAddJob {
        name: agent.heartbeat_job_name(),
        agent_id: agent.id.clone(),
        enabled: true,
        schedule: CronSchedule::cron(&agent.cron),
        session_target: heartbeat.session_target.clone(),
        payload: CronPayload {
            kind: "agentTurn".into(),
            message: heartbeat.message.clone(),
            model: heartbeat.model.clone(),
            timeout_seconds: heartbeat.timeout_seconds,
        },
    }
}

/// Make sure every agent has its `{id}-heartbeat` job.
///
/// Existing jobs are matched by name only and never modified. Running this
/// twice against the same gateway adds nothing the second time.
pub fn ensure_heartbeats<G: Gateway>(
    gateway: &G,
    agents: &[AgentSpec],
    heartbeat: &HeartbeatConfig,
) -> BootstrapReport {
    let mut report = BootstrapReport::default();

    let existing: HashSet<String> = match gateway.cron_list() {
        Ok(jobs) => jobs.into_iter().map(|j| j.name).collect(),
        Err(e) => {
            tracing::error!(error = %e, "failed to list cron jobs; skipping heartbeat setup");
            report.skipped = true;
            return report;
        }
    };

    for agent in agents {
        let name = agent.heartbeat_job_name();
        if existing.contains(&name) {
            tracing::info!(agent = %agent.name, job = %name, "heartbeat exists");
            report.existing.push(name);
            continue;
        }

        match gateway.cron_add(&heartbeat_job(agent, heartbeat)) {
            Ok(_) => {
                tracing::info!(agent = %agent.name, job = %name, cron = %agent.cron, "heartbeat added");
                report.added.push(name);
            }
            Err(e) => {
                tracing::error!(job = %name, error = %e, "failed to add heartbeat");
                report.failed.push(name);
            }
        }
    }

    report
}
