//! In-memory store and gateway used by the watcher tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{GatewayError, StoreError};
use crate::gateway::{CronAddJob, CronAddResult, CronJob, Gateway, SendReceipt};
use crate::store::{
    Agent, AgentRegistration, NotificationStore, NotificationType, PendingNotification,
};

#[derive(Default)]
pub struct MemoryStore {
    agents: RefCell<Vec<Agent>>,
    notifications: RefCell<Vec<PendingNotification>>,
    clock: Cell<f64>,
    failing_fetch: RefCell<HashSet<String>>,
    failing_list: Cell<bool>,
    failing_list_calls: Cell<usize>,
    list_calls: Cell<usize>,
    shutdown_after: RefCell<Option<(usize, Arc<AtomicBool>)>>,
    failing_mark: Cell<bool>,
    failing_upsert: RefCell<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> f64 {
        self.clock.set(self.clock.get() + 1.0);
        self.clock.get()
    }

    pub fn add_agent(&self, session_key: &str) -> String {
        let mut agents = self.agents.borrow_mut();
        let id = format!("agent{}", agents.len() + 1);
        agents.push(Agent {
            id: id.clone(),
            name: session_key.to_string(),
            role: String::new(),
            emoji: None,
            session_key: session_key.to_string(),
            status: None,
            last_heartbeat: None,
        });
        id
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.agents.borrow().clone()
    }

    /// Queue a notification for the agent with `session_key`.
    pub fn push(&self, session_key: &str, content: &str) -> String {
        let target = self
            .agents
            .borrow()
            .iter()
            .find(|a| a.session_key == session_key)
            .map(|a| a.id.clone())
            .unwrap_or_default();
        let created_at = self.tick();
        let mut notifications = self.notifications.borrow_mut();
        let id = format!("n{}", notifications.len() + 1);
        notifications.push(PendingNotification {
            id: id.clone(),
            target_agent_id: target,
            source_agent_id: None,
            kind: NotificationType::Custom,
            task_id: None,
            content: content.to_string(),
            delivered: false,
            created_at,
            delivered_at: None,
            source_agent: None,
            task: None,
        });
        id
    }

    pub fn is_delivered(&self, id: &str) -> bool {
        self.notification(id).is_some_and(|n| n.delivered)
    }

    pub fn notification(&self, id: &str) -> Option<PendingNotification> {
        self.notifications.borrow().iter().find(|n| n.id == id).cloned()
    }

    pub fn fail_fetch_for(&self, session_key: &str) {
        self.failing_fetch.borrow_mut().insert(session_key.to_string());
    }

    pub fn fail_list_agents(&self) {
        self.failing_list.set(true);
    }

    /// Fail only the next `calls` agent listings.
    pub fn fail_next_lists(&self, calls: usize) {
        self.failing_list_calls.set(calls);
    }

    /// Raise `flag` once agents have been listed `calls` times.
    pub fn shutdown_after_lists(&self, calls: usize, flag: Arc<AtomicBool>) {
        *self.shutdown_after.borrow_mut() = Some((calls, flag));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    pub fn fail_mark_delivered(&self, fail: bool) {
        self.failing_mark.set(fail);
    }

    pub fn fail_upsert_for(&self, session_key: &str) {
        self.failing_upsert.borrow_mut().insert(session_key.to_string());
    }
}

impl NotificationStore for MemoryStore {
    fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let calls = self.list_calls.get() + 1;
        self.list_calls.set(calls);
        if let Some((after, flag)) = self.shutdown_after.borrow().as_ref()
            && calls >= *after
        {
            flag.store(true, Ordering::Relaxed);
        }

        let remaining = self.failing_list_calls.get();
        if remaining > 0 {
            self.failing_list_calls.set(remaining - 1);
            return Err(StoreError::Network("connection refused".into()));
        }
        if self.failing_list.get() {
            return Err(StoreError::Network("connection refused".into()));
        }
        Ok(self.agents())
    }

    fn upsert_agent(&self, registration: &AgentRegistration) -> Result<String, StoreError> {
        if self.failing_upsert.borrow().contains(&registration.session_key) {
            return Err(StoreError::Http {
                status: 500,
                reason: "Internal Server Error".into(),
            });
        }
        let mut agents = self.agents.borrow_mut();
        if let Some(agent) = agents
            .iter_mut()
            .find(|a| a.session_key == registration.session_key)
        {
            agent.name.clone_from(&registration.name);
            agent.role.clone_from(&registration.role);
            agent.emoji.clone_from(&registration.emoji);
            return Ok(agent.id.clone());
        }
        let id = format!("agent{}", agents.len() + 1);
        agents.push(Agent {
            id: id.clone(),
            name: registration.name.clone(),
            role: registration.role.clone(),
            emoji: registration.emoji.clone(),
            session_key: registration.session_key.clone(),
            status: Some("idle".into()),
            last_heartbeat: None,
        });
        Ok(id)
    }

    fn undelivered(&self, session_key: &str) -> Result<Vec<PendingNotification>, StoreError> {
        if self.failing_fetch.borrow().contains(session_key) {
            return Err(StoreError::Function {
                path: "notifications:getUndelivered".into(),
                message: "boom".into(),
            });
        }
        let Some(target) = self
            .agents
            .borrow()
            .iter()
            .find(|a| a.session_key == session_key)
            .map(|a| a.id.clone())
        else {
            return Ok(Vec::new());
        };
        Ok(self
            .notifications
            .borrow()
            .iter()
            .filter(|n| n.target_agent_id == target && !n.delivered)
            .cloned()
            .collect())
    }

    fn mark_delivered(&self, ids: &[String]) -> Result<(), StoreError> {
        if self.failing_mark.get() {
            return Err(StoreError::Network("timed out".into()));
        }
        let now = self.tick();
        for n in self.notifications.borrow_mut().iter_mut() {
            if ids.contains(&n.id) && !n.delivered {
                n.delivered = true;
                n.delivered_at = Some(now);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    sent: RefCell<Vec<(String, String, u64)>>,
    unavailable: RefCell<HashSet<String>>,
    failing_messages: RefCell<Vec<String>>,
    jobs: RefCell<Vec<CronJob>>,
    added: RefCell<Vec<CronAddJob>>,
    failing_list: Cell<bool>,
    failing_adds: RefCell<HashSet<String>>,
}

impl FakeGateway {
    pub fn sent(&self) -> Vec<(String, String, u64)> {
        self.sent.borrow().clone()
    }

    pub fn set_unavailable(&self, session_key: &str, unavailable: bool) {
        let mut set = self.unavailable.borrow_mut();
        if unavailable {
            set.insert(session_key.to_string());
        } else {
            set.remove(session_key);
        }
    }

    pub fn fail_message_containing(&self, needle: &str) {
        self.failing_messages.borrow_mut().push(needle.to_string());
    }

    pub fn with_job(self, name: &str) -> Self {
        self.jobs.borrow_mut().push(CronJob {
            id: Some(format!("job-{name}")),
            name: name.to_string(),
            agent_id: None,
            enabled: Some(true),
            schedule: None,
            session_target: None,
        });
        self
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.borrow().iter().map(|j| j.name.clone()).collect()
    }

    pub fn added(&self) -> Vec<CronAddJob> {
        self.added.borrow().clone()
    }

    pub fn fail_cron_list(&self) {
        self.failing_list.set(true);
    }

    pub fn fail_cron_add(&self, name: &str) {
        self.failing_adds.borrow_mut().insert(name.to_string());
    }
}

impl Gateway for FakeGateway {
    fn sessions_send(
        &self,
        session_key: &str,
        message: &str,
        timeout_secs: u64,
    ) -> Result<SendReceipt, GatewayError> {
        if self.unavailable.borrow().contains(session_key) {
            return Err(GatewayError::new("not_found", format!("No session {session_key}")));
        }
        if self
            .failing_messages
            .borrow()
            .iter()
            .any(|needle| message.contains(needle.as_str()))
        {
            return Err(GatewayError::network());
        }
        self.sent
            .borrow_mut()
            .push((session_key.to_string(), message.to_string(), timeout_secs));
        Ok(SendReceipt::default())
    }

    fn cron_list(&self) -> Result<Vec<CronJob>, GatewayError> {
        if self.failing_list.get() {
            return Err(GatewayError::http(503));
        }
        Ok(self.jobs.borrow().clone())
    }

    fn cron_add(&self, job: &CronAddJob) -> Result<CronAddResult, GatewayError> {
        if self.failing_adds.borrow().contains(&job.name) {
            return Err(GatewayError::new("invalid_request", "bad schedule"));
        }
        self.added.borrow_mut().push(job.clone());
        let id = format!("job-{}", job.name);
        self.jobs.borrow_mut().push(CronJob {
            id: Some(id.clone()),
            name: job.name.clone(),
            agent_id: Some(job.agent_id.clone()),
            enabled: Some(job.enabled),
            schedule: Some(job.schedule.clone()),
            session_target: Some(job.session_target.clone()),
        });
        Ok(CronAddResult { id: Some(id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_delivered_is_idempotent() {
        let store = MemoryStore::new();
        store.add_agent("agent:inky:main");
        let id = store.push("agent:inky:main", "hello");

        store.mark_delivered(std::slice::from_ref(&id)).unwrap();
        let first = store.notification(&id).unwrap();
        store.mark_delivered(std::slice::from_ref(&id)).unwrap();
        let second = store.notification(&id).unwrap();

        assert!(second.delivered);
        assert_eq!(first.delivered_at, second.delivered_at);
        assert!(store.undelivered("agent:inky:main").unwrap().is_empty());
    }
}
