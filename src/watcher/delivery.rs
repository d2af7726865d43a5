use crate::gateway::Gateway;
use crate::store::{NotificationStore, PendingNotification};
use crate::template::NotificationFormatter;

/// Outcome of one pass over every agent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Agents with a session key whose notifications were fetched.
    pub agents_checked: usize,
    pub delivered: usize,
    /// Notifications left undelivered (send failed or ack failed).
    pub failed: usize,
    /// Agents whose notification fetch failed.
    pub agent_errors: usize,
}

/// Pushes undelivered notifications into live agent sessions.
///
/// Delivery is at-least-once: a notification is only marked delivered after
/// the gateway accepted it, and anything that fails stays pending for the
/// next cycle.
pub struct DeliveryLoop<'a, S, G> {
    store: &'a S,
    gateway: &'a G,
    formatter: &'a NotificationFormatter,
    send_timeout_secs: u64,
}

impl<'a, S: NotificationStore, G: Gateway> DeliveryLoop<'a, S, G> {
    pub const fn new(
        store: &'a S,
        gateway: &'a G,
        formatter: &'a NotificationFormatter,
        send_timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            gateway,
            formatter,
            send_timeout_secs,
        }
    }

    /// One delivery cycle. Only a failure to list agents fails the cycle.
    pub fn run_cycle(&self) -> Result<CycleReport, crate::error::StoreError> {
        let agents = self.store.list_agents()?;
        let mut report = CycleReport::default();

        for agent in agents.iter().filter(|a| !a.session_key.is_empty()) {
            report.agents_checked += 1;
            self.deliver_to_agent(&agent.session_key, &mut report);
        }

        Ok(report)
    }

    fn deliver_to_agent(&self, session_key: &str, report: &mut CycleReport) {
        let pending = match self.store.undelivered(session_key) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(session_key, error = %e, "failed to fetch notifications");
                report.agent_errors += 1;
                return;
            }
        };
        if pending.is_empty() {
            return;
        }

        tracing::info!(session_key, count = pending.len(), "pending notifications");

        for notification in &pending {
            if self.deliver_one(session_key, notification) {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
    }

    fn deliver_one(&self, session_key: &str, notification: &PendingNotification) -> bool {
        let id = notification.id.as_str();
        let message = match self.formatter.render(notification) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(session_key, id, error = %e, "failed to render notification");
                return false;
            }
        };

        if let Err(e) = self
            .gateway
            .sessions_send(session_key, &message, self.send_timeout_secs)
        {
            // Usually the agent is asleep; it stays pending.
            tracing::info!(session_key, id, kind = %e.kind, reason = %e.message, "session unavailable");
            return false;
        }

        match self.store.mark_delivered(std::slice::from_ref(&notification.id)) {
            Ok(()) => {
                tracing::info!(session_key, id, preview = %preview(&notification.content), "delivered");
                true
            }
            Err(e) => {
                tracing::warn!(session_key, id, error = %e, "delivered but failed to mark; will resend");
                false
            }
        }
    }
}

fn preview(content: &str) -> String {
    const LIMIT: usize = 50;
    match content.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}
