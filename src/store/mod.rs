//! Notification store: the Convex deployment holding agents, tasks,
//! notifications and activities.

mod convex;
mod types;

pub use convex::ConvexClient;
pub use types::*;

use crate::error::StoreError;

/// The slice of the store the watcher depends on.
pub trait NotificationStore {
    /// Every registered agent.
    fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;

    /// Create or update an agent, keyed by session key. Returns the agent id.
    fn upsert_agent(&self, registration: &AgentRegistration) -> Result<String, StoreError>;

    /// Undelivered notifications targeting the agent with `session_key`,
    /// enriched with source agent and task.
    fn undelivered(&self, session_key: &str) -> Result<Vec<PendingNotification>, StoreError>;

    /// Mark notifications delivered. Marking an already-delivered
    /// notification again is harmless.
    fn mark_delivered(&self, ids: &[String]) -> Result<(), StoreError>;
}
