use crate::config::AgentSpec;
use crate::store::{AgentRegistration, NotificationStore};

pub fn registration(agent: &AgentSpec) -> AgentRegistration {
    AgentRegistration {
        name: agent.name.clone(),
        role: agent.role.clone(),
        session_key: agent.session_key(),
        emoji: agent.emoji.clone(),
    }
}

/// Upsert every configured agent. Returns how many registrations succeeded.
pub fn register_agents<S: NotificationStore>(store: &S, agents: &[AgentSpec]) -> usize {
    let mut registered = 0;
    for agent in agents {
        let reg = registration(agent);
        match store.upsert_agent(&reg) {
            Ok(id) => {
                tracing::info!(
                    agent = %agent.name,
                    emoji = agent.emoji_or_default(),
                    session_key = %reg.session_key,
                    %id,
                    "agent registered"
                );
                registered += 1;
            }
            Err(e) => tracing::error!(agent = %agent.name, error = %e, "failed to register agent"),
        }
    }
    registered
}
