//! Template rendering for notification messages pushed into agent sessions.

use minijinja::Environment;
use serde::Serialize;

use crate::store::PendingNotification;

/// Default notification format:
///
/// ```text
/// 📨 From Inky:
/// Draft is ready
///
/// 📋 Task: Launch post (review)
/// ```
pub const DEFAULT_NOTIFICATION_TEMPLATE: &str = "📨 {% if source %}From {{ source }}:{% else %}Notification:{% endif %}\n{{ content }}{% if task %}\n\n📋 Task: {{ task.title }} ({{ task.status }}){% endif %}";

/// Context data passed to the notification template
#[derive(Debug, Serialize)]
pub struct NotificationContext<'a> {
    /// Source agent name, when the notification came from an agent
    pub source: Option<&'a str>,
    pub content: &'a str,
    pub kind: &'a str,
    pub task: Option<TaskContext<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TaskContext<'a> {
    pub title: &'a str,
    pub status: &'a str,
}

impl<'a> NotificationContext<'a> {
    pub fn from_notification(n: &'a PendingNotification) -> Self {
        Self {
            source: n
                .source_agent
                .as_ref()
                .map(|a| a.name.as_str())
                .filter(|name| !name.is_empty()),
            content: &n.content,
            kind: n.kind.as_str(),
            task: n.task.as_ref().map(|t| TaskContext {
                title: &t.title,
                status: &t.status,
            }),
        }
    }
}

/// Notification formatter backed by a minijinja template.
///
/// The template is compiled once at construction so a bad override fails
/// at watcher startup rather than on every notification.
pub struct NotificationFormatter {
    env: Environment<'static>,
    source: String,
}

impl NotificationFormatter {
    pub fn new(template: Option<&str>) -> anyhow::Result<Self> {
        let env = Environment::new();
        let source = template.unwrap_or(DEFAULT_NOTIFICATION_TEMPLATE).to_string();
        env.template_from_str(&source)?;
        Ok(Self { env, source })
    }

    pub fn render(&self, notification: &PendingNotification) -> anyhow::Result<String> {
        let rendered = self
            .env
            .render_str(&self.source, NotificationContext::from_notification(notification))?;
        Ok(rendered)
    }
}

impl Default for NotificationFormatter {
    fn default() -> Self {
        Self {
            env: Environment::new(),
            source: DEFAULT_NOTIFICATION_TEMPLATE.to_string(),
        }
    }
}
