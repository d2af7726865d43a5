//! Hides internal and automated content (heartbeats, cron triggers, tool
//! status JSON, workspace file dumps) from chat transcripts.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::content::{ChatMessage, MessageContent};

/// How a rule inspects trimmed text.
enum Check {
    /// Case-insensitive regex.
    Pattern(&'static str),
    /// Case-sensitive prefix.
    Prefix(&'static str),
    /// A JSON object with a truthy `status`, `tool`, `error` or `result`.
    JsonStatus,
}

struct Rule {
    name: &'static str,
    check: Check,
}

const RULES: &[Rule] = &[
    Rule { name: "thinking", check: Check::Pattern(r"^Thinking:\s") },
    Rule { name: "json_status", check: Check::JsonStatus },
    Rule { name: "identity_file", check: Check::Prefix("# IDENTITY.md") },
    Rule { name: "memory_file", check: Check::Prefix("# MEMORY.md") },
    Rule { name: "no_reply", check: Check::Pattern(r"^NO_REPLY$") },
    Rule { name: "reply_skip", check: Check::Pattern(r"^REPLY_SKIP$") },
    Rule { name: "heartbeat_ok", check: Check::Pattern(r"^HEARTBEAT_OK$") },
    Rule { name: "ok", check: Check::Pattern(r"^OK$") },
    Rule { name: "heartbeat_instruction", check: Check::Pattern(r"Read HEARTBEAT\.md.*follow it strictly") },
    Rule { name: "check_instruction", check: Check::Pattern(r#"Check for notifications with ['"]clawe check['"]"#) },
    Rule { name: "idle_instruction", check: Check::Pattern(r"If nothing needs attention.*reply HEARTBEAT_OK") },
    Rule { name: "system_event", check: Check::Pattern(r"^System:\s*\[\d{4}-\d{2}-\d{2}") },
    Rule { name: "cron", check: Check::Pattern(r"^Cron:") },
    Rule { name: "heartbeat_report", check: Check::Pattern(r"HEARTBEAT_OK") },
];

fn compiled() -> &'static [Option<Regex>] {
    static RE: OnceLock<Vec<Option<Regex>>> = OnceLock::new();
    RE.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| match rule.check {
                Check::Pattern(p) => Some(
                    Regex::new(&format!("(?i){p}")).expect("filter patterns are valid"),
                ),
                _ => None,
            })
            .collect()
    })
}

/// Name of the first rule `text` trips, if any.
pub fn classify(text: &str) -> Option<&'static str> {
    let trimmed = text.trim();
    RULES
        .iter()
        .zip(compiled())
        .find(|(rule, re)| match (&rule.check, re) {
            (Check::Pattern(_), Some(re)) => re.is_match(trimmed),
            (Check::Prefix(prefix), _) => trimmed.starts_with(prefix),
            (Check::JsonStatus, _) => is_json_status(trimmed),
            (Check::Pattern(_), None) => false,
        })
        .map(|(rule, _)| rule.name)
}

pub fn is_internal(text: &str) -> bool {
    classify(text).is_some()
}

fn is_json_status(trimmed: &str) -> bool {
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return false;
    }
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) else {
        return false;
    };
    ["status", "tool", "error", "result"]
        .iter()
        .any(|key| map.get(*key).is_some_and(is_truthy))
}

/// JavaScript truthiness, which is what the runtime's status objects assume.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Displayable blocks of a finished message: text that is not internal, and
/// images.
pub fn filter_displayable(blocks: Vec<MessageContent>) -> Vec<MessageContent> {
    blocks
        .into_iter()
        .filter(|block| match block {
            MessageContent::Text { text } => !is_internal(text),
            MessageContent::Image { .. } => true,
            _ => false,
        })
        .collect()
}

/// Whole-message check used on history: empty messages and any message
/// with an internal text block are dropped.
pub fn is_system_message(message: &ChatMessage) -> bool {
    message.is_empty()
        || message
            .content
            .iter()
            .filter_map(MessageContent::as_text)
            .any(is_internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::content::Role;

    fn msg(role: Role, text: &str) -> ChatMessage {
        ChatMessage {
            id: "m".into(),
            role,
            content: vec![MessageContent::text(text)],
            timestamp: 0,
            is_streaming: false,
        }
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(compiled().len(), RULES.len());
    }

    #[test]
    fn exact_replies_are_case_insensitive() {
        for text in ["NO_REPLY", "reply_skip", "  HEARTBEAT_OK\n", "ok", "Ok"] {
            assert!(is_internal(text), "{text:?} should be hidden");
        }
        assert!(!is_internal("OK, I'll do that"));
    }

    #[test]
    fn heartbeat_and_cron_texts() {
        assert_eq!(
            classify(crate::config::HEARTBEAT_MESSAGE),
            Some("heartbeat_instruction")
        );
        assert_eq!(classify("System: [2026-01-05 10:00] cron fired"), Some("system_event"));
        assert_eq!(classify("Cron: inky-heartbeat"), Some("cron"));
        assert_eq!(
            classify("All quiet. HEARTBEAT_OK for now"),
            Some("heartbeat_report")
        );
    }

    #[test]
    fn internal_prefixes() {
        assert_eq!(classify("Thinking: about the plan"), Some("thinking"));
        assert_eq!(classify("# IDENTITY.md\nname: Inky"), Some("identity_file"));
        assert_eq!(classify("# MEMORY.md"), Some("memory_file"));
        assert!(!is_internal("# Notes"));
    }

    #[test]
    fn json_status_uses_truthiness() {
        assert!(is_internal(r#"{"status": "ok"}"#));
        assert!(is_internal(r#"{"tool": "exec", "x": 1}"#));
        assert!(is_internal(r#"{"result": [1]}"#));
        assert!(!is_internal(r#"{"status": ""}"#));
        assert!(!is_internal(r#"{"error": null, "result": 0}"#));
        assert!(!is_internal(r#"{"name": "Pixel"}"#));
        assert!(!is_internal("{not json}"));
    }

    #[test]
    fn ordinary_text_is_kept() {
        assert_eq!(classify("Hi there!"), None);
        assert_eq!(classify("Here is the draft for the launch post."), None);
    }

    #[test]
    fn displayable_filter_drops_tools_and_internal_text() {
        let blocks = vec![
            MessageContent::text("Thinking: step one"),
            MessageContent::ToolUse(serde_json::json!({"type": "tool_use"})),
            MessageContent::text("Draft attached."),
            MessageContent::base64_image("image/png", "AA=="),
        ];
        let kept = filter_displayable(blocks);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], MessageContent::text("Draft attached."));
    }

    #[test]
    fn system_messages_are_dropped_whole() {
        assert!(is_system_message(&msg(Role::Assistant, "HEARTBEAT_OK")));
        assert!(is_system_message(&msg(Role::Assistant, "   ")));
        assert!(!is_system_message(&msg(Role::User, "Hello")));
    }
}
