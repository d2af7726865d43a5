use serde::{Serialize, Serializer};
use serde_json::{Value, json};

/// One content block of a chat message.
///
/// Text and images are displayable. Tool calls and thinking blocks are kept
/// verbatim (including the `tool_use`/`toolCall` spelling) while streaming.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text { text: String },
    Image { source: Value },
    ToolUse(Value),
    Thinking(Value),
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Base64 image block from a MIME type and payload.
    pub fn base64_image(media_type: &str, data: &str) -> Self {
        Self::Image {
            source: json!({ "type": "base64", "media_type": media_type, "data": data }),
        }
    }

    /// Decode a raw block. Unknown block types yield `None`.
    pub fn from_block(block: &Value) -> Option<Self> {
        match block.get("type")?.as_str()? {
            "text" => Some(Self::text(
                block.get("text").and_then(Value::as_str).unwrap_or_default(),
            )),
            "image" => Some(Self::Image {
                source: block.get("source").cloned().unwrap_or(Value::Null),
            }),
            "tool_use" | "toolCall" => Some(Self::ToolUse(block.clone())),
            "thinking" => Some(Self::Thinking(block.clone())),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub const fn is_displayable(&self) -> bool {
        matches!(self, Self::Text { .. } | Self::Image { .. })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Text { text } => json!({ "type": "text", "text": text }),
            Self::Image { source } => json!({ "type": "image", "source": source }),
            Self::ToolUse(raw) | Self::Thinking(raw) => raw.clone(),
        }
    }
}

impl Serialize for MessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Anything other than `user` or `system` is treated as the assistant.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("user") => Self::User,
            Some("system") => Self::System,
            _ => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: Vec<MessageContent>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
}

impl ChatMessage {
    /// Parse one transcript record from the history endpoint.
    ///
    /// Only text and image blocks survive; a string body becomes a single text
    /// block and anything unusable becomes one empty text block.
    pub fn from_history(raw: &Value, id: String, now_ms: i64) -> Self {
        let content = match raw.get("content") {
            Some(Value::Array(blocks)) => {
                let kept: Vec<MessageContent> = blocks
                    .iter()
                    .filter_map(MessageContent::from_block)
                    .filter(MessageContent::is_displayable)
                    .collect();
                if kept.is_empty() {
                    vec![MessageContent::text("")]
                } else {
                    kept
                }
            }
            Some(Value::String(s)) => vec![MessageContent::text(s.as_str())],
            _ => vec![MessageContent::text("")],
        };

        #[allow(clippy::cast_possible_truncation)]
        let timestamp = raw
            .get("timestamp")
            .and_then(Value::as_f64)
            .filter(|t| *t > 0.0)
            .map_or(now_ms, |t| t as i64);

        Self {
            id,
            role: Role::from_raw(raw.get("role").and_then(Value::as_str)),
            content,
            timestamp,
            is_streaming: false,
        }
    }

    /// Concatenated text of every text block.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(MessageContent::as_text).collect()
    }

    /// True when there is no image and no non-blank text.
    pub fn is_empty(&self) -> bool {
        !self.content.iter().any(|block| match block {
            MessageContent::Text { text } => !text.trim().is_empty(),
            MessageContent::Image { .. } => true,
            _ => false,
        })
    }
}

/// Concatenated text of a raw streamed message (`{content: string | block[]}`).
pub fn raw_text(message: Option<&Value>) -> String {
    match message.and_then(|m| m.get("content")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

/// Decoded blocks of a raw streamed message, unknown types dropped.
pub fn raw_blocks(message: Option<&Value>) -> Vec<MessageContent> {
    message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .map(|blocks| blocks.iter().filter_map(MessageContent::from_block).collect())
        .unwrap_or_default()
}
