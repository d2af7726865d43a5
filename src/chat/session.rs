use serde::Serialize;
use serde_json::Value;

use super::content::{ChatMessage, MessageContent, Role, raw_blocks, raw_text};
use super::filter::{filter_displayable, is_internal, is_system_message};
use super::sse::ChatEvent;
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Loading,
    Streaming,
    Error,
}

/// An image attached to an outgoing message, base64 without the data-URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mime_type: String,
    pub content: String,
}

impl Attachment {
    pub fn image(mime_type: &str, base64_or_data_url: &str) -> Self {
        let content = base64_or_data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map_or(base64_or_data_url, |(_, data)| data);
        Self {
            kind: "image",
            mime_type: mime_type.to_string(),
            content: content.to_string(),
        }
    }
}

/// Body of the chat send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub session_key: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Body of the abort request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortRequest {
    pub session_key: String,
    pub run_id: Option<String>,
}

/// Client-side state of one chat session.
///
/// Transitions: `idle → loading → streaming → idle | error`. Every stream
/// event carries the id of the stream it came from, and only events of the
/// active stream are applied, so a newer send silently supersedes an older
/// one.
#[derive(Debug)]
pub struct ChatSession {
    session_key: String,
    messages: Vec<ChatMessage>,
    status: Status,
    error: Option<String>,
    active_stream: Option<String>,
    run_id: Option<String>,
    streaming_text: String,
}

impl ChatSession {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            messages: Vec::new(),
            status: Status::Idle,
            error: None,
            active_stream: None,
            run_id: None,
            streaming_text: String::new(),
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub const fn status(&self) -> Status {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn active_stream(&self) -> Option<&str> {
        self.active_stream.as_deref()
    }

    /// Start a turn. Returns `None` (and changes nothing) for a blank message
    /// without attachments.
    pub fn begin_send(&mut self, text: &str, attachments: Vec<Attachment>) -> Option<SendRequest> {
        let text = text.trim();
        if text.is_empty() && attachments.is_empty() {
            return None;
        }

        self.active_stream = None;
        self.stop_streaming_all();

        let mut content = Vec::new();
        if !text.is_empty() {
            content.push(MessageContent::text(text));
        }
        content.extend(
            attachments
                .iter()
                .map(|a| MessageContent::base64_image(&a.mime_type, &a.content)),
        );
        self.messages.push(ChatMessage {
            id: new_message_id(),
            role: Role::User,
            content,
            timestamp: now_ms(),
            is_streaming: false,
        });

        self.status = Status::Loading;
        self.error = None;
        self.run_id = None;
        self.streaming_text.clear();

        Some(SendRequest {
            session_key: self.session_key.clone(),
            message: text.to_string(),
            attachments,
        })
    }

    /// The response opened: add the streaming assistant message. Its id is
    /// also the stream id that events must carry.
    pub fn open_stream(&mut self) -> String {
        let id = new_message_id();
        self.messages.push(ChatMessage {
            id: id.clone(),
            role: Role::Assistant,
            content: vec![MessageContent::text("")],
            timestamp: now_ms(),
            is_streaming: true,
        });
        self.active_stream = Some(id.clone());
        self.status = Status::Streaming;
        id
    }

    /// Apply one event. Returns the finished assistant message on `final`.
    pub fn handle_event(&mut self, stream_id: &str, event: ChatEvent) -> Option<ChatMessage> {
        if self.active_stream.as_deref() != Some(stream_id) {
            tracing::trace!(stream_id, "dropping event from superseded stream");
            return None;
        }

        match event {
            ChatEvent::Connected => None,
            ChatEvent::Delta { run_id, message } => {
                if run_id.is_some() {
                    self.run_id = run_id;
                }
                self.apply_delta(stream_id, message.as_ref());
                None
            }
            ChatEvent::Final { message } => {
                let finished = self.apply_final(stream_id, message.as_ref());
                self.active_stream = None;
                self.status = Status::Idle;
                finished
            }
            ChatEvent::Error { message } => {
                let message = message.unwrap_or_else(|| "An error occurred".into());
                self.show_error(stream_id, &message);
                self.active_stream = None;
                self.error = Some(message);
                self.status = Status::Error;
                None
            }
            ChatEvent::Aborted => {
                if let Some(msg) = self.message_mut(stream_id) {
                    msg.is_streaming = false;
                }
                self.active_stream = None;
                self.status = Status::Idle;
                None
            }
        }
    }

    fn apply_delta(&mut self, stream_id: &str, message: Option<&Value>) {
        let text = raw_text(message);
        if !text.is_empty() && text.chars().count() >= self.streaming_text.chars().count() {
            self.streaming_text = text;
        }

        let mut content = Vec::new();
        if !self.streaming_text.is_empty() {
            content.push(MessageContent::text(self.streaming_text.as_str()));
        }
        content.extend(
            raw_blocks(message)
                .into_iter()
                .filter(|b| matches!(b, MessageContent::ToolUse(_) | MessageContent::Thinking(_))),
        );
        if content.is_empty() {
            content.push(MessageContent::text(""));
        }

        if let Some(msg) = self.message_mut(stream_id) {
            msg.content = content;
        }
    }

    fn apply_final(&mut self, stream_id: &str, message: Option<&Value>) -> Option<ChatMessage> {
        let filtered = filter_displayable(raw_blocks(message));
        let msg = self.message_mut(stream_id)?;

        msg.content = if filtered.is_empty() {
            // Fall back to what was streamed, unless that is internal too.
            let streamed = msg.text();
            let fallback = if is_internal(&streamed) { String::new() } else { streamed };
            vec![MessageContent::text(fallback)]
        } else {
            filtered
        };
        msg.is_streaming = false;
        Some(msg.clone())
    }

    fn show_error(&mut self, stream_id: &str, message: &str) {
        if let Some(msg) = self.message_mut(stream_id) {
            msg.content = vec![MessageContent::text(format!("Error: {message}"))];
            msg.is_streaming = false;
        }
    }

    /// The stream ended without a terminal event.
    pub fn finish_stream(&mut self, stream_id: &str) {
        if self.active_stream.as_deref() != Some(stream_id) {
            return;
        }
        if let Some(msg) = self.message_mut(stream_id) {
            msg.is_streaming = false;
        }
        self.active_stream = None;
        self.status = Status::Idle;
    }

    /// A transport-level failure of the current turn. Aborts are not errors.
    pub fn fail(&mut self, error: &ChatError) {
        if error.is_abort() {
            return;
        }
        let message = error.to_string();
        if let Some(stream_id) = self.active_stream.take() {
            self.show_error(&stream_id, &message);
        }
        self.error = Some(message);
        self.status = Status::Error;
    }

    /// Cancel the in-flight turn locally. The returned request should then be
    /// sent to the abort endpoint; its outcome does not matter.
    pub fn abort(&mut self) -> AbortRequest {
        self.active_stream = None;
        self.stop_streaming_all();
        self.status = Status::Idle;
        AbortRequest {
            session_key: self.session_key.clone(),
            run_id: self.run_id.clone(),
        }
    }

    pub fn begin_history(&mut self) {
        self.status = Status::Loading;
        self.error = None;
    }

    /// Replace the transcript with the displayable part of `raw`. Returns how
    /// many records were hidden.
    pub fn apply_history(&mut self, raw: &[Value]) -> usize {
        let now = now_ms();
        let parsed: Vec<ChatMessage> = raw
            .iter()
            .enumerate()
            .map(|(i, record)| ChatMessage::from_history(record, format!("{}{i}", new_message_id()), now))
            .collect();
        let total = parsed.len();
        self.messages = parsed.into_iter().filter(|m| !is_system_message(m)).collect();
        self.status = Status::Idle;
        let hidden = total - self.messages.len();
        if hidden > 0 {
            tracing::debug!(hidden, "filtered system messages from history");
        }
        hidden
    }

    pub fn history_failed(&mut self, error: &ChatError) {
        self.error = Some(error.to_string());
        self.status = Status::Error;
    }

    fn stop_streaming_all(&mut self) {
        for msg in self.messages.iter_mut().filter(|m| m.is_streaming) {
            msg.is_streaming = false;
        }
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn new_message_id() -> String {
    format!("msg_{}_{:012x}", now_ms(), rand::random::<u64>() & 0xffff_ffff_ffff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(text: &str) -> ChatEvent {
        ChatEvent::Delta {
            run_id: Some("run-1".into()),
            message: Some(json!({"content": [{"type": "text", "text": text}]})),
        }
    }

    fn streaming_session() -> (ChatSession, String) {
        let mut session = ChatSession::new("agent:main:main");
        session.begin_send("hello", Vec::new()).unwrap();
        let stream = session.open_stream();
        (session, stream)
    }

    fn last_text(session: &ChatSession) -> String {
        session.messages().last().unwrap().text()
    }

    #[test]
    fn blank_send_is_ignored() {
        let mut session = ChatSession::new("agent:main:main");
        assert!(session.begin_send("   ", Vec::new()).is_none());
        assert!(session.messages().is_empty());
        assert_eq!(session.status(), Status::Idle);
    }

    #[test]
    fn send_with_only_attachment_is_accepted() {
        let mut session = ChatSession::new("agent:main:main");
        let req = session
            .begin_send("", vec![Attachment::image("image/png", "data:image/png;base64,AAAA")])
            .unwrap();
        assert_eq!(req.attachments[0].content, "AAAA");
        assert_eq!(session.messages()[0].content.len(), 1);
        assert_eq!(session.status(), Status::Loading);
    }

    #[test]
    fn send_request_wire_shape() {
        let mut session = ChatSession::new("agent:main:main");
        let req = session.begin_send("  hi  ", Vec::new()).unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"sessionKey": "agent:main:main", "message": "hi"})
        );
    }

    #[test]
    fn stream_lifecycle() {
        let (mut session, stream) = streaming_session();
        assert_eq!(session.status(), Status::Streaming);
        assert!(session.messages()[1].is_streaming);

        session.handle_event(&stream, ChatEvent::Connected);
        session.handle_event(&stream, delta("Hi"));
        session.handle_event(&stream, delta("Hi there"));
        assert_eq!(last_text(&session), "Hi there");
        assert_eq!(session.run_id(), Some("run-1"));

        let done = session
            .handle_event(
                &stream,
                ChatEvent::Final {
                    message: Some(json!({"content": [
                        {"type": "thinking", "thinking": "..."},
                        {"type": "text", "text": "Hi there!"}
                    ]})),
                },
            )
            .unwrap();
        assert_eq!(done.content, vec![MessageContent::text("Hi there!")]);
        assert!(!done.is_streaming);
        assert_eq!(session.status(), Status::Idle);
    }

    #[test]
    fn delta_text_never_shrinks() {
        let (mut session, stream) = streaming_session();
        let mut longest = 0;
        for text in ["Hel", "Hello", "He", "", "Hello, w", "Hello"] {
            session.handle_event(&stream, delta(text));
            let len = last_text(&session).chars().count();
            assert!(len >= longest, "text shrank at {text:?}");
            longest = len;
        }
        assert_eq!(last_text(&session), "Hello, w");
    }

    #[test]
    fn delta_keeps_tool_and_thinking_blocks() {
        let (mut session, stream) = streaming_session();
        session.handle_event(
            &stream,
            ChatEvent::Delta {
                run_id: None,
                message: Some(json!({"content": [
                    {"type": "text", "text": "Working"},
                    {"type": "toolCall", "name": "exec"},
                    {"type": "thinking", "thinking": "plan"},
                    {"type": "image", "source": {}}
                ]})),
            },
        );
        let content = &session.messages()[1].content;
        assert_eq!(content.len(), 3);
        assert!(matches!(content[1], MessageContent::ToolUse(_)));
        assert!(matches!(content[2], MessageContent::Thinking(_)));
    }

    #[test]
    fn stale_stream_events_are_ignored() {
        let mut session = ChatSession::new("agent:main:main");
        session.begin_send("A", Vec::new()).unwrap();
        let s1 = session.open_stream();
        session.handle_event(&s1, delta("answer to A"));

        session.begin_send("B", Vec::new()).unwrap();
        assert!(!session.messages()[1].is_streaming);
        let s2 = session.open_stream();

        let before = session.messages().to_vec();
        session.handle_event(&s1, delta("late answer to A, much longer"));
        session.handle_event(&s1, ChatEvent::Error { message: None });
        assert_eq!(session.messages(), before.as_slice());
        assert_eq!(session.status(), Status::Streaming);

        session.handle_event(&s2, delta("B!"));
        assert_eq!(last_text(&session), "B!");
    }

    #[test]
    fn final_with_only_internal_content_falls_back_to_streamed_text() {
        let (mut session, stream) = streaming_session();
        session.handle_event(&stream, delta("Here you go"));
        session.handle_event(
            &stream,
            ChatEvent::Final {
                message: Some(json!({"content": [{"type": "text", "text": "NO_REPLY"}]})),
            },
        );
        assert_eq!(last_text(&session), "Here you go");

        let (mut session, stream) = streaming_session();
        session.handle_event(&stream, delta("HEARTBEAT_OK"));
        session.handle_event(&stream, ChatEvent::Final { message: None });
        assert_eq!(last_text(&session), "");
    }

    #[test]
    fn error_event_shows_message() {
        let (mut session, stream) = streaming_session();
        session.handle_event(&stream, ChatEvent::Error { message: None });
        assert_eq!(last_text(&session), "Error: An error occurred");
        assert_eq!(session.status(), Status::Error);
        assert_eq!(session.error(), Some("An error occurred"));
    }

    #[test]
    fn aborted_event_keeps_content() {
        let (mut session, stream) = streaming_session();
        session.handle_event(&stream, delta("partial"));
        session.handle_event(&stream, ChatEvent::Aborted);
        assert_eq!(last_text(&session), "partial");
        assert!(!session.messages()[1].is_streaming);
        assert_eq!(session.status(), Status::Idle);
    }

    #[test]
    fn local_abort_returns_run_id() {
        let (mut session, stream) = streaming_session();
        session.handle_event(&stream, delta("par"));
        let req = session.abort();
        assert_eq!(req.run_id.as_deref(), Some("run-1"));
        assert_eq!(session.status(), Status::Idle);
        assert!(session.messages().iter().all(|m| !m.is_streaming));

        // Anything still in flight for that stream is dropped.
        session.handle_event(&stream, delta("partial answer"));
        assert_eq!(last_text(&session), "par");
    }

    #[test]
    fn stream_end_without_terminal_event_goes_idle() {
        let (mut session, stream) = streaming_session();
        session.handle_event(&stream, delta("cut off"));
        session.finish_stream(&stream);
        assert_eq!(session.status(), Status::Idle);
        assert!(!session.messages()[1].is_streaming);
        assert_eq!(last_text(&session), "cut off");
    }

    #[test]
    fn timeout_before_response_sets_error() {
        let mut session = ChatSession::new("agent:main:main");
        session.begin_send("hi", Vec::new()).unwrap();
        session.fail(&ChatError::Timeout);
        assert_eq!(session.status(), Status::Error);
        assert_eq!(session.error(), Some("Request timed out. Please try again."));

        let mut session = ChatSession::new("agent:main:main");
        session.begin_send("hi", Vec::new()).unwrap();
        session.fail(&ChatError::Aborted);
        assert_eq!(session.status(), Status::Loading);
        assert!(session.error().is_none());
    }

    #[test]
    fn history_filters_system_messages() {
        let mut session = ChatSession::new("agent:main:main");
        session.begin_history();
        let hidden = session.apply_history(&[
            json!({"role": "assistant", "content": "HEARTBEAT_OK"}),
            json!({"role": "user", "content": "Hello"}),
            json!({"role": "assistant", "content": [{"type": "text", "text": "Hi there!"}]}),
            json!({"role": "assistant", "content": [{"type": "tool_use", "id": "x"}]}),
            json!({"role": "user", "content": crate::config::HEARTBEAT_MESSAGE}),
        ]);
        assert_eq!(hidden, 3);
        let msgs = session.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!((msgs[0].role, msgs[0].text().as_str()), (Role::User, "Hello"));
        assert_eq!((msgs[1].role, msgs[1].text().as_str()), (Role::Assistant, "Hi there!"));
        assert_ne!(msgs[0].id, msgs[1].id);
        assert_eq!(session.status(), Status::Idle);
    }
}
