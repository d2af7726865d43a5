use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, sync_channel};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::session::{AbortRequest, Attachment, ChatSession, SendRequest};
use super::sse::SseDecoder;
use super::content::ChatMessage;
use crate::error::ChatError;

/// How long the server may take to start answering a send.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

pub const HISTORY_LIMIT: u32 = 200;

/// How often a turn waiting on the stream looks at its cancel flag.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// The chat server's send, abort and history endpoints.
pub trait ChatTransport {
    /// Start a turn; the returned reader yields the raw event stream.
    fn send(&self, request: &SendRequest) -> Result<Box<dyn Read + Send>, ChatError>;

    fn abort(&self, request: &AbortRequest) -> Result<(), ChatError>;

    /// Raw transcript records, oldest first.
    fn history(&self, session_key: &str, limit: u32) -> Result<Vec<Value>, ChatError>;
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    messages: Vec<Value>,
}

/// Blocking HTTP transport against the chat server.
pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        // No global timeout: a turn may stream for minutes once it started.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(RESPONSE_TIMEOUT))
            .timeout_recv_response(Some(RESPONSE_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn map_error(err: ureq::Error) -> ChatError {
    match err {
        ureq::Error::Timeout(_) => ChatError::Timeout,
        ureq::Error::Io(e) if e.kind() == ErrorKind::TimedOut => ChatError::Timeout,
        other => ChatError::Network(other.to_string()),
    }
}

fn server_error(response: &mut ureq::http::Response<ureq::Body>, fallback: &str) -> ChatError {
    let body: ErrorBody = response.body_mut().read_json().unwrap_or_default();
    ChatError::Server(body.error.unwrap_or_else(|| fallback.to_string()))
}

impl ChatTransport for HttpTransport {
    fn send(&self, request: &SendRequest) -> Result<Box<dyn Read + Send>, ChatError> {
        let mut response = self
            .agent
            .post(&self.url("/api/chat"))
            .send_json(request)
            .map_err(map_error)?;
        if !response.status().is_success() {
            return Err(server_error(&mut response, "Failed to send message"));
        }
        Ok(Box::new(response.into_body().into_reader()))
    }

    fn abort(&self, request: &AbortRequest) -> Result<(), ChatError> {
        let mut response = self
            .agent
            .post(&self.url("/api/chat/abort"))
            .send_json(request)
            .map_err(map_error)?;
        if !response.status().is_success() {
            return Err(server_error(&mut response, "Failed to abort"));
        }
        Ok(())
    }

    fn history(&self, session_key: &str, limit: u32) -> Result<Vec<Value>, ChatError> {
        let mut response = self
            .agent
            .get(&self.url("/api/chat/history"))
            .query("sessionKey", session_key)
            .query("limit", limit.to_string())
            .call()
            .map_err(map_error)?;
        if !response.status().is_success() {
            return Err(server_error(&mut response, "Failed to load history"));
        }
        let body: HistoryBody = response
            .body_mut()
            .read_json()
            .map_err(|e| ChatError::Server(format!("invalid history response: {e}")))?;
        Ok(body.messages)
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Blank message; nothing was sent.
    Ignored,
    Finished(ChatMessage),
    /// The stream closed without a terminal event.
    Ended,
    Aborted,
    /// The session holds the error.
    Failed,
}

/// One read off the reply stream.
enum Chunk {
    Data(Vec<u8>),
    Eof,
    Failed(std::io::Error),
}

/// Move the blocking reads onto their own thread so a stalled server
/// cannot hold up cancellation. The thread exits at EOF, on a read error,
/// or on its next read after the receiver is dropped.
fn spawn_reader(mut reader: Box<dyn Read + Send>) -> Result<Receiver<Chunk>, ChatError> {
    let (tx, rx) = sync_channel(16);
    thread::Builder::new()
        .name("chat-stream".into())
        .spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                let chunk = match reader.read(&mut buf) {
                    Ok(0) => Chunk::Eof,
                    Ok(n) => Chunk::Data(buf[..n].to_vec()),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => Chunk::Failed(e),
                };
                let done = !matches!(chunk, Chunk::Data(_));
                if tx.send(chunk).is_err() || done {
                    return;
                }
            }
        })?;
    Ok(rx)
}

/// Send one message and drive the reply stream into `session` until it ends.
///
/// `cancel` is polled while waiting on the stream, so it takes effect even
/// when the server has gone quiet. Once set, the turn is aborted locally and
/// the server is told on a best-effort basis. `on_update` runs after every
/// applied event.
pub fn send_message<T: ChatTransport + ?Sized>(
    session: &mut ChatSession,
    transport: &T,
    text: &str,
    attachments: Vec<Attachment>,
    cancel: &AtomicBool,
    mut on_update: impl FnMut(&ChatSession),
) -> TurnOutcome {
    let Some(request) = session.begin_send(text, attachments) else {
        return TurnOutcome::Ignored;
    };
    on_update(session);

    let chunks = match transport.send(&request).and_then(spawn_reader) {
        Ok(chunks) => chunks,
        Err(e) => {
            tracing::debug!(error = %e, "chat send failed");
            session.fail(&e);
            return TurnOutcome::Failed;
        }
    };

    let stream = session.open_stream();
    on_update(session);

    let mut decoder = SseDecoder::new();
    loop {
        if cancel.load(Ordering::Relaxed) {
            abort(session, transport);
            return TurnOutcome::Aborted;
        }

        let bytes = match chunks.recv_timeout(CANCEL_POLL) {
            Ok(Chunk::Data(bytes)) => bytes,
            Ok(Chunk::Eof) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(Chunk::Failed(e)) => {
                let err = if e.kind() == ErrorKind::TimedOut {
                    ChatError::Timeout
                } else {
                    ChatError::Io(e)
                };
                session.fail(&err);
                return TurnOutcome::Failed;
            }
        };

        for event in decoder.push(&bytes) {
            let terminal = event.is_terminal();
            let finished = session.handle_event(&stream, event);
            on_update(session);
            if let Some(message) = finished {
                return TurnOutcome::Finished(message);
            }
            if terminal {
                return match session.status() {
                    super::Status::Error => TurnOutcome::Failed,
                    _ => TurnOutcome::Aborted,
                };
            }
        }
    }

    session.finish_stream(&stream);
    on_update(session);
    TurnOutcome::Ended
}

/// Abort locally, then notify the server. Failures are only logged.
pub fn abort<T: ChatTransport + ?Sized>(session: &mut ChatSession, transport: &T) {
    let request = session.abort();
    if let Err(e) = transport.abort(&request) {
        tracing::debug!(error = %e, "abort request failed");
    }
}

/// Load the transcript into `session`. Returns how many records were hidden.
pub fn load_history<T: ChatTransport + ?Sized>(
    session: &mut ChatSession,
    transport: &T,
) -> Result<usize, ChatError> {
    session.begin_history();
    match transport.history(session.session_key(), HISTORY_LIMIT) {
        Ok(raw) => Ok(session.apply_history(&raw)),
        Err(e) => {
            session.history_failed(&e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Instant;

    use serde_json::json;

    use super::*;
    use crate::chat::Status;

    /// Yields one scripted chunk per read, optionally raising `cancel`
    /// after a given chunk. With `stall` set, the read after the last chunk
    /// blocks like a server that stopped sending.
    struct ChunkReader {
        chunks: VecDeque<Vec<u8>>,
        cancel_after: Option<(usize, Arc<AtomicBool>)>,
        served: usize,
        stall: bool,
    }

    impl Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let Some(chunk) = self.chunks.pop_front() else {
                if self.stall {
                    std::thread::sleep(Duration::from_secs(10));
                }
                return Ok(0);
            };
            buf[..chunk.len()].copy_from_slice(&chunk);
            self.served += 1;
            if let Some((after, flag)) = &self.cancel_after
                && self.served >= *after
            {
                flag.store(true, Ordering::Relaxed);
            }
            Ok(chunk.len())
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        chunks: Vec<&'static str>,
        send_error: Option<fn() -> ChatError>,
        cancel_after: Option<(usize, Arc<AtomicBool>)>,
        stall: bool,
        sent: RefCell<Vec<SendRequest>>,
        aborts: RefCell<Vec<AbortRequest>>,
        history: Vec<Value>,
    }

    impl ChatTransport for ScriptedTransport {
        fn send(&self, request: &SendRequest) -> Result<Box<dyn Read + Send>, ChatError> {
            self.sent.borrow_mut().push(request.clone());
            if let Some(make) = self.send_error {
                return Err(make());
            }
            Ok(Box::new(ChunkReader {
                chunks: self.chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
                cancel_after: self.cancel_after.clone(),
                served: 0,
                stall: self.stall,
            }))
        }

        fn abort(&self, request: &AbortRequest) -> Result<(), ChatError> {
            self.aborts.borrow_mut().push(request.clone());
            Err(ChatError::Network("connection reset".into()))
        }

        fn history(&self, _session_key: &str, limit: u32) -> Result<Vec<Value>, ChatError> {
            assert_eq!(limit, HISTORY_LIMIT);
            Ok(self.history.clone())
        }
    }

    const DELTA: &str = "event: delta\ndata: {\"runId\":\"run-9\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"Hel\"}]}}\n\n";

    #[test]
    fn full_turn_finishes() {
        let transport = ScriptedTransport {
            chunks: vec![
                "event: connected\ndata: {}\n\n",
                DELTA,
                "event: final\ndata: {\"message\":{\"content\":[{\"type\":\"text\",",
                "\"text\":\"Hello!\"}]}}\n\n",
            ],
            ..ScriptedTransport::default()
        };
        let mut session = ChatSession::new("agent:main:main");
        let mut updates = 0;

        let outcome = send_message(
            &mut session,
            &transport,
            "hi",
            Vec::new(),
            &AtomicBool::new(false),
            |_| updates += 1,
        );

        let TurnOutcome::Finished(message) = outcome else {
            panic!("expected a finished turn, got {outcome:?}");
        };
        assert_eq!(message.text(), "Hello!");
        assert_eq!(session.status(), Status::Idle);
        assert_eq!(transport.sent.borrow()[0].message, "hi");
        assert!(updates >= 4);
    }

    #[test]
    fn timeout_marks_session_failed() {
        let transport = ScriptedTransport {
            send_error: Some(|| ChatError::Timeout),
            ..ScriptedTransport::default()
        };
        let mut session = ChatSession::new("agent:main:main");

        let outcome = send_message(&mut session, &transport, "hi", Vec::new(), &AtomicBool::new(false), |_| {});

        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(session.error(), Some("Request timed out. Please try again."));
    }

    #[test]
    fn cancel_aborts_and_notifies_server() {
        let cancel = Arc::new(AtomicBool::new(false));
        let transport = ScriptedTransport {
            chunks: vec![DELTA, DELTA, DELTA],
            cancel_after: Some((1, Arc::clone(&cancel))),
            ..ScriptedTransport::default()
        };
        let mut session = ChatSession::new("agent:main:main");

        let outcome = send_message(&mut session, &transport, "hi", Vec::new(), &cancel, |_| {});

        assert_eq!(outcome, TurnOutcome::Aborted);
        assert_eq!(session.status(), Status::Idle);
        assert!(session.error().is_none());
        let aborts = transport.aborts.borrow();
        assert_eq!(aborts[0].run_id.as_deref(), Some("run-9"));
        assert_eq!(aborts[0].session_key, "agent:main:main");
    }

    #[test]
    fn cancel_interrupts_stalled_stream() {
        let cancel = Arc::new(AtomicBool::new(false));
        let transport = ScriptedTransport {
            chunks: vec![DELTA],
            stall: true,
            ..ScriptedTransport::default()
        };
        let mut session = ChatSession::new("agent:main:main");

        let flag = Arc::clone(&cancel);
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            flag.store(true, Ordering::Relaxed);
        });

        let start = Instant::now();
        let outcome = send_message(&mut session, &transport, "hi", Vec::new(), &cancel, |_| {});
        let elapsed = start.elapsed();
        canceller.join().unwrap();

        assert_eq!(outcome, TurnOutcome::Aborted);
        assert!(elapsed < Duration::from_secs(2), "abort took {elapsed:?}");
        assert_eq!(session.status(), Status::Idle);
        assert!(!session.messages()[1].is_streaming);
        assert_eq!(session.messages()[1].text(), "Hel");
        assert_eq!(transport.aborts.borrow()[0].run_id.as_deref(), Some("run-9"));
    }

    #[test]
    fn stream_end_without_final() {
        let transport = ScriptedTransport {
            chunks: vec![DELTA],
            ..ScriptedTransport::default()
        };
        let mut session = ChatSession::new("agent:main:main");

        let outcome = send_message(&mut session, &transport, "hi", Vec::new(), &AtomicBool::new(false), |_| {});

        assert_eq!(outcome, TurnOutcome::Ended);
        assert_eq!(session.status(), Status::Idle);
        assert_eq!(session.messages()[1].text(), "Hel");
    }

    #[test]
    fn error_event_fails_turn() {
        let transport = ScriptedTransport {
            chunks: vec!["event: error\ndata: {\"message\":\"Gateway not connected\"}\n"],
            ..ScriptedTransport::default()
        };
        let mut session = ChatSession::new("agent:main:main");

        let outcome = send_message(&mut session, &transport, "hi", Vec::new(), &AtomicBool::new(false), |_| {});

        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(session.messages()[1].text(), "Error: Gateway not connected");
    }

    #[test]
    fn history_loads_filtered_transcript() {
        let transport = ScriptedTransport {
            history: vec![
                json!({"role": "user", "content": "Hello"}),
                json!({"role": "assistant", "content": "HEARTBEAT_OK"}),
            ],
            ..ScriptedTransport::default()
        };
        let mut session = ChatSession::new("agent:main:main");

        assert_eq!(load_history(&mut session, &transport).unwrap(), 1);
        assert_eq!(session.messages().len(), 1);
    }
}
