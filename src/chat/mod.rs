//! Chat client: streams one agent turn at a time and reduces the event
//! stream into a display-ready transcript.

mod content;
pub mod filter;
mod session;
mod sse;
mod transport;

pub use content::{ChatMessage, MessageContent, Role};
pub use session::{AbortRequest, Attachment, ChatSession, SendRequest, Status};
pub use sse::{ChatEvent, SseDecoder};
pub use transport::{
    ChatTransport, HISTORY_LIMIT, HttpTransport, RESPONSE_TIMEOUT, TurnOutcome, abort,
    load_history, send_message,
};
