use std::process::ExitCode;

/// Errors that cause clawe to exit with a specific code.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("{message}")]
    WithCode { code: u8, message: String },

    #[error("{0}")]
    Other(String),
}

impl ExitError {
    pub fn new(code: u8, message: String) -> Self {
        ExitError::WithCode { code, message }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            ExitError::Config(_) | ExitError::MissingEnv(_) => ExitCode::from(2),
            ExitError::Store(_) => ExitCode::from(3),
            ExitError::Gateway(_) => ExitCode::from(4),
            ExitError::WithCode { code, .. } => ExitCode::from(*code),
            ExitError::Other(_) => ExitCode::from(1),
        }
    }
}

/// Exit code for any command failure. Store and gateway errors that reach
/// `main` unwrapped get their own codes too.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(e) = err.downcast_ref::<ExitError>() {
        e.exit_code()
    } else if err.downcast_ref::<StoreError>().is_some() {
        ExitCode::from(3)
    } else if err.downcast_ref::<GatewayError>().is_some() {
        ExitCode::from(4)
    } else {
        ExitCode::FAILURE
    }
}

/// Failures talking to the Convex function API.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("{path} failed: {message}")]
    Function { path: String, message: String },

    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },
}

/// Failures reported by (or on the way to) the OpenClaw gateway.
///
/// `kind` mirrors the gateway's own `error.type` field so callers can log it
/// verbatim.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: String,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn http(status: u16) -> Self {
        Self::new("http_error", format!("HTTP {status}: {}", reason_phrase(status)))
    }

    pub fn network() -> Self {
        Self::new("network_error", "Network error")
    }
}

/// Failures of a chat turn. `Aborted` is not surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Request timed out. Please try again.")]
    Timeout,

    #[error("aborted")]
    Aborted,

    #[error("{0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub const fn is_abort(&self) -> bool {
        matches!(self, ChatError::Aborted)
    }
}

pub(crate) fn reason_phrase(status: u16) -> &'static str {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}
