use thiserror::Error;

/// A convenience `Result` alias using [`RollcallError`].
pub type RollcallResult<T> = Result<T, RollcallError>;

/// Lifecycle violations raised by the session store.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStateError {
    /// No session is `ACTIVE` (none exists, or it is being finalized).
    #[error("No active session")]
    NoActiveSession,

    /// A session already exists, so a new one cannot be started.
    #[error("A session is already active")]
    SessionAlreadyActive,
}

/// Top-level error type for Rollcall.
///
/// The first six variants mirror the failure taxonomy reported to clients;
/// the rest are ambient failures from configuration and I/O.
#[derive(Error, Debug)]
pub enum RollcallError {
    /// Bad or missing credential at handshake.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The caller's role is not allowed to perform the action.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// The session is not in the state the action requires.
    #[error("{0}")]
    SessionState(#[from] SessionStateError),

    /// An inbound envelope could not be parsed.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// An inbound envelope named an event this server does not handle.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// The durable store rejected a roster read or the finalize write.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// The requested class is not known to the store.
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// The session actor is gone or did not reply.
    #[error("Session error: {0}")]
    Session(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RollcallError {
    /// Whether this error is a session lifecycle violation.
    pub fn is_session_state(&self) -> bool {
        matches!(self, RollcallError::SessionState(_))
    }
}
