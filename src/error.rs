//! Error types for the race coordinator
//!
//! Domain failures are expressed as `RaceError` variants and carried through
//! the crate as `anyhow::Error` so callers can add context freely.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific race coordination scenarios
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Handshake rejected: {reason}")]
    HandshakeRejected { reason: String },

    #[error("Invalid progress: {reason}")]
    InvalidProgress { reason: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Participant unreachable: {participant_id}")]
    ParticipantUnreachable { participant_id: String },

    #[error("Race is not in progress: {session_id}")]
    RaceNotInProgress { session_id: String },

    #[error("Content unavailable: {message}")]
    ContentUnavailable { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl RaceError {
    /// Shorthand for the lock-poisoning case used by every shared structure
    pub fn lock_poisoned(what: &str) -> Self {
        RaceError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}
