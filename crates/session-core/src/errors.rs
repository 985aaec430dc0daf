//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error type for session operations.
///
/// Every failure here is recoverable by design: the bridging logic logs,
/// leaves conference state unchanged and never aborts media flow. Callers
/// (signaling) decide whether to retry or surface a user-visible failure.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Referenced call id is unknown to the signaling layer
    #[error("Call not found: {0}")]
    CallNotFound(String),

    /// Referenced conference id is not registered
    #[error("Conference not found: {0}")]
    ConferenceNotFound(String),

    /// A transition was requested from a state that does not support it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl SessionError {
    /// Invalid-state error from a message
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        SessionError::InvalidState(msg.into())
    }

    /// Unknown-call error from a call id
    pub fn call_not_found(call_id: impl Into<String>) -> Self {
        SessionError::CallNotFound(call_id.into())
    }

    /// Unknown-conference error from a conference id
    pub fn conference_not_found(conf_id: impl Into<String>) -> Self {
        SessionError::ConferenceNotFound(conf_id.into())
    }
}
