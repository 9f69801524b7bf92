//! Error types shared across the crate

use thiserror::Error;

/// Errors surfaced by the rest timer, the backend client and shared state access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestClockError {
    /// A timer was started with a zero-second duration
    #[error("timer duration must be a positive number of seconds")]
    InvalidDuration,

    /// The backend could not be reached at all
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("no profile found for user {0}")]
    ProfileNotFound(String),

    /// An operation needed an authenticated session and none is set
    #[error("no active session")]
    NoSession,

    #[error("failed to lock {0}")]
    LockPoisoned(&'static str),
}

impl RestClockError {
    /// True when the error came from talking to the backend rather than from the caller
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Backend { .. } | Self::ProfileNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RestClockError>;
