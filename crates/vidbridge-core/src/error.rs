//! Error types for vidbridge

use crate::types::ActionId;
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Source selection errors
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    #[error("Unknown video source: {0}")]
    UnknownVideoSource(String),

    #[error("No video source has been supplied")]
    NoVideoSource,

    // Backend protocol errors
    #[error("Unknown state code {code} reported by the backend")]
    UnknownState { code: i32 },

    #[error("Playback rate {rate} is not on the list of allowed playback rates {allowed:?}")]
    BadPlaybackRate { rate: f64, allowed: Vec<f64> },

    #[error("Backend error {code}: {message}")]
    Backend { code: i32, message: String },

    #[error("No video is loaded")]
    NotLoaded,

    // Handler registry errors
    #[error("State change handler {key} is reserved by action {owner}, requested by {requested_by}")]
    StateChangeHandlerReserved {
        key: String,
        owner: ActionId,
        requested_by: ActionId,
    },

    #[error("State change handler {key} was superseded by a newer registration")]
    HandlerSuperseded { key: String },

    // Queue errors
    #[error("Action {action} ({id}) timed out after {timeout_ms}ms")]
    PromiseTimeout {
        action: String,
        id: ActionId,
        timeout_ms: u64,
    },

    #[error("Player has been destroyed")]
    Destroyed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a bad parameter error
    pub fn bad_parameter(msg: impl Into<String>) -> Self {
        Error::BadParameter(msg.into())
    }

    /// Returns true if the player can keep serving actions after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::BadParameter(_)
                | Error::UnknownVideoSource(_)
                | Error::BadPlaybackRate { .. }
                | Error::PromiseTimeout { .. }
                | Error::HandlerSuperseded { .. }
                | Error::StateChangeHandlerReserved { .. }
        )
    }

    /// Returns the error code for logs and CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::BadParameter(_) => "BAD_PARAMETER",
            Error::UnknownVideoSource(_) => "UNKNOWN_VIDEO_SOURCE",
            Error::NoVideoSource => "NO_VIDEO_SOURCE",
            Error::UnknownState { .. } => "UNKNOWN_STATE",
            Error::BadPlaybackRate { .. } => "BAD_PLAYBACK_RATE",
            Error::Backend { .. } => "BACKEND",
            Error::NotLoaded => "NOT_LOADED",
            Error::StateChangeHandlerReserved { .. } => "HANDLER_RESERVED",
            Error::HandlerSuperseded { .. } => "HANDLER_SUPERSEDED",
            Error::PromiseTimeout { .. } => "PROMISE_TIMEOUT",
            Error::Destroyed => "DESTROYED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL",
        }
    }
}
