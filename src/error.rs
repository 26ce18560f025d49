//! Error types for ReplayFetch.
//!
//! Every failure the executor can observe is a [`FetchError`]. The executor
//! never returns one directly to callers; it folds it into a
//! [`Failure`](crate::executor::Failure) with a human-readable message.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Message reported for a 404 response.
pub const NOT_FOUND_MESSAGE: &str = "Page not found";
/// Message reported for any other non-success status.
pub const NETWORK_ERROR_MESSAGE: &str = "Network response was not OK";
/// Message reported when a call was cancelled (timeout or manual).
pub const ABORT_MESSAGE: &str = "Request timeout passed so aborted";
/// Fallback when an error carries no usable message.
pub const FALLBACK_MESSAGE: &str = "Something went wrong";

/// Errors produced while preparing, sending or decoding a request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered 404.
    #[error("Page not found")]
    NotFound,

    /// The server answered with a non-success status other than 404.
    #[error("Network response was not OK (status {status})")]
    Network { status: u16 },

    /// The call's cancellation signal fired before the transport resolved.
    #[error("Request aborted: {reason}")]
    Aborted { reason: String },

    /// The transport failed before producing a response.
    #[error("{0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response body: {0}")]
    Decode(String),

    /// Invalid configuration or payload.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    NetworkError,
    AbortError,
    UnknownError,
}

impl FetchError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound => FailureKind::NotFound,
            Self::Network { .. } => FailureKind::NetworkError,
            Self::Aborted { .. } => FailureKind::AbortError,
            _ => FailureKind::UnknownError,
        }
    }

    /// The message surfaced on a `Failure` result.
    pub fn user_message(&self) -> String {
        match self.kind() {
            FailureKind::NotFound => NOT_FOUND_MESSAGE.to_string(),
            FailureKind::NetworkError => NETWORK_ERROR_MESSAGE.to_string(),
            FailureKind::AbortError => ABORT_MESSAGE.to_string(),
            FailureKind::UnknownError => {
                let msg = self.to_string();
                if msg.trim().is_empty() {
                    FALLBACK_MESSAGE.to_string()
                } else {
                    msg
                }
            }
        }
    }

    /// Build the error for a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        if status == 404 {
            Self::NotFound
        } else {
            Self::Network { status }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(format!("HTTP request failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(FetchError::from_status(404).kind(), FailureKind::NotFound);
        assert_eq!(
            FetchError::from_status(500).kind(),
            FailureKind::NetworkError
        );
        assert_eq!(
            FetchError::from_status(401).kind(),
            FailureKind::NetworkError
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(FetchError::NotFound.user_message(), "Page not found");
        assert_eq!(
            FetchError::Network { status: 500 }.user_message(),
            "Network response was not OK"
        );
        assert_eq!(
            FetchError::Aborted {
                reason: "manual".into()
            }
            .user_message(),
            "Request timeout passed so aborted"
        );
    }

    #[test]
    fn test_unknown_error_uses_own_message() {
        let err = FetchError::Transport("connection refused".into());
        assert_eq!(err.kind(), FailureKind::UnknownError);
        assert_eq!(err.user_message(), "connection refused");
    }

    #[test]
    fn test_unknown_error_empty_message_falls_back() {
        let err = FetchError::Transport("  ".into());
        assert_eq!(err.user_message(), FALLBACK_MESSAGE);
    }
}
