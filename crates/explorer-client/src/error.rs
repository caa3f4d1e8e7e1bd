//! Transport-level errors
//!
//! These never reach the UI directly: the explorer converts each one into
//! the nearest class of its own error taxonomy at the call site.

/// Errors raised by an [`ExplorerBackend`](crate::ExplorerBackend)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Request never produced a response (connect, DNS, reset, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Precondition failed: the stored version differs from the sent one
    #[error("version conflict{}", suffix(.message))]
    Conflict {
        /// Server message, if any
        message: Option<String>,
    },

    /// Non-success status other than a conflict
    #[error("server returned {status}{}", suffix(.message))]
    Status {
        /// HTTP status code
        status: u16,
        /// Server message, if any
        message: Option<String>,
    },

    /// Response body did not match the expected document
    #[error("malformed response: {0}")]
    Decode(String),

    /// Backend could not be constructed
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

fn suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl BackendError {
    /// Create a status error
    #[inline]
    pub fn status(status: u16, message: Option<String>) -> Self {
        Self::Status { status, message }
    }

    /// HTTP status behind the failure, if one was received
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Conflict { .. } => Some(409),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Version mismatch on a guarded write
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Resource does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Message supplied by the server, if the failure carried one
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Conflict { message } | Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::status(status.as_u16(), None)
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
