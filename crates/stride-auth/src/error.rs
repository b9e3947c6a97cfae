//! Authentication error types.
//!
//! Raw transport failures and HTTP statuses are classified here, where they
//! are first observed, so callers match on variants instead of probing
//! status codes.

use crate::transport::TransportError;
use thiserror::Error;

const MAX_MESSAGE_LEN: usize = 200;

/// Authentication error type. `Clone` so one outcome can be handed to every
/// caller waiting on the same flight.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No connectivity; the request was not sent or could not complete
    #[error("Network unavailable")]
    Offline,

    /// The HTTP request exceeded its timeout
    #[error("Request timed out")]
    Timeout,

    /// The refresh endpoint rejected the refresh token (401/403)
    #[error("Session expired (refresh rejected with {status})")]
    AuthExpired { status: u16 },

    /// 401 on a regular request that refresh-and-retry could not recover
    #[error("Unauthorized")]
    Unauthorized,

    /// 5xx from the server
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Connection-level failure (reset, DNS, refused)
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No session exists
    #[error("Not logged in")]
    NotLoggedIn,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl AuthError {
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => AuthError::Timeout,
            TransportError::Connect(message) => AuthError::Network(message),
            TransportError::Other(message) => AuthError::Unknown(message),
        }
    }

    /// Classify a non-success status. Bodies are truncated; they may be
    /// HTML error pages.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = summarize(body);
        match status {
            401 => AuthError::Unauthorized,
            500..=599 => AuthError::Server { status, message },
            _ => AuthError::Http { status, message },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::AuthExpired { status }
            | AuthError::Server { status, .. }
            | AuthError::Http { status, .. } => Some(*status),
            AuthError::Unauthorized => Some(401),
            _ => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, AuthError::Offline)
    }

    /// Returns true if retrying the same operation may succeed.
    ///
    /// Transient errors include:
    /// - timeouts
    /// - connection failures
    /// - 5xx responses
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::Timeout | AuthError::Network(_) | AuthError::Server { .. }
        )
    }

    /// Returns true for credential failures that no retry can fix.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthError::AuthExpired { .. } | AuthError::Unauthorized | AuthError::NotLoggedIn
        )
    }
}

fn summarize(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_MESSAGE_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_MESSAGE_LEN).collect();
    format!("{}...", cut)
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
