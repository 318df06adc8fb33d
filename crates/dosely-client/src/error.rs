//! # Client Error Types
//!
//! Error types for everything dosely-client does.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Client Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Server Answers      │ │
//! │  │                 │  │   (a)           │  │                         │ │
//! │  │  InvalidConfig  │  │  Transport      │  │  AuthInvalid   (b) 401  │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Rejected      (c) 4xx  │ │
//! │  │  ConfigLoad/Save│  │  Decode         │  │  Server        (d) 5xx  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Session      │  │      List       │  │       Domain            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Storage        │  │  TornDown       │  │  Validation             │ │
//! │  │  NotAuthenticated│ │  StockNotLoaded │  │  Core                   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reporting Policy
//! `AuthInvalid` is already handled centrally by the adapter (token cleared,
//! subscribers told to route to login) and must never be shown as a form
//! error. Everything else is reported at the call site. Nothing is retried
//! automatically.

use dosely_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error type covering all possible failures.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API base URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request never got an HTTP answer (DNS, refused connection, reset).
    #[error("Network error: {0}")]
    Transport(String),

    /// Request exceeded the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Answer arrived but the body was not what the endpoint promises.
    #[error("Unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    // =========================================================================
    // Server Answers
    // =========================================================================
    /// The server rejected the session token (HTTP 401).
    #[error("Session expired, please log in again")]
    AuthInvalid,

    /// The server rejected the request (HTTP 4xx other than 401).
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server failed (HTTP 5xx).
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Token storage could not be read or written.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// An operation that needs a session ran without one.
    #[error("Not logged in")]
    NotAuthenticated,

    // =========================================================================
    // List Errors
    // =========================================================================
    /// The list view was torn down; the operation was not applied.
    #[error("Stock list is no longer active")]
    TornDown,

    /// The stock is not in the locally held collection.
    #[error("Stock {0} is not loaded")]
    StockNotLoaded(i64),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Form input failed validation before anything was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Domain rule or payload shape violated.
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::Decode {
                endpoint: err.url().map(|u| u.path().to_string()).unwrap_or_default(),
                reason: err.to_string(),
            }
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode {
            endpoint: String::new(),
            reason: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

/// Coarse failure kind, used by the shell to pick how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// (a) network or transport failure.
    Network,
    /// (b) authentication invalid; handled centrally.
    AuthInvalid,
    /// (c) validation rejection, local or server-side.
    Validation,
    /// (d) server fault.
    Server,
    /// Configuration, storage, or lifecycle problems.
    Local,
}

impl ClientError {
    /// Maps the error onto the four-way failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) | ClientError::Timeout(_) => ErrorKind::Network,
            ClientError::AuthInvalid | ClientError::NotAuthenticated => ErrorKind::AuthInvalid,
            ClientError::Rejected { .. } | ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Server { .. } | ClientError::Decode { .. } => ErrorKind::Server,
            _ => ErrorKind::Local,
        }
    }

    /// Returns true if the session is gone and the user must log in again.
    pub fn is_auth_invalid(&self) -> bool {
        self.kind() == ErrorKind::AuthInvalid
    }

    /// Returns true if re-triggering the same action by hand may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Timeout(_) | ClientError::Server { .. }
        )
    }

    /// Returns true if the error should be shown at the call site.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ClientError::AuthInvalid | ClientError::TornDown)
    }

    /// Returns true for 404 answers.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Rejected { status: 404, .. })
    }

    /// Builds the error for a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ClientError::AuthInvalid,
            500..=599 => ClientError::Server { status, message },
            _ => ClientError::Rejected { status, message },
        }
    }
}
