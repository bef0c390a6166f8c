//! Error types used throughout the client

use std::sync::Arc;

use thiserror::Error;

/// Broad grouping of [`RestError`] variants
///
/// Lets callers tell "never configured", "handshake failed" and "this call
/// failed with a status" apart without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestErrorCategory {
    /// Client was used before it was fully set up (user error)
    Configuration,
    /// The authentication handshake failed; replayed to every caller
    Authentication,
    /// The remote service answered a data call with a non-success status
    Http,
    /// The request never produced a response
    Transport,
    /// A body could not be encoded or decoded
    Payload,
}

/// Main error type for the REST client
#[derive(Error, Debug, Clone)]
pub enum RestError {
    #[error("Connection not configured: call one of the `as_*` connection methods first")]
    ConnectionNotConfigured,

    #[error("Certificates not loaded: direct connections require a client certificate set")]
    CertificatesNotLoaded,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The authentication procedure failed. The cause is cached by the
    /// coordinator and every later caller receives the same `Arc`.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[source] Arc<RestError>),

    #[error("HTTP {status} ({reason}){}", format_body(.body))]
    HttpFailure { status: u16, reason: String, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

impl RestError {
    /// Get the category for this error
    #[must_use]
    pub const fn category(&self) -> RestErrorCategory {
        match self {
            Self::ConnectionNotConfigured
            | Self::CertificatesNotLoaded
            | Self::InvalidArgument(_)
            | Self::Config(_) => RestErrorCategory::Configuration,
            Self::AuthenticationFailed(_) => RestErrorCategory::Authentication,
            Self::HttpFailure { .. } => RestErrorCategory::Http,
            Self::Network(_) | Self::Protocol(_) => RestErrorCategory::Transport,
            Self::Serialization(_) | Self::Deserialization(_) => RestErrorCategory::Payload,
        }
    }

    /// Status code carried by an [`RestError::HttpFailure`]
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpFailure { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The cached handshake failure, if this is an authentication error
    #[must_use]
    pub fn authentication_cause(&self) -> Option<&Arc<Self>> {
        match self {
            Self::AuthenticationFailed(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, RestError>;
