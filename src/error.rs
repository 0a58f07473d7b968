// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for sessionjar
//!
//! Three families matter to callers: malformed input shapes (`Type`),
//! merge bookkeeping (`KeyNotFound`), and transport failures raised by the
//! send step (`Http`, `Transport`, `Timeout`, `Ssl`). Only the transport
//! family is eligible for safe-mode suppression.

use thiserror::Error;

/// Result type alias for sessionjar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sessionjar
#[derive(Error, Debug)]
pub enum Error {
    /// Input did not have one of the accepted key/value shapes
    #[error("Type error: {0}")]
    Type(String),

    /// Merge tried to delete a key the base mapping never had
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// HTTP request failed inside reqwest
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure not originating in reqwest
    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Method is not a valid HTTP token
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        url: Option<String>,
    },

    /// SSL/TLS error
    #[error("SSL/TLS error for {url}: {reason}")]
    Ssl { url: String, reason: String },

    /// Cookie handling error
    #[error("Cookie error: {0}")]
    Cookie(String),

    /// Hook dispatch error
    #[error("Hook '{event}' failed: {reason}")]
    Hook { event: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new type error
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        Error::Type(msg.into())
    }

    /// Create a key-not-found error
    pub fn key_not_found<S: Into<String>>(key: S) -> Self {
        Error::KeyNotFound(key.into())
    }

    /// Create a transport error
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: None,
        }
    }

    /// Create a timeout error with URL
    pub fn timeout_with_url(
        operation: impl Into<String>,
        duration_ms: u64,
        url: impl Into<String>,
    ) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: Some(url.into()),
        }
    }

    /// Create a hook error
    pub fn hook(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Hook {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error was raised by the transport layer.
    ///
    /// These are the errors safe mode turns into degraded responses.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Http(e) => !e.is_builder(),
            Error::Transport { .. } | Error::Timeout { .. } | Error::Ssl { .. } => true,
            _ => false,
        }
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Transport { url, .. } => Some(url),
            Error::Timeout { url: Some(u), .. } => Some(u),
            Error::Ssl { url, .. } => Some(url),
            Error::Http(e) => e.url().map(|u| u.as_str()),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add URL context to error
    fn with_url(self, url: &str) -> Result<T>;

    /// Add operation context to error
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn with_url(self, url: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            Error::Timeout {
                operation,
                duration_ms,
                ..
            } => Error::Timeout {
                operation,
                duration_ms,
                url: Some(url.to_string()),
            },
            other => other,
        })
    }

    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            Error::Other(format!("{}: {}", msg, err))
        })
    }
}
