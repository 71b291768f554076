//! Error types and handling for oembed-core operations.
//!
//! This module provides one error type covering every failure the discovery
//! and fetch pipeline can surface. Errors are categorized for easier handling
//! and carry a recoverability hint for callers that implement their own retry
//! logic (the library itself never retries outside the redirect loop).
//!
//! ## Error Categories
//!
//! - **Network Errors**: transport and connection failures
//! - **Redirect Errors**: redirect chains longer than the allowed limit
//! - **Lookup Errors**: no oembed links found, non-200 or 304 oembed responses
//! - **Input Errors**: malformed addresses or `format` patterns
//! - **Configuration Errors**: invalid settings or provider files
//!
//! Markup trouble in discovered pages is absent from this list:
//! the head-link extractor degrades to a partial link list instead of failing.
//!
//! ```rust
//! use oembed_core::Error;
//!
//! fn describe(err: &Error) -> String {
//!     match err {
//!         Error::NotModified(_) => "use your cached copy".to_string(),
//!         e if e.is_recoverable() => format!("temporary failure: {e}"),
//!         e => format!("{} failure: {e}", e.category()),
//!     }
//! }
//! # let _ = describe(&Error::NotFound("x".into()));
//! ```

use thiserror::Error;

/// The main error type for oembed-core operations.
///
/// All public operations return `Result<T, Error>`. The source chain is kept
/// for wrapped transport and I/O errors so callers can inspect the root cause.
#[derive(Error, Debug)]
pub enum Error {
    /// The reqwest transport failed to connect, send, or read.
    ///
    /// ## Recoverability
    ///
    /// Connection and timeout errors are typically recoverable, while
    /// malformed request errors are permanent.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A non-reqwest transport failed, or a body stream broke mid-read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A 301/302 chain was longer than the allowed number of redirects.
    ///
    /// `url` is the address that answered with the redirect that could no
    /// longer be followed.
    #[error("Too many redirects (limit {limit}) at '{url}'")]
    MaxRedirectsExceeded {
        /// Address that returned the redirect that exceeded the limit.
        url: String,
        /// The redirect limit that was in force.
        limit: u32,
    },

    /// No oembed resource is available.
    ///
    /// ## Common Causes
    ///
    /// - The page advertises no oembed links
    /// - The oembed endpoint answered with a status other than 200 or 304
    #[error("Not found: {0}")]
    NotFound(String),

    /// The oembed endpoint answered 304 to a conditional request.
    ///
    /// Surfaced distinctly so callers forwarding `If-None-Match` or
    /// `If-Modified-Since` can keep serving their own cached copy.
    #[error("Not modified: {0}")]
    NotModified(String),

    /// The page fetched for discovery answered with a non-200 status.
    #[error("Unexpected HTTP status {status} from '{url}'")]
    UnexpectedStatus {
        /// Address that produced the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// An address is malformed or uses an unsupported scheme.
    ///
    /// ## Common Causes
    ///
    /// - Relative or unparsable page address
    /// - Scheme other than `http` or `https`
    /// - A redirect without a usable `Location` header
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The `format` option is not a valid pattern.
    #[error("Invalid format pattern: {0}")]
    InvalidFormat(String),

    /// Configuration or provider data is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for transient transport failures (timeouts, refused
    /// connections, interrupted I/O). Everything else, including 304/404
    /// outcomes and redirect-limit failures, is permanent for the request
    /// that produced it.
    ///
    /// ```rust
    /// use oembed_core::Error;
    ///
    /// assert!(Error::Transport("connection reset".into()).is_recoverable());
    /// assert!(!Error::NotFound("no links".into()).is_recoverable());
    /// assert!(!Error::MaxRedirectsExceeded { url: "http://a/".into(), limit: 3 }.is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Transport(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Useful as a structured logging field:
    ///
    /// ```rust
    /// use oembed_core::Error;
    ///
    /// let err = Error::NotModified("http://example.com/oembed".into());
    /// tracing::warn!(category = err.category(), error = %err, "oembed fetch failed");
    /// assert_eq!(err.category(), "not_modified");
    /// ```
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::Transport(_) => "network",
            Self::MaxRedirectsExceeded { .. } => "max_redirects",
            Self::NotFound(_) => "not_found",
            Self::NotModified(_) => "not_modified",
            Self::UnexpectedStatus { .. } => "status",
            Self::InvalidUrl(_) => "invalid_url",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display_formatting() {
        let err = Error::MaxRedirectsExceeded {
            url: "http://example.com/a".to_string(),
            limit: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("limit 3"));
        assert!(msg.contains("http://example.com/a"));

        let err = Error::UnexpectedStatus {
            url: "http://example.com/".to_string(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));

        assert!(Error::NotModified("x".into()).to_string().starts_with("Not modified"));
        assert!(Error::NotFound("x".into()).to_string().starts_with("Not found"));
    }

    #[test]
    fn test_categories_are_distinct_for_lookup_outcomes() {
        assert_eq!(Error::NotFound(String::new()).category(), "not_found");
        assert_eq!(Error::NotModified(String::new()).category(), "not_modified");
        assert_eq!(Error::Transport(String::new()).category(), "network");
        assert_eq!(Error::InvalidFormat(String::new()).category(), "invalid_format");
    }

    #[test]
    fn test_io_recoverability() {
        assert!(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "t")).is_recoverable());
        assert!(!Error::Io(io::Error::new(io::ErrorKind::NotFound, "n")).is_recoverable());
        assert!(!Error::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_conversions() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));

        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
