//! Error types for connection configuration

use thiserror::Error;

/// Errors raised while turning a connection string into a cluster configuration.
///
/// Every variant is terminal for the current build attempt. Recoverable
/// fallbacks (unknown consistency levels, missing store material, unsupported
/// cipher names) are logged and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection string is missing the prefix or is structurally invalid
    #[error("malformed connection uri: {0}")]
    MalformedUri(String),

    /// A contact point could not be resolved to an address
    #[error("unknown host '{host}': {reason}")]
    UnknownHost {
        /// Host token as written in the connection string
        host: String,
        /// Resolver failure description
        reason: String,
    },

    /// TLS context could not be built from the configured material
    #[error("tls configuration error: {0}")]
    TlsConfig(String),
}

impl Error {
    /// Static label for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::MalformedUri(_) => "malformed_uri",
            Error::UnknownHost { .. } => "unknown_host",
            Error::TlsConfig(_) => "tls_config",
        }
    }

    pub(crate) fn tls(msg: impl Into<String>) -> Self {
        Error::TlsConfig(msg.into())
    }

    /// Prefix a TLS message with where it came from; other variants pass through
    pub(crate) fn in_tls_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Error::TlsConfig(msg) => Error::TlsConfig(format!("{}: {}", context, msg)),
            other => other,
        }
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::TlsConfig(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
