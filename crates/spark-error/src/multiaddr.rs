// Multiaddr translation errors

use thiserror::Error;

use crate::SparkError;

/// Result type for multiaddr translation
pub type MultiaddrResult<T> = std::result::Result<T, MultiaddrError>;

/// Failures while turning a multiaddr into an HTTP(S) URL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultiaddrError {
    #[error("Unsupported multiaddr host type \"{host_type}\"")]
    UnsupportedHostType { host_type: String },

    #[error("Cannot parse \"{addr}\": unsupported protocol \"{protocol}\"")]
    UnsupportedProtocol { addr: String, protocol: String },

    #[error("Cannot parse \"{addr}\": unsupported scheme \"{scheme}\"")]
    UnsupportedScheme { addr: String, scheme: String },

    #[error("Cannot parse \"{addr}\": too many parts")]
    TooManyParts { addr: String },

    #[error("Cannot parse \"{addr}\": unsupported http path")]
    InvalidHttpPath { addr: String },
}

impl SparkError for MultiaddrError {
    fn error_code(&self) -> &'static str {
        match self {
            MultiaddrError::UnsupportedHostType { .. } => "UNSUPPORTED_MULTIADDR_HOST_TYPE",
            MultiaddrError::UnsupportedProtocol { .. } => "UNSUPPORTED_MULTIADDR_PROTO",
            MultiaddrError::UnsupportedScheme { .. } => "UNSUPPORTED_MULTIADDR_SCHEME",
            MultiaddrError::TooManyParts { .. } => "MULTIADDR_HAS_TOO_MANY_PARTS",
            MultiaddrError::InvalidHttpPath { .. } => "INVALID_HTTP_PATH",
        }
    }
}
