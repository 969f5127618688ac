//! Error types for bucket-core
//!
//! Provider failures are kept distinct from local filesystem failures so that
//! callers can tell "the store said no" apart from "the disk said no".

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for bucket-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bucket-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object key cannot be used for the requested operation
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to a specific local path
    #[error("Local IO error at {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication or authorization failure reported by the provider
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Any other error reported by the provider
    #[error("Provider error: {0}")]
    Provider(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Attach a local path to an IO error
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the provider reported the resource as absent
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether the error originated on the local filesystem
    pub const fn is_local(&self) -> bool {
        matches!(self, Error::Io(_) | Error::LocalIo { .. })
    }

    /// Whether a caller could reasonably retry the request.
    ///
    /// Informational only; nothing in this crate retries.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}
