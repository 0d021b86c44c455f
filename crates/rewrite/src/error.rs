//! Rewrite Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A rewrite error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for rewrite operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a rewrite failure.
///
/// ### Fatal
/// - [`ErrorKind::Config`]: fix the run options and start again.
/// - [`ErrorKind::MalformedToken`]: the host's parser produced something unusable.
/// - [`ErrorKind::Cycle`]: documents reference each other in a loop.
///
/// ### Dependency Errors
/// - [`ErrorKind::Resolution`]: a reference could not be turned into a URL.
/// - [`ErrorKind::Adapter`]
/// - [`ErrorKind::Host`]
/// - [`ErrorKind::Cache`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration: {_0}")]
    Config(#[error(not(source))] String),
    #[display("malformed token {token} in {path}")]
    MalformedToken { path: String, token: String },
    #[display("failed to resolve reference: {_0}")]
    Resolution(#[error(not(source))] String),
    /// The resolution adapter failed for the given path.
    #[display("resolution adapter failed for {_0}")]
    Adapter(#[error(not(source))] String),
    /// A host pipeline operation (load, parse, serialize, add file) failed.
    #[display("host operation failed: {_0}")]
    Host(#[error(not(source))] String),
    #[display("reference cache failure")]
    Cache,
    #[display("circular reference to {_0}")]
    Cycle(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Adapter(_) | Self::Host(_) | Self::Cache)
    }
}
