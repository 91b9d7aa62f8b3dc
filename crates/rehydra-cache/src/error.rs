//! Error types for the rehydration handshake.

/// Error type for handshake operations.
///
/// Store operations never fail; only token resolution on the connected pass
/// and session identifier parsing can.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connected pass started with caching enabled but no token could be
    /// resolved from either the connection parameters or the request context.
    ///
    /// This means the token transport between the two passes is not wired up.
    #[error("No rehydration token available for the connected pass; is the token transport configured?")]
    MissingToken,

    /// A session identifier was empty or contained characters outside the
    /// URL-safe alphabet.
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),
}

/// Result type for handshake operations.
pub type Result<T> = std::result::Result<T, Error>;
