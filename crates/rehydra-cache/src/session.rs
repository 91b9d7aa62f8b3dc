//! Session scoping for cached values.
//!
//! Cached entries can be bound to a user session so a token leaked to another
//! session rehydrates nothing. The host's session layer decides where the
//! identifier lives; it plugs in through [`SessionStore`], and
//! [`ensure_session_id`] makes sure one exists before the disconnected pass
//! runs.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::token::{TOKEN_BYTES, random_urlsafe};

/// Key under which the session identifier is kept in the host session.
pub const SESSION_KEY: &str = "rehydra_session_id";

/// Stable identifier of a user session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh, token-shaped identifier.
    pub fn generate() -> Self {
        Self(random_urlsafe(TOKEN_BYTES))
    }

    /// Validate an identifier read back from the session layer.
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::InvalidSessionId(raw.to_string()))
        }
    }

    /// The identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access to the host's per-user session storage.
///
/// Implement this for whatever the surrounding framework uses (cookie
/// session, server-side session table, ...).
pub trait SessionStore {
    /// Read a value from the session.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value to the session.
    fn put(&mut self, key: &str, value: String);
}

/// Plain in-memory session, mostly useful for tests and the CLI.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    values: HashMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

/// Return the session's identifier, creating one if it has none.
///
/// A malformed stored value is replaced rather than trusted.
pub fn ensure_session_id<S: SessionStore + ?Sized>(session: &mut S) -> SessionId {
    if let Some(raw) = session.get(SESSION_KEY) {
        match SessionId::parse(&raw) {
            Ok(id) => return id,
            Err(e) => warn!(error = %e, "Replacing malformed session id"),
        }
    }

    let id = SessionId::generate();
    session.put(SESSION_KEY, id.as_str().to_string());
    debug!("Assigned new session id");
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_generates_once() {
        let mut session = MemorySession::new();
        let first = ensure_session_id(&mut session);
        let second = ensure_session_id(&mut session);
        assert_eq!(first, second);
        assert_eq!(session.get(SESSION_KEY), Some(first.as_str().to_string()));
    }

    #[test]
    fn test_ensure_keeps_existing() {
        let mut session = MemorySession::new();
        session.put(SESSION_KEY, "existing-id".to_string());
        assert_eq!(ensure_session_id(&mut session).as_str(), "existing-id");
    }

    #[test]
    fn test_ensure_replaces_malformed() {
        let mut session = MemorySession::new();
        session.put(SESSION_KEY, "not valid!".to_string());
        let id = ensure_session_id(&mut session);
        assert_ne!(id.as_str(), "not valid!");
        assert_eq!(id.as_str().len(), 43);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            SessionId::parse(""),
            Err(Error::InvalidSessionId(_))
        ));
    }
}
