//! Scope keys: the identity of one cached value within a token.

use std::fmt;

use crate::session::SessionId;

/// Composite identity of a cached value: which call site produced it, for
/// which session, and under which caller-supplied scope.
///
/// Two entries with equal keys under the same token occupy the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    /// Logical name of the call site (e.g. the assign being computed).
    pub name: String,

    /// Session the value belongs to, if the request is session-scoped.
    pub session: Option<SessionId>,

    /// Disambiguates several values under one name (e.g. a query parameter).
    pub scope: Option<String>,
}

impl ScopeKey {
    /// Key for a name with no session and no scope.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session: None,
            scope: None,
        }
    }

    /// Derive the key a fetch call uses.
    pub fn derive(name: &str, session: Option<&SessionId>, scope: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            session: session.cloned(),
            scope: scope.map(str::to_string),
        }
    }

    /// Attach a caller scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attach a session.
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(scope) = &self.scope {
            write!(f, "[{scope}]")?;
        }
        Ok(())
    }
}
