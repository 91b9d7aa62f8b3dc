//! One-time rehydration tokens.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind every token.
pub const TOKEN_BYTES: usize = 32;

/// Opaque credential linking a disconnected render to the connected pass
/// that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Generate a fresh token from 32 bytes of OS-seeded randomness,
    /// encoded as URL-safe base64 without padding.
    pub fn generate() -> Self {
        Self(random_urlsafe(TOKEN_BYTES))
    }

    /// Accept a token received over the transport. Blank values count as
    /// absent.
    pub fn from_param(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    /// The encoded token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters only, safe to put in logs.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Random URL-safe string over `len` bytes of entropy.
pub(crate) fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_length() {
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(Token::generate().as_str().len(), 43);
    }

    #[test]
    fn test_generate_unique() {
        let tokens: HashSet<Token> = (0..1000).map(|_| Token::generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_generate_urlsafe() {
        let token = Token::generate();
        assert!(
            token
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_from_param_blank() {
        assert_eq!(Token::from_param(""), None);
        assert_eq!(Token::from_param("   "), None);
        assert_eq!(Token::from_param(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_short() {
        let token = Token::from_param("abcdefghijkl").unwrap();
        assert_eq!(token.short(), "abcdefgh");
        let tiny = Token::from_param("abc").unwrap();
        assert_eq!(tiny.short(), "abc");
    }

    #[test]
    fn test_serde_transparent() {
        let token = Token::from_param("T1").unwrap();
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"T1\"");
    }
}
