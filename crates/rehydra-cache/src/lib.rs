//! One-time rehydration cache for two-pass rendering.
//!
//! Values computed during a disconnected render are parked in a short-lived,
//! token-scoped store so the connected pass that follows can reuse them
//! instead of recomputing. This crate provides:
//! - An expiring store with one-shot, all-or-nothing redemption per token
//! - A handshake coordinator issuing tokens and exposing fetch-or-compute
//! - A background sweeper for tokens that are never redeemed
//! - Session scoping so tokens cannot be replayed across users
//!
//! # Example
//!
//! ```rust,ignore
//! use rehydra_cache::{CacheConfig, ConnectParams, Rehydrator, RequestContext};
//!
//! let rehydrator = Rehydrator::new(CacheConfig::default());
//! let _sweeper = rehydrator.spawn_sweeper();
//!
//! // Disconnected render
//! let mut ctx = RequestContext::new();
//! let token = rehydrator.begin_disconnected(&mut ctx).expect("caching enabled");
//! let users = rehydrator.fetch(&ctx, "users", None, || load_users()).await;
//!
//! // Connected pass, token sent back by the client
//! let mut ctx = RequestContext::new();
//! rehydrator.begin_connected(&mut ctx, Some(&ConnectParams::with_token(token.as_str())))?;
//! let users = rehydrator.fetch(&ctx, "users", None, || load_users()).await; // no reload
//! ```

mod config;
mod error;
mod handshake;
mod scope;
mod session;
mod store;
mod sweeper;
mod token;

pub use config::{CacheConfig, DEFAULT_SWEEP_EVERY, DEFAULT_TTL};
pub use error::{Error, Result};
pub use handshake::{
    ConnectParams, HandshakeState, Phase, Rehydrator, RequestContext, TOKEN_PARAM,
};
pub use scope::ScopeKey;
pub use session::{MemorySession, SESSION_KEY, SessionId, SessionStore, ensure_session_id};
pub use store::{CacheEntry, RehydrationStore, StoreStats};
pub use sweeper::{Sweep, SweeperHandle, spawn_sweeper};
pub use token::{TOKEN_BYTES, Token};
