//! The two-pass rehydration handshake.
//!
//! A request is rendered twice: once disconnected (plain HTTP render) and
//! once connected (live session). [`Rehydrator`] lets the connected pass
//! reuse what the disconnected pass computed:
//!
//! 1. The disconnected pass calls [`Rehydrator::begin_disconnected`], which
//!    issues a [`Token`] and binds it to the [`RequestContext`]. Every
//!    [`Rehydrator::fetch`] computes its value and stores it under that token.
//! 2. The host embeds the token in the rendered page and sends it back when
//!    connecting ([`ConnectParams`]).
//! 3. The connected pass calls [`Rehydrator::begin_connected`], which redeems
//!    the token exactly once. Fetches that match a redeemed entry skip their
//!    compute function; the rest recompute and store nothing.

use std::collections::HashMap;
use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::scope::ScopeKey;
use crate::session::SessionId;
use crate::store::RehydrationStore;
use crate::sweeper::{SweeperHandle, spawn_sweeper};
use crate::token::Token;

/// Connection parameter carrying the token from the rendered page.
pub const TOKEN_PARAM: &str = "_rehydra";

/// Parameters the client sent when opening the connected session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    params: HashMap<String, String>,
}

impl ConnectParams {
    /// Empty parameters, as sent by a fresh navigation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters carrying only a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        let mut params = Self::new();
        params.insert(TOKEN_PARAM, token);
        params
    }

    /// Set a parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Raw value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The token under [`TOKEN_PARAM`], if one was sent and is not blank.
    pub fn token(&self) -> Option<Token> {
        self.get(TOKEN_PARAM).and_then(Token::from_param)
    }
}

impl<K, V> FromIterator<(K, V)> for ConnectParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Which render pass the caller is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// First, stateless render. Values get cached.
    Disconnected,

    /// Follow-up live session. `None` means the host delivered no connection
    /// parameters at all.
    Connected(Option<ConnectParams>),
}

/// Where a request context is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Neither pass has started.
    Unbound,
    /// Disconnected pass running; fetches store their values.
    AwaitingRedemption,
    /// Connected pass (or caching bypassed); fetches read the rehydrated set.
    Redeemed,
}

#[derive(Debug)]
enum State<V> {
    Unbound,
    AwaitingRedemption { token: Token },
    Redeemed { rehydrated: HashMap<ScopeKey, V> },
}

/// Request-scoped handshake state, threaded through every fetch of one
/// render pass.
#[derive(Debug)]
pub struct RequestContext<V = serde_json::Value> {
    session: Option<SessionId>,
    bound_token: Option<Token>,
    state: State<V>,
}

impl<V> RequestContext<V> {
    /// A fresh, unbound context with no session.
    pub fn new() -> Self {
        Self {
            session: None,
            bound_token: None,
            state: State::Unbound,
        }
    }

    /// Scope every cache slot of this request to `session`.
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Bind a token carried in the request's own state, used by the
    /// connected pass when the connection parameters hold none.
    pub fn bind_token(&mut self, token: Token) {
        self.bound_token = Some(token);
    }

    /// The token bound to this request, if any.
    pub fn token(&self) -> Option<&Token> {
        self.bound_token.as_ref()
    }

    /// Session the request belongs to, if any.
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Where the request is in the handshake.
    pub fn state(&self) -> HandshakeState {
        match self.state {
            State::Unbound => HandshakeState::Unbound,
            State::AwaitingRedemption { .. } => HandshakeState::AwaitingRedemption,
            State::Redeemed { .. } => HandshakeState::Redeemed,
        }
    }

    /// Number of values rehydrated for this request.
    pub fn rehydrated_len(&self) -> usize {
        match &self.state {
            State::Redeemed { rehydrated } => rehydrated.len(),
            _ => 0,
        }
    }

    fn scope_key(&self, name: &str, scope: Option<&str>) -> ScopeKey {
        ScopeKey::derive(name, self.session.as_ref(), scope)
    }

    fn rehydrated(&self, key: &ScopeKey) -> Option<&V> {
        match &self.state {
            State::Redeemed { rehydrated } => rehydrated.get(key),
            _ => None,
        }
    }

    fn mark_redeemed(&mut self, rehydrated: HashMap<ScopeKey, V>) {
        self.state = State::Redeemed { rehydrated };
    }
}

impl<V> Default for RequestContext<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinates token issuance and redemption over a shared store and exposes
/// the fetch-or-compute primitive used by call sites.
pub struct Rehydrator<V = serde_json::Value> {
    store: RehydrationStore<V>,
    config: CacheConfig,
}

impl<V> Rehydrator<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a coordinator with its own store.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(RehydrationStore::new(), config)
    }

    /// Create a coordinator over an existing (shared) store.
    pub fn with_store(store: RehydrationStore<V>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// The shared store.
    pub fn store(&self) -> &RehydrationStore<V> {
        &self.store
    }

    /// Active cache settings.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Start the background sweep of this coordinator's store.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use = "dropping the handle stops the sweeper"]
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        spawn_sweeper(self.store.clone(), self.config.sweep_every)
    }

    /// Enter the given pass. Returns the token involved, if any.
    pub fn enter(&self, ctx: &mut RequestContext<V>, phase: Phase) -> Result<Option<Token>> {
        match phase {
            Phase::Disconnected => Ok(self.begin_disconnected(ctx)),
            Phase::Connected(params) => {
                self.begin_connected(ctx, params.as_ref())?;
                Ok(ctx.token().cloned())
            }
        }
    }

    /// Start the disconnected pass: issue a token and bind it to `ctx`.
    ///
    /// Returns the token for the host to embed in its output, or `None` when
    /// caching is disabled. Calling this again on the same context returns
    /// the token already issued.
    pub fn begin_disconnected(&self, ctx: &mut RequestContext<V>) -> Option<Token> {
        match &ctx.state {
            State::Unbound => {}
            State::AwaitingRedemption { token } => return Some(token.clone()),
            State::Redeemed { .. } => {
                debug!("Context already redeemed, not issuing a token");
                return None;
            }
        }

        if !self.config.is_enabled() {
            ctx.mark_redeemed(HashMap::new());
            return None;
        }

        let token = Token::generate();
        trace!(token = %token.short(), "Issued rehydration token");
        ctx.bind_token(token.clone());
        ctx.state = State::AwaitingRedemption {
            token: token.clone(),
        };
        Some(token)
    }

    /// Start the connected pass: resolve the token and redeem it.
    ///
    /// The token comes from `params` first, then from the token bound to
    /// `ctx`. When `params` were delivered but carry no token (a fresh
    /// navigation rather than a continuation) nothing is rehydrated.
    ///
    /// Fails with [`Error::MissingToken`] when caching is enabled but the
    /// host delivered no parameters and nothing is bound, which means the
    /// token transport is not wired. The context is still usable afterwards:
    /// it is left redeemed with nothing rehydrated, so a caller that
    /// tolerates the error simply recomputes everything.
    pub fn begin_connected(
        &self,
        ctx: &mut RequestContext<V>,
        params: Option<&ConnectParams>,
    ) -> Result<()> {
        if let State::Redeemed { .. } = ctx.state {
            return Ok(());
        }

        if !self.config.is_enabled() {
            ctx.mark_redeemed(HashMap::new());
            return Ok(());
        }

        let token = params
            .and_then(ConnectParams::token)
            .or_else(|| ctx.bound_token.clone());

        let Some(token) = token else {
            ctx.mark_redeemed(HashMap::new());
            if params.is_some() {
                debug!("No token in connect params, recomputing");
                return Ok(());
            }
            warn!("Connected pass has no token source");
            return Err(Error::MissingToken);
        };

        let rehydrated = self.store.redeem(&token);
        debug!(
            token = %token.short(),
            entries = rehydrated.len(),
            "Connected pass rehydrated"
        );
        ctx.bind_token(token);
        ctx.mark_redeemed(rehydrated);
        Ok(())
    }

    /// Return the rehydrated value for `(name, scope)` or compute it.
    ///
    /// During the disconnected pass the computed value is also cached under
    /// the request's token. The connected pass never writes to the store.
    pub async fn fetch<F, Fut>(
        &self,
        ctx: &RequestContext<V>,
        name: &str,
        scope: Option<&str>,
        compute: F,
    ) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.fetch_or(ctx, name, scope, || None, compute).await
    }

    /// Like [`fetch`](Self::fetch), but on a miss first asks `existing` for a
    /// value already available to the caller and only computes if it has
    /// none.
    pub async fn fetch_or<X, F, Fut>(
        &self,
        ctx: &RequestContext<V>,
        name: &str,
        scope: Option<&str>,
        existing: X,
        compute: F,
    ) -> V
    where
        X: FnOnce() -> Option<V>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let key = ctx.scope_key(name, scope);
        if let Some(value) = ctx.rehydrated(&key) {
            trace!(key = %key, "Rehydrated");
            return value.clone();
        }

        let value = match existing() {
            Some(value) => value,
            None => compute().await,
        };
        self.remember(ctx, key, &value);
        value
    }

    /// Fallible [`fetch`](Self::fetch). A failed compute is returned as is
    /// and nothing is cached.
    pub async fn try_fetch<F, Fut, E>(
        &self,
        ctx: &RequestContext<V>,
        name: &str,
        scope: Option<&str>,
        compute: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        let key = ctx.scope_key(name, scope);
        if let Some(value) = ctx.rehydrated(&key) {
            trace!(key = %key, "Rehydrated");
            return Ok(value.clone());
        }

        let value = compute().await?;
        self.remember(ctx, key, &value);
        Ok(value)
    }

    fn remember(&self, ctx: &RequestContext<V>, key: ScopeKey, value: &V) {
        if let State::AwaitingRedemption { token } = &ctx.state {
            self.store
                .insert(token, key, value.clone(), self.config.ttl);
        }
    }
}

impl Rehydrator<serde_json::Value> {
    /// [`fetch`](Self::fetch) for any serde type over a JSON-valued store.
    ///
    /// A rehydrated value that no longer deserializes into `T` counts as a
    /// miss. A value that fails to serialize is returned uncached.
    pub async fn fetch_typed<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        name: &str,
        scope: Option<&str>,
        compute: F,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = ctx.scope_key(name, scope);
        if let Some(raw) = ctx.rehydrated(&key) {
            match serde_json::from_value(raw.clone()) {
                Ok(value) => {
                    trace!(key = %key, "Rehydrated");
                    return value;
                }
                Err(e) => warn!(key = %key, error = %e, "Rehydrated value has wrong shape, recomputing"),
            }
        }

        let value = compute().await;
        if let State::AwaitingRedemption { .. } = ctx.state {
            match serde_json::to_value(&value) {
                Ok(raw) => self.remember(ctx, key, &raw),
                Err(e) => warn!(key = %key, error = %e, "Value not serializable, not caching"),
            }
        }
        value
    }
}

impl<V> Clone for Rehydrator<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}
