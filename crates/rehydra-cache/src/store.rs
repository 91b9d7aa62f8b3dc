//! Expiring token-scoped store with one-shot redemption.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::scope::ScopeKey;
use crate::token::Token;

/// Entry stored under a token.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Slot this value fills.
    pub key: ScopeKey,

    /// Cached value.
    pub value: V,

    /// Instant after which the entry is dead, swept or not.
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Whether the entry is dead at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Process-wide store of values computed during a disconnected render,
/// waiting to be redeemed by the connected pass.
///
/// Entries are grouped in per-token buckets held in a sharded map, so work
/// on unrelated tokens rarely contends. Buckets are append-only; the only
/// removals are whole-bucket (redeem, invalidate) or by expiry (sweep).
///
/// Cloning is cheap and every clone shares the same table.
pub struct RehydrationStore<V = serde_json::Value> {
    buckets: Arc<DashMap<Token, Vec<CacheEntry<V>>>>,
}

impl<V> RehydrationStore<V>
where
    V: Send + Sync + 'static,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Add one entry under `token`, expiring `ttl` from now.
    ///
    /// A zero TTL means caching is off; nothing is stored.
    pub fn insert(&self, token: &Token, key: ScopeKey, value: V, ttl: Duration) {
        if ttl.is_zero() {
            trace!(token = %token.short(), key = %key, "Zero TTL, skipping insert");
            return;
        }

        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            warn!(token = %token.short(), ?ttl, "TTL overflows the clock, skipping insert");
            return;
        };

        trace!(token = %token.short(), key = %key, "Entry inserted");
        self.buckets
            .entry(token.clone())
            .or_default()
            .push(CacheEntry {
                key,
                value,
                expires_at,
            });
    }

    /// Take every live entry stored under `token`, removing the whole bucket
    /// in the same step.
    ///
    /// Only one caller can ever receive a given bucket; every later (or
    /// losing concurrent) call sees an empty map. Expired entries are
    /// filtered here too, so results never depend on when the sweep last ran.
    pub fn redeem(&self, token: &Token) -> HashMap<ScopeKey, V> {
        let Some((_, bucket)) = self.buckets.remove(token) else {
            debug!(token = %token.short(), "Nothing to redeem");
            return HashMap::new();
        };

        let now = Instant::now();
        let total = bucket.len();
        let live: HashMap<ScopeKey, V> = bucket
            .into_iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| (entry.key, entry.value))
            .collect();

        debug!(
            token = %token.short(),
            entries = live.len(),
            expired = total.saturating_sub(live.len()),
            "Token redeemed"
        );
        live
    }

    /// Drop every entry under `token` without returning them.
    ///
    /// Returns how many entries were dropped.
    pub fn invalidate(&self, token: &Token) -> usize {
        match self.buckets.remove(token) {
            Some((_, bucket)) => {
                debug!(token = %token.short(), count = bucket.len(), "Token invalidated");
                bucket.len()
            }
            None => 0,
        }
    }

    /// Delete every entry expired at `now`, across all tokens.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|entry| !entry.is_expired_at(now));
            removed += before - bucket.len();
            !bucket.is_empty()
        });

        if removed > 0 {
            debug!(count = removed, "Swept expired entries");
        }
        removed
    }

    /// Total entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    /// Whether the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Snapshot of the store's size.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            tokens: self.buckets.len(),
            entries: self.len(),
        }
    }
}

impl<V> Default for RehydrationStore<V>
where
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for RehydrationStore<V> {
    fn clone(&self) -> Self {
        Self {
            buckets: Arc::clone(&self.buckets),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Tokens with at least one entry.
    pub tokens: usize,

    /// Entries across all tokens.
    pub entries: usize,
}
