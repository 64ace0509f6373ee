//! ============================================================================
//! TTL Cache Layer - Namespaced caches with lazy expiry
//! ============================================================================
//! Three independent caches bound upstream load:
//! - **ownership**: account -> lookup result (minutes; ownership can change)
//! - **proof**: account+asset -> commitment (~1 hour)
//! - **verify**: account+asset+digest -> verification result (~10 minutes)
//!
//! Entries expire lazily on `get`. A background sweeper can be spawned to
//! drop dead entries for memory hygiene; it never changes what `get` returns.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::commitment::Commitment;
use crate::config::GateConfig;

/// Maximum number of entries per cache to prevent unbounded growth
pub const MAX_CACHE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
}

/// Entry counts for one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total: usize,
    pub live: usize,
}

/// A single TTL cache namespace
pub struct TtlCache<V> {
    namespace: &'static str,
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(namespace: &'static str, ttl: Duration) -> Self {
        Self::with_capacity(namespace, ttl, MAX_CACHE_SIZE)
    }

    pub fn with_capacity(namespace: &'static str, ttl: Duration, max_entries: usize) -> Self {
        Self {
            namespace,
            ttl,
            max_entries: max_entries.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}_{}", self.namespace, key)
    }

    /// Cached value if present and unexpired
    pub async fn get(&self, key: &str) -> Option<V> {
        let full_key = self.full_key(key);
        let cache = self.entries.read().await;
        match cache.get(&full_key) {
            Some(entry) if Instant::now() < entry.expires_at => {
                debug!(
                    "Cache hit for {} (age: {:?})",
                    full_key,
                    entry.inserted_at.elapsed()
                );
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!("Cache entry {} expired", full_key);
                None
            }
            None => {
                debug!("Cache miss for {}", full_key);
                None
            }
        }
    }

    /// Store under the namespace's default TTL
    pub async fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.ttl).await;
    }

    pub async fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let full_key = self.full_key(key);
        let now = Instant::now();
        let mut cache = self.entries.write().await;

        // Evict oldest entry if cache is at capacity
        if cache.len() >= self.max_entries && !cache.contains_key(&full_key) {
            if let Some(oldest_key) = cache
                .iter()
                .min_by_key(|(_, v)| v.inserted_at)
                .map(|(k, _)| k.clone())
            {
                cache.remove(&oldest_key);
            }
        }

        cache.insert(
            full_key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop one key; returns whether it was present
    pub async fn invalidate(&self, key: &str) -> bool {
        let full_key = self.full_key(key);
        let removed = self.entries.write().await.remove(&full_key).is_some();
        if removed {
            debug!("Invalidated {}", full_key);
        }
        removed
    }

    pub async fn clear(&self) -> usize {
        let mut cache = self.entries.write().await;
        let count = cache.len();
        cache.clear();
        count
    }

    /// Remove expired entries, returning how many were dropped
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.entries.write().await;
        let before = cache.len();
        cache.retain(|_, entry| now < entry.expires_at);
        before - cache.len()
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let cache = self.entries.read().await;
        CacheStats {
            total: cache.len(),
            live: cache.values().filter(|e| now < e.expires_at).count(),
        }
    }
}

/// Cached outcome of an ownership resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipLookup {
    pub owned: bool,
    /// Asset that satisfied the lookup, when one did
    pub asset_id: Option<String>,
}

impl OwnershipLookup {
    pub fn owned(asset_id: impl Into<String>) -> Self {
        Self {
            owned: true,
            asset_id: Some(asset_id.into()),
        }
    }

    pub fn not_owned() -> Self {
        Self {
            owned: false,
            asset_id: None,
        }
    }
}

/// The three cache namespaces used by the gate
pub struct GateCaches {
    pub ownership: TtlCache<OwnershipLookup>,
    pub commitments: TtlCache<Commitment>,
    pub verifications: TtlCache<bool>,
}

impl GateCaches {
    pub fn new(ownership_ttl: Duration, commitment_ttl: Duration, verification_ttl: Duration) -> Self {
        Self {
            ownership: TtlCache::new("nfts", ownership_ttl),
            commitments: TtlCache::new("proof", commitment_ttl),
            verifications: TtlCache::new("verify", verification_ttl),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            config.ownership_ttl(),
            config.commitment_ttl(),
            config.verification_ttl(),
        )
    }

    /// Sweep all namespaces once
    pub async fn sweep_expired(&self) -> usize {
        self.ownership.sweep_expired().await
            + self.commitments.sweep_expired().await
            + self.verifications.sweep_expired().await
    }

    pub async fn clear(&self) {
        let count =
            self.ownership.clear().await + self.commitments.clear().await + self.verifications.clear().await;
        info!("Cleared {} cached entries", count);
    }

    /// Stats per namespace: (ownership, commitments, verifications)
    pub async fn stats(&self) -> (CacheStats, CacheStats, CacheStats) {
        (
            self.ownership.stats().await,
            self.commitments.stats().await,
            self.verifications.stats().await,
        )
    }

    /// Periodically sweep expired entries until the handle is aborted
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let swept = self.sweep_expired().await;
                if swept > 0 {
                    debug!("Swept {} expired cache entries", swept);
                }
            }
        })
    }
}
