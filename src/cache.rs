//! Cache layer - cache-aside wrapper keyed on the query.
//!
//! Reads happen before a run starts; a fresh hit skips the whole probe
//! pipeline. Writes happen after a completed run and are best-effort: a
//! failing store never fails the enclosing request. Staleness is checked
//! lazily at read time; entries are never proactively evicted.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::CacheError;
use crate::models::{Query, RunState};

/// Deterministic cache key for a validated query.
pub fn cache_key(query: &Query) -> String {
    format!("{}|{}|{}", query.date, query.party_size, query.time)
}

/// TTL-agnostic key-value store. The cache layer owns freshness semantics;
/// stores only persist and fetch opaque strings.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// In-process store. Entries live until overwritten; stale ones are simply
/// skipped at read time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an entry physically exists, fresh or not.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Upstash Redis store, talked to over its REST command API.
#[derive(Debug)]
pub struct UpstashStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RedisReply {
    result: Option<JsonValue>,
}

impl UpstashStore {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Builds a store from the configured Upstash credentials, if any.
    pub fn from_config(config: &Config) -> Option<Self> {
        match (&config.upstash_url, &config.upstash_token) {
            (Some(url), Some(token)) => Some(Self::new(url, token)),
            _ => None,
        }
    }

    async fn command(&self, command: &[&str]) -> Result<Option<JsonValue>, CacheError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await
            .map_err(|e| CacheError::Io {
                op: "request",
                source: Box::new(e),
            })?;

        if !response.status().is_success() {
            return Err(CacheError::BadResponse {
                detail: format!("status {}", response.status()),
            });
        }

        let reply: RedisReply = response.json().await.map_err(|e| CacheError::Io {
            op: "decode",
            source: Box::new(e),
        })?;
        Ok(reply.result)
    }
}

#[async_trait]
impl CacheStore for UpstashStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.command(&["GET", key]).await? {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(raw)) => Ok(Some(raw)),
            Some(other) => Err(CacheError::BadResponse {
                detail: format!("non-string GET result: {}", other),
            }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.command(&["SET", key, value]).await.map(|_| ())
    }
}

/// Cache-aside wrapper around the probe pipeline.
pub struct CacheLayer {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, ttl_secs: u64) -> Self {
        Self {
            store: Some(store),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// A layer that never hits and never writes, for running without a cache
    /// backend.
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttl: Duration::zero(),
        }
    }

    /// Returns the cached run state if an entry exists and is still fresh.
    /// Store failures and unreadable entries degrade to a miss.
    pub async fn get(&self, key: &str) -> Option<RunState> {
        let store = self.store.as_ref()?;
        let raw = match store.get(key).await {
            Ok(value) => value?,
            Err(e) => {
                warn!("cache read failed for {}: {}", key, e);
                return None;
            }
        };
        let state: RunState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("cache entry for {} is unreadable: {}", key, e);
                return None;
            }
        };
        let generated_at = state.generated_at?;
        let age = Utc::now().signed_duration_since(generated_at);
        if age < self.ttl {
            debug!("cache hit for {} (age {}s)", key, age.num_seconds());
            Some(state)
        } else {
            debug!("cache entry for {} is stale (age {}s)", key, age.num_seconds());
            None
        }
    }

    /// Best-effort write. Incomplete and degenerate runs (no probe results)
    /// are never cached; store failures are logged and swallowed.
    pub async fn set(&self, key: &str, state: &RunState) {
        let Some(store) = &self.store else { return };
        if !state.is_frozen() || state.completed_count() == 0 {
            debug!("skipping cache write for {}: nothing worth caching", key);
            return;
        }
        match serde_json::to_string(state) {
            Ok(raw) => {
                if let Err(e) = store.set(key, &raw).await {
                    warn!("cache write failed for {}: {}", key, e);
                }
            }
            Err(e) => warn!("failed to serialize run state for {}: {}", key, e),
        }
    }
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("enabled", &self.store.is_some())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeResult, Target};

    fn frozen_state() -> RunState {
        let target = Target {
            id: "r1".into(),
            name: "Trattoria Uno".into(),
            platform: "sevenrooms".into(),
            url: Some("https://example.com/r1".into()),
            slug: None,
        };
        let mut state = RunState::new(1);
        state.record(ProbeResult::available(&target, "https://example.com/r1"));
        state.freeze();
        state
    }

    #[test]
    fn key_is_date_party_size_time() {
        let query = Query {
            date: "2025-09-27".into(),
            party_size: "2".into(),
            time: "19:00".into(),
        };
        assert_eq!(cache_key(&query), "2025-09-27|2|19:00");
    }

    #[tokio::test]
    async fn round_trip_returns_an_equivalent_state() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheLayer::new(store, 300);
        let state = frozen_state();

        cache.set("k", &state).await;
        let cached = cache.get("k").await.expect("fresh entry should hit");
        assert_eq!(cached, state);
    }

    #[tokio::test]
    async fn stale_entries_miss_but_stay_in_the_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheLayer::new(store.clone(), 300);
        let mut state = frozen_state();
        // Age the entry past the TTL.
        state.generated_at = Some(Utc::now() - Duration::seconds(301));

        cache.set("k", &state).await;
        assert!(cache.get("k").await.is_none());
        assert!(store.contains("k").await, "no proactive eviction");
    }

    #[tokio::test]
    async fn degenerate_runs_are_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheLayer::new(store.clone(), 300);

        let mut empty = RunState::new(0);
        empty.freeze();
        cache.set("empty", &empty).await;
        assert!(!store.contains("empty").await);

        // Unfrozen (cancelled) runs are not cached either.
        let partial = frozen_state();
        let unfrozen = RunState {
            generated_at: None,
            ..partial
        };
        cache.set("partial", &unfrozen).await;
        assert!(!store.contains("partial").await);
    }

    #[tokio::test]
    async fn store_failures_never_escape_the_layer() {
        struct BrokenStore;

        #[async_trait]
        impl CacheStore for BrokenStore {
            async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
                Err(CacheError::BadResponse {
                    detail: "store offline".into(),
                })
            }
            async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
                Err(CacheError::BadResponse {
                    detail: "store offline".into(),
                })
            }
        }

        let cache = CacheLayer::new(Arc::new(BrokenStore), 300);
        assert!(cache.get("k").await.is_none());
        cache.set("k", &frozen_state()).await; // must not panic or error
    }

    #[tokio::test]
    async fn disabled_layer_is_inert() {
        let cache = CacheLayer::disabled();
        cache.set("k", &frozen_state()).await;
        assert!(cache.get("k").await.is_none());
    }
}
