use std::time::Duration;

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of concurrent probe workers (K).
    pub worker_count: usize,
    /// Maximum number of browser pages kept by the pool. Independent of the
    /// worker count; workers wait when every page is checked out.
    pub page_capacity: usize,
    /// Per-probe deadline in seconds. Exceeding it is a terminal outcome,
    /// never a retry trigger.
    pub probe_timeout_secs: u64,
    /// Cache entry freshness window in seconds.
    pub cache_ttl_secs: u64,
    /// Optional path to a Chrome/Chromium executable. Autodetected when unset.
    pub chrome_executable: Option<String>,
    /// Upstash Redis REST endpoint; caching is disabled when unset.
    pub upstash_url: Option<String>,
    pub upstash_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: 8,
            page_capacity: 15,
            probe_timeout_secs: 30,
            cache_ttl_secs: 1800,
            chrome_executable: None,
            upstash_url: None,
            upstash_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            worker_count: std::env::var("WORKER_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.worker_count),
            page_capacity: std::env::var("PAGE_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.page_capacity),
            probe_timeout_secs: std::env::var("PROBE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.probe_timeout_secs),
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.cache_ttl_secs),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok(),
            upstash_url: std::env::var("UPSTASH_REDIS_REST_URL").ok(),
            upstash_token: std::env::var("UPSTASH_REDIS_REST_TOKEN").ok(),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
