//! Search engine - cache-aside entry point for one run.
//!
//! ## Responsibilities
//!
//! 1. **Validation**: reject incomplete queries before anything is spent.
//! 2. **Cache-aside**: a fresh cached run skips the entire pipeline.
//! 3. **Lifecycle**: launch the session, run dispatcher + workers +
//!    aggregator + emitter, and shut the pool down exactly once on every
//!    exit path.
//! 4. **Containment**: per-target failures stay in the workers; only
//!    pool-level failures escalate, and even then partial results are
//!    preferred over total failure.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::browser::{PagePool, SessionFactory};
use crate::cache::{cache_key, CacheLayer};
use crate::checker::CheckerRegistry;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{AppError, AppResult};
use crate::events::{EventSink, ProbeEvent};
use crate::models::{Query, RawQuery, RunState, Target};
use crate::orchestrator::aggregator::Aggregator;
use crate::orchestrator::emitter::spawn_emitter;
use crate::orchestrator::worker_pool::{spawn_workers, RunContext};
use crate::orchestrator::CancelFlag;

/// Whether a search was answered from cache or by a fresh run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value for an `X-Cache-Status` style response header.
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Result of one search: the aggregate plus where it came from.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub state: RunState,
    pub cache: CacheStatus,
}

/// One engine serves many sequential searches over a fixed target list.
pub struct SearchEngine {
    config: Config,
    targets: Arc<Vec<Target>>,
    registry: Arc<CheckerRegistry>,
    cache: CacheLayer,
    sessions: Arc<dyn SessionFactory>,
}

impl SearchEngine {
    pub fn new(
        config: Config,
        targets: Vec<Target>,
        registry: CheckerRegistry,
        cache: CacheLayer,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            config,
            targets: Arc::new(targets),
            registry: Arc::new(registry),
            cache,
            sessions,
        }
    }

    /// Runs one search end to end.
    ///
    /// On a cache hit the probe pipeline never starts and no events are
    /// emitted; the caller already holds the full aggregate. On a miss the
    /// run streams its events into `sink` while it executes.
    pub async fn search(
        &self,
        raw: &RawQuery,
        sink: Box<dyn EventSink>,
        cancel: CancelFlag,
    ) -> AppResult<SearchOutcome> {
        let query = raw.validate()?;
        let key = cache_key(&query);

        if let Some(state) = self.cache.get(&key).await {
            info!("cache hit for {}, skipping probe run", key);
            return Ok(SearchOutcome {
                state,
                cache: CacheStatus::Hit,
            });
        }

        info!(
            "starting run for {} across {} targets ({} workers)",
            key,
            self.targets.len(),
            self.config.worker_count
        );
        let state = self.run_probes(&query, sink, cancel).await?;
        self.cache.set(&key, &state).await;

        Ok(SearchOutcome {
            state,
            cache: CacheStatus::Miss,
        })
    }

    async fn run_probes(
        &self,
        query: &Query,
        sink: Box<dyn EventSink>,
        cancel: CancelFlag,
    ) -> AppResult<RunState> {
        let total = self.targets.len();

        let (event_tx, event_rx) = mpsc::channel(256);
        let emitter = spawn_emitter(event_rx, sink);
        let _ = event_tx
            .send(ProbeEvent::Start {
                total_restaurants: total,
            })
            .await;

        // A launch failure is the one fatal outcome: there is nothing to
        // degrade to, so the stream ends with `error` instead of `complete`.
        let pool = match self.sessions.launch().await {
            Ok(session) => Arc::new(PagePool::new(session, self.config.page_capacity)),
            Err(source) => {
                error!("browser launch failed: {:#}", source);
                let _ = event_tx
                    .send(ProbeEvent::Error {
                        error: source.to_string(),
                    })
                    .await;
                drop(event_tx);
                let _ = emitter.await;
                return Err(AppError::launch_failed(source));
            }
        };

        let (tx, rx) = mpsc::channel(64);
        let ctx = Arc::new(RunContext {
            dispatcher: Dispatcher::new(self.targets.clone()),
            pool: pool.clone(),
            registry: self.registry.clone(),
            query: query.clone(),
            deadline: self.config.probe_timeout(),
            cancel,
            tx,
        });
        let workers = spawn_workers(ctx.clone(), self.config.worker_count);
        // Workers hold the only senders now; the channel closes when the
        // last worker exits.
        drop(ctx);

        let state = Aggregator::new(total, event_tx.clone()).run(rx).await;

        for handle in workers {
            let _ = handle.await;
        }
        // Single shutdown point for the run, whatever happened above.
        pool.shutdown().await;

        // Close the queue and wait for the emitter so every event is flushed
        // in order before the caller sees the result.
        drop(event_tx);
        let _ = emitter.await;

        info!(
            "run finished: {}/{} targets resolved, {} available",
            state.completed_count(),
            state.total_restaurants,
            state.available.len()
        );
        Ok(state)
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("targets", &self.targets.len())
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish()
    }
}
