//! # openseat
//!
//! Concurrent restaurant availability probe engine: given a date, time and
//! party size, it asks every known booking target "do you have an open
//! slot?" through a pooled headless browser, streams answers as they land,
//! and caches the aggregate per query.
//!
//! ## Architecture
//!
//! Three layers, scarce resources at the bottom:
//!
//! ### ① Infrastructure
//! - `browser/` - owns the browser session and pages, exposes capabilities
//!   only
//! - [`PagePool`] - bounded free list; every probe runs on an exclusive
//!   [`PageLease`]
//!
//! ### ② Capabilities
//! - [`CheckerRegistry`] - platform → checker lookup, injected per engine
//! - [`CacheLayer`] - cache-aside reads/writes keyed on the query
//! - [`EventSink`] implementations - SSE framing, buffering, discarding
//!
//! ### ③ Orchestration
//! - [`Dispatcher`] - hands out each target exactly once
//! - `orchestrator/worker_pool` - K workers, per-probe deadlines
//! - `orchestrator/aggregator` - single owner of [`RunState`]
//! - [`SearchEngine`] - validation, cache-aside, run lifecycle
//!
//! ## Flow
//!
//! ```text
//! SearchEngine::search
//!     ├─ cache hit  → frozen RunState, pipeline skipped
//!     └─ cache miss → launch session → K workers × (dispatch → lease →
//!        probe under deadline → release) → aggregator → events → freeze →
//!        cache write
//! ```

pub mod browser;
pub mod cache;
pub mod checker;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod utils;

// Re-export the types embedders touch.
pub use browser::{BrowserSession, ChromiumLauncher, PageLease, PagePool, ProbePage, SessionFactory};
pub use cache::{cache_key, CacheLayer, CacheStore, MemoryStore, UpstashStore};
pub use checker::{Checker, CheckerRegistry};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{AppError, AppResult};
pub use events::{EventSink, MemorySink, NullSink, ProbeEvent, SseSink};
pub use models::{ProbeResult, ProbeStatus, Query, RawQuery, RunState, Target};
pub use orchestrator::{CacheStatus, CancelFlag, SearchEngine, SearchOutcome};
