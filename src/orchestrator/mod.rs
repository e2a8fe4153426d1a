//! Orchestration layer.
//!
//! ## Responsibilities
//!
//! This layer is the "control room" of a run: it owns the browser pool,
//! bounds concurrency, and turns N independent probes into one aggregate.
//!
//! ## Module map
//!
//! ### `worker_pool` - probe execution
//! - K workers pulling targets from the dispatcher
//! - page lease acquire/release around every probe
//! - per-probe deadline, failure containment
//!
//! ### `aggregator` - run state ownership
//! - single owner of [`RunState`](crate::models::RunState)
//! - buckets each outcome, produces the ordered event sequence
//!
//! ### `emitter` - event delivery
//! - drains the internal event queue into an [`EventSink`](crate::events::EventSink)
//! - a write failure aborts emission, never the run
//!
//! ### `engine` - the cache-aside entry point
//! - query validation, cache get/set, pipeline lifecycle, guaranteed
//!   pool shutdown
//!
//! ## Layer relationships
//!
//! ```text
//! engine (one run per request)
//!     ↓
//! worker_pool (one probe per target)  →  aggregator (one RunState)
//!     ↓                                       ↓
//! browser::pool (page leases)            emitter → EventSink
//! ```
//!
//! Per-target failures stop at the worker that produced them; only
//! pool-level failures escalate to the run.

pub mod aggregator;
pub mod emitter;
pub mod engine;
pub mod worker_pool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use engine::{CacheStatus, SearchEngine, SearchOutcome};

/// Run-level cancellation flag.
///
/// Setting it stops workers from pulling new targets; the probes they
/// already hold finish naturally.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
