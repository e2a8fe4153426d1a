//! Worker pool - probe execution.
//!
//! Each of the K workers loops: cancellation check → pull the next target →
//! look up its checker → acquire a page lease → run the checker against the
//! per-probe deadline → release the lease → report the terminal outcome.
//! Every dispatched target produces exactly one [`ProbeResult`], whatever
//! happens in between.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::browser::PagePool;
use crate::checker::CheckerRegistry;
use crate::dispatch::Dispatcher;
use crate::models::{ProbeResult, Query, Target};
use crate::orchestrator::CancelFlag;

/// Message from a worker to the aggregator.
#[derive(Debug)]
pub(crate) enum WorkerMsg {
    /// A probe is about to execute (page acquired, checker invoked next).
    Checking { restaurant: String },
    /// Terminal outcome of one target.
    Done(ProbeResult),
}

/// Everything a worker needs, shared across the pool for one run.
pub(crate) struct RunContext {
    pub dispatcher: Dispatcher,
    pub pool: Arc<PagePool>,
    pub registry: Arc<CheckerRegistry>,
    pub query: Query,
    pub deadline: Duration,
    pub cancel: CancelFlag,
    pub tx: mpsc::Sender<WorkerMsg>,
}

/// Launches exactly `count` workers. The pool's work is complete when every
/// handle has finished (which also closes the worker→aggregator channel).
pub(crate) fn spawn_workers(ctx: Arc<RunContext>, count: usize) -> Vec<JoinHandle<()>> {
    (0..count.max(1))
        .map(|worker_id| {
            let ctx = ctx.clone();
            tokio::spawn(worker_loop(worker_id, ctx))
        })
        .collect()
}

async fn worker_loop(worker_id: usize, ctx: Arc<RunContext>) {
    loop {
        if ctx.cancel.is_cancelled() {
            debug!("worker {} stopping: run cancelled", worker_id);
            break;
        }
        let Some(target) = ctx.dispatcher.next() else {
            debug!("worker {} stopping: no targets left", worker_id);
            break;
        };
        let result = probe_target(&ctx, &target).await;
        if ctx.tx.send(WorkerMsg::Done(result)).await.is_err() {
            // Aggregator is gone; nothing left to report to.
            break;
        }
    }
}

/// Runs one probe to a terminal outcome. Failures never escape this
/// function: they become `Error` results.
async fn probe_target(ctx: &RunContext, target: &Target) -> ProbeResult {
    let Some(checker) = ctx.registry.get(&target.platform) else {
        debug!(
            "no checker for platform '{}', skipping {}",
            target.platform, target.name
        );
        return ProbeResult::skipped(target);
    };

    // Once the session has crashed, remaining targets resolve as errors
    // instead of queueing on a dead browser.
    if ctx.pool.is_poisoned() {
        return ProbeResult::error(target, "browser session crashed");
    }

    let lease = match ctx.pool.acquire().await {
        Ok(lease) => lease,
        Err(e) => {
            warn!("could not acquire page for {}: {}", target.name, e);
            return ProbeResult::error(target, e.to_string());
        }
    };

    let _ = ctx
        .tx
        .send(WorkerMsg::Checking {
            restaurant: target.name.clone(),
        })
        .await;

    let outcome = timeout(ctx.deadline, checker.check(lease.page(), target, &ctx.query)).await;
    let result = match outcome {
        Err(_) => {
            warn!("probe timed out for {}", target.name);
            ProbeResult::timeout(target)
        }
        Ok(Err(e)) => {
            warn!("checker failed for {}: {:#}", target.name, e);
            ProbeResult::error(target, e.to_string())
        }
        Ok(Ok(result)) => result,
    };

    // Release on every exit path, timeout and failure included.
    ctx.pool.release(lease).await;
    result
}
