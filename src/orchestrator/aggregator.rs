//! Aggregator - single owner of the run state.
//!
//! Worker outcomes arrive through one channel, so `RunState` is only ever
//! mutated here, in arrival order. For every outcome the aggregator emits
//! the matching events; at completion it freezes the state and emits
//! `complete`.

use tokio::sync::mpsc;
use tracing::debug;

use crate::events::ProbeEvent;
use crate::models::{ProbeResult, RunState};
use crate::orchestrator::worker_pool::WorkerMsg;

pub(crate) struct Aggregator {
    state: RunState,
    events: mpsc::Sender<ProbeEvent>,
}

impl Aggregator {
    pub(crate) fn new(total: usize, events: mpsc::Sender<ProbeEvent>) -> Self {
        Self {
            state: RunState::new(total),
            events,
        }
    }

    /// Consumes worker messages until every target has resolved, or until
    /// the workers stop early (cancellation). Returns the final state,
    /// frozen only if the run actually completed.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<WorkerMsg>) -> RunState {
        while !self.state.is_complete() {
            let Some(msg) = rx.recv().await else {
                debug!(
                    "workers stopped after {}/{} targets",
                    self.state.completed_count(),
                    self.state.total_restaurants
                );
                break;
            };
            match msg {
                WorkerMsg::Checking { restaurant } => {
                    let event = ProbeEvent::Checking {
                        restaurant,
                        completed: self.state.completed_count(),
                        total: self.state.total_restaurants,
                    };
                    self.emit(event).await;
                }
                WorkerMsg::Done(result) => self.record(result).await,
            }
        }

        if self.state.is_complete() {
            self.state.freeze();
            self.emit(ProbeEvent::Complete {
                data: self.state.clone(),
            })
            .await;
        }
        self.state
    }

    async fn record(&mut self, result: ProbeResult) {
        let restaurant = result.name.clone();
        let status = result.status;
        let available = status.is_available();
        let result_event = available.then(|| result.clone());

        self.state.record(result);
        let completed = self.state.completed_count();
        let total = self.state.total_restaurants;

        // Available targets are pushed to the client immediately; everything
        // gets a progress tick.
        if let Some(result) = result_event {
            self.emit(ProbeEvent::Result {
                result,
                completed,
                total,
            })
            .await;
        }
        self.emit(ProbeEvent::Progress {
            restaurant,
            status,
            completed,
            total,
        })
        .await;
    }

    async fn emit(&self, event: ProbeEvent) {
        // The emitter drops its receiver once the sink fails; aggregation
        // carries on regardless.
        let _ = self.events.send(event).await;
    }
}
