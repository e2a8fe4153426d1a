//! Streaming emitter - relays aggregator events to the outbound sink.
//!
//! A dedicated consumer task keeps transport failures out of the
//! aggregation path: if the sink write fails (the client is usually gone),
//! emission for this run stops and the rest of the pipeline finishes
//! undisturbed.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::events::{EventSink, ProbeEvent};

/// Drains the event queue into the sink, in production order, until the
/// queue closes or a write fails.
pub(crate) fn spawn_emitter(
    mut rx: mpsc::Receiver<ProbeEvent>,
    mut sink: Box<dyn EventSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = sink.send(&event).await {
                warn!("stream write failed, aborting emission: {}", e);
                break;
            }
        }
    })
}
