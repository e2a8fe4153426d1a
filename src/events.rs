//! Streaming event taxonomy and outbound sinks.
//!
//! The aggregator never touches the transport: it pushes [`ProbeEvent`]s into
//! an internal queue which a dedicated consumer drains into an [`EventSink`].
//! A write failure aborts further emission for that run only.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::StreamError;
use crate::models::{ProbeResult, ProbeStatus, RunState};

/// One outbound event of a live run.
///
/// Strict production order: `start` once first, then interleaved `checking` /
/// `result` / `progress`, then exactly one `complete` (or `error` in its
/// place when the run is aborted by a pool-level failure).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeEvent {
    /// Emitted once, first; carries the total target count.
    #[serde(rename_all = "camelCase")]
    Start { total_restaurants: usize },
    /// A target's probe is about to execute.
    Checking {
        restaurant: String,
        completed: usize,
        total: usize,
    },
    /// A target resolved `available`; carries the full probe result so a live
    /// client can render it immediately.
    Result {
        result: ProbeResult,
        completed: usize,
        total: usize,
    },
    /// Emitted for every resolution, available or not.
    Progress {
        restaurant: String,
        status: ProbeStatus,
        completed: usize,
        total: usize,
    },
    /// Emitted exactly once, last; carries the frozen run state.
    Complete { data: RunState },
    /// Emitted instead of `complete` when a fatal pool-level failure aborts
    /// the run.
    Error { error: String },
}

/// Destination for a run's ordered event sequence.
#[async_trait]
pub trait EventSink: Send {
    async fn send(&mut self, event: &ProbeEvent) -> Result<(), StreamError>;
}

/// Server-sent-events sink: frames each event as `data: <json>\n\n`.
#[derive(Debug)]
pub struct SseSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> SseSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> EventSink for SseSink<W> {
    async fn send(&mut self, event: &ProbeEvent) -> Result<(), StreamError> {
        let payload =
            serde_json::to_string(event).map_err(|source| StreamError::Encode { source })?;
        let frame = format!("data: {}\n\n", payload);
        self.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|source| StreamError::Write { source })?;
        self.writer
            .flush()
            .await
            .map_err(|source| StreamError::Write { source })?;
        Ok(())
    }
}

/// Sink that discards every event. For buffered (non-streaming) requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn send(&mut self, _event: &ProbeEvent) -> Result<(), StreamError> {
        Ok(())
    }
}

/// Sink that records every event in memory. Useful for embedders that want
/// to inspect the sequence, and for tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ProbeEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProbeEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn send(&mut self, event: &ProbeEvent) -> Result<(), StreamError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
