//! # Completion Aggregator
//!
//! Osserva gli esiti di ogni file e chiude ogni `BatchRun` con un singolo evento.
//! Più batch possono essere attivi contemporaneamente: ognuno ha il suo tracker.

use crate::error::ConvertError;
use crate::savings::{self, format_size};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info};

pub type BatchId = u64;

const COMPLETION_CAPACITY: usize = 64;

/// How one item of a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Success { source_size: u64, output_size: u64 },
    Fail,
    /// Item was removed from the list while its task was running
    Discarded,
}

/// Aggregate result of a settled batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub batch_id: BatchId,
    pub total_items: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub removed_count: usize,
    /// Never negative: a batch that grew files reports zero
    pub total_bytes_saved: u64,
    pub raw_bytes_delta: i64,
    pub duration: Duration,
}

impl BatchResult {
    pub fn format_summary(&self) -> String {
        format!(
            "Converted: {} files | Failed: {} | Removed: {} | Total saved: {}",
            self.success_count,
            self.failure_count,
            self.removed_count,
            format_size(self.total_bytes_saved),
        )
    }
}

/// Caller side of a submitted batch
#[derive(Debug)]
pub struct BatchHandle {
    pub id: BatchId,
    pub total_items: usize,
    receiver: oneshot::Receiver<BatchResult>,
}

impl BatchHandle {
    /// Wait until every item of the batch reached a terminal state
    pub async fn wait(self) -> Result<BatchResult, ConvertError> {
        self.receiver.await.map_err(|_| ConvertError::EngineClosed)
    }
}

struct RunTracker {
    pending: HashSet<u64>,
    total_items: usize,
    success_count: usize,
    failure_count: usize,
    removed_count: usize,
    raw_bytes_delta: i64,
    started: Instant,
    notify: Option<oneshot::Sender<BatchResult>>,
}

impl RunTracker {
    fn result(&self, batch_id: BatchId) -> BatchResult {
        BatchResult {
            batch_id,
            total_items: self.total_items,
            success_count: self.success_count,
            failure_count: self.failure_count,
            removed_count: self.removed_count,
            total_bytes_saved: self.raw_bytes_delta.max(0) as u64,
            raw_bytes_delta: self.raw_bytes_delta,
            duration: self.started.elapsed(),
        }
    }
}

/// Tracks every live batch and emits exactly one completion per batch
pub struct CompletionAggregator {
    runs: Mutex<HashMap<BatchId, RunTracker>>,
    next_batch: AtomicU64,
    events: broadcast::Sender<BatchResult>,
}

impl Default for CompletionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionAggregator {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(COMPLETION_CAPACITY);
        Self {
            runs: Mutex::new(HashMap::new()),
            next_batch: AtomicU64::new(1),
            events,
        }
    }

    /// Completion events of every batch
    pub fn subscribe(&self) -> broadcast::Receiver<BatchResult> {
        self.events.subscribe()
    }

    /// Start tracking a batch snapshot. Must happen before any of its tasks run.
    pub async fn register<I>(&self, item_ids: I) -> BatchHandle
    where
        I: IntoIterator<Item = u64>,
    {
        let pending: HashSet<u64> = item_ids.into_iter().collect();
        let id = self.next_batch.fetch_add(1, Ordering::Relaxed);
        let (notify, receiver) = oneshot::channel();
        let total_items = pending.len();

        self.runs.lock().await.insert(
            id,
            RunTracker {
                pending,
                total_items,
                success_count: 0,
                failure_count: 0,
                removed_count: 0,
                raw_bytes_delta: 0,
                started: Instant::now(),
                notify: Some(notify),
            },
        );
        debug!("Tracking batch {} with {} items", id, total_items);

        BatchHandle {
            id,
            total_items,
            receiver,
        }
    }

    /// Record the terminal outcome of one item. Returns the batch result when this was the last one.
    pub async fn record(
        &self,
        batch_id: BatchId,
        item_id: u64,
        outcome: ItemOutcome,
    ) -> Option<BatchResult> {
        let mut runs = self.runs.lock().await;
        let run = runs.get_mut(&batch_id)?;
        if !run.pending.remove(&item_id) {
            debug!("Ignoring duplicate outcome for item {} of batch {}", item_id, batch_id);
            return None;
        }

        match outcome {
            ItemOutcome::Success {
                source_size,
                output_size,
            } => {
                run.success_count += 1;
                run.raw_bytes_delta += savings::bytes_delta(source_size, output_size);
            }
            ItemOutcome::Fail => run.failure_count += 1,
            ItemOutcome::Discarded => run.removed_count += 1,
        }

        if !run.pending.is_empty() {
            return None;
        }

        let mut run = runs.remove(&batch_id)?;
        drop(runs);

        let result = run.result(batch_id);
        info!("Batch {} complete: {}", batch_id, result.format_summary());
        if let Some(notify) = run.notify.take() {
            let _ = notify.send(result.clone());
        }
        let _ = self.events.send(result.clone());
        Some(result)
    }

    /// Number of batches not yet settled
    pub async fn active_batches(&self) -> usize {
        self.runs.lock().await.len()
    }
}
