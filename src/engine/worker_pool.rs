//! # Worker Pool / Scheduler
//!
//! Pool di worker a dimensione fissa che consuma una coda FIFO di task.
//!
//! ## Gestione concorrenza:
//! - `workers` task tokio leggono dalla stessa coda `mpsc`
//! - Il submit non attende mai il completamento: marca gli item `Processing`,
//!   registra il batch sull'aggregatore e accoda
//! - Submit successivi si accodano dietro ai task in esecuzione
//! - I path di output sono assegnati a livello di sessione: due item non scrivono mai lo stesso file
//! - Nessuna cancellazione: un task avviato arriva sempre a `Success` o `Fail`

use crate::{
    config::ConversionConfig,
    encoder::ImageEncoder,
    engine::{
        completion::{BatchHandle, CompletionAggregator},
        path_resolver::OutputOwners,
        task_converter::{BatchContext, ConversionTask, TaskConverter},
    },
    error::ConvertError,
    job::{JobItem, JobState},
    job_list::JobList,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

type TaskReceiver = Arc<Mutex<mpsc::UnboundedReceiver<ConversionTask>>>;

/// Fixed-size pool of conversion workers
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::UnboundedSender<ConversionTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    jobs: Arc<JobList>,
    aggregator: Arc<CompletionAggregator>,
    converter: Arc<TaskConverter>,
    outputs: OutputOwners,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers on the current tokio runtime
    pub fn new(
        size: usize,
        encoder: Arc<dyn ImageEncoder>,
        jobs: Arc<JobList>,
        aggregator: Arc<CompletionAggregator>,
    ) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: TaskReceiver = Arc::new(Mutex::new(receiver));
        let converter = Arc::new(TaskConverter::new(
            jobs.clone(),
            aggregator.clone(),
            encoder,
        ));

        let workers = (0..size)
            .map(|index| {
                let receiver = receiver.clone();
                let converter = converter.clone();
                tokio::spawn(Self::run_worker(index, receiver, converter))
            })
            .collect();

        info!("🔧 Worker pool started with {} workers", size);

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            jobs,
            aggregator,
            converter,
            outputs: OutputOwners::new(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    async fn run_worker(index: usize, receiver: TaskReceiver, converter: Arc<TaskConverter>) {
        loop {
            let task = {
                let mut receiver = receiver.lock().await;
                receiver.recv().await
            };
            match task {
                Some(task) => converter.run(task).await,
                None => break,
            }
        }
        debug!("Worker {} stopped", index);
    }

    /// Claim the eligible `items`, register the batch and enqueue one task per claimed item.
    ///
    /// Returns `Ok(None)` when nothing was eligible. Items already `Processing` in another
    /// batch, or removed since the caller took its snapshot, are skipped.
    pub async fn submit(
        &self,
        items: Vec<JobItem>,
        destination: &Path,
        config: ConversionConfig,
    ) -> Result<Option<BatchHandle>, ConvertError> {
        config.validate()?;
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(ConvertError::EngineClosed)?;

        let mut claimed = Vec::new();
        for item in items.into_iter().filter(|item| item.state != JobState::Success) {
            match self.jobs.claim(item.id, &item.source_path).await {
                Some(claimed_item) => claimed.push(claimed_item),
                None => debug!(
                    "Skipping {}: already processing or removed",
                    item.source_path.display()
                ),
            }
        }

        if claimed.is_empty() {
            debug!("Nothing eligible for conversion");
            return Ok(None);
        }

        let handle = self
            .aggregator
            .register(claimed.iter().map(|item| item.id))
            .await;
        let batch = Arc::new(BatchContext {
            id: handle.id,
            destination: destination.to_path_buf(),
            config,
        });

        info!(
            "Batch {}: {} files -> {} (quality {}, preset {})",
            batch.id,
            claimed.len(),
            destination.display(),
            config.quality,
            config.preset
        );

        let assigned = self.outputs.assign(claimed, destination, &self.jobs).await;
        for (item, output) in assigned {
            let task = ConversionTask {
                batch: batch.clone(),
                item,
                output,
            };
            if let Err(mpsc::error::SendError(task)) = sender.send(task) {
                self.converter.abandon(task, ConvertError::EngineClosed).await;
            }
        }

        Ok(Some(handle))
    }

    /// Stop accepting work, let queued tasks drain, wait for every worker
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            let _ = worker.await;
        }
        info!("Worker pool stopped");
    }
}
