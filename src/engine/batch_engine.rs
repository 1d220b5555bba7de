//! # Batch Engine
//!
//! Orchestratore principale: possiede la job list, il worker pool e l'aggregatore,
//! ed è l'unico punto di ingresso per i front-end (CLI, UI).
//!
//! ## Flusso di un batch:
//! 1. **Add**: i path scelti dall'utente entrano come `Unstarted`
//! 2. **Submit**: gli item non ancora convertiti passano a `Processing` e vengono accodati
//! 3. **Processing**: ogni worker legge, codifica e scrive un file
//! 4. **Completion**: quando l'ultimo item del batch è terminale parte un solo evento
//!    con byte risparmiati e numero di errori

use crate::{
    config::ConversionConfig,
    encoder::{ImageEncoder, WebpEncoder},
    engine::{
        completion::{BatchHandle, BatchResult, CompletionAggregator},
        worker_pool::WorkerPool,
    },
    error::ConvertError,
    job_list::{AddPolicy, JobEvent, JobList},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// One conversion session
pub struct BatchEngine {
    jobs: Arc<JobList>,
    aggregator: Arc<CompletionAggregator>,
    pool: WorkerPool,
}

impl BatchEngine {
    /// Engine with the libwebp encoder. Must be called inside a tokio runtime.
    pub fn new(workers: usize) -> Self {
        Self::with_encoder(workers, Arc::new(WebpEncoder::new()))
    }

    pub fn with_encoder(workers: usize, encoder: Arc<dyn ImageEncoder>) -> Self {
        let jobs = Arc::new(JobList::new());
        let aggregator = Arc::new(CompletionAggregator::new());
        let pool = WorkerPool::new(workers, encoder, jobs.clone(), aggregator.clone());

        Self {
            jobs,
            aggregator,
            pool,
        }
    }

    /// Read access to the job list
    pub fn jobs(&self) -> &Arc<JobList> {
        &self.jobs
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    pub async fn add<I>(&self, paths: I, policy: AddPolicy) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.jobs.add(paths, policy).await
    }

    pub async fn remove<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.jobs.remove(paths).await
    }

    /// Convert every item not already converted into `destination`.
    ///
    /// Returns as soon as the work is queued; await the handle (or listen on
    /// [`subscribe_completions`](Self::subscribe_completions)) for the result.
    pub async fn submit(
        &self,
        destination: &Path,
        config: ConversionConfig,
    ) -> Result<Option<BatchHandle>, ConvertError> {
        let eligible = self.jobs.eligible_for_conversion().await;
        let handle = self.pool.submit(eligible, destination, config).await?;
        if handle.is_none() {
            info!("No files to convert");
        }
        Ok(handle)
    }

    pub fn subscribe_jobs(&self) -> broadcast::Receiver<JobEvent> {
        self.jobs.subscribe()
    }

    pub fn subscribe_completions(&self) -> broadcast::Receiver<BatchResult> {
        self.aggregator.subscribe()
    }

    pub async fn active_batches(&self) -> usize {
        self.aggregator.active_batches().await
    }

    /// Drain queued work and stop the workers
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
