//! # Task Converter Module
//!
//! Worker per la conversione di singoli file.
//! Separato dal worker pool per maggiore modularità: qui vive la pipeline
//! lettura → encoding → scrittura atomica (temp file + rename) e la scrittura dell'esito sulla job list.

use crate::{
    config::ConversionConfig,
    encoder::ImageEncoder,
    engine::completion::{BatchId, CompletionAggregator, ItemOutcome},
    error::ConvertError,
    job::{JobFailure, JobItem},
    job_list::{JobList, Settlement},
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Settings shared by every task of one batch
#[derive(Debug)]
pub struct BatchContext {
    pub id: BatchId,
    pub destination: PathBuf,
    pub config: ConversionConfig,
}

/// One queued unit of work
pub struct ConversionTask {
    pub batch: Arc<BatchContext>,
    pub item: JobItem,
    pub output: Result<PathBuf, ConvertError>,
}

/// Converts single files and reports their outcome
pub struct TaskConverter {
    jobs: Arc<JobList>,
    aggregator: Arc<CompletionAggregator>,
    encoder: Arc<dyn ImageEncoder>,
}

impl TaskConverter {
    pub fn new(
        jobs: Arc<JobList>,
        aggregator: Arc<CompletionAggregator>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> Self {
        Self {
            jobs,
            aggregator,
            encoder,
        }
    }

    /// Processa un task e registra l'esito
    pub async fn run(&self, task: ConversionTask) {
        let ConversionTask {
            batch,
            item,
            output,
        } = task;

        debug!("[PROCESS] {} (batch {})", item.source_path.display(), batch.id);
        let result = self.process_single_file(&batch, &item, output).await;
        self.finish(&batch, &item, result).await;
    }

    /// Settle a task that will never run, so its batch can still complete
    pub async fn abandon(&self, task: ConversionTask, error: ConvertError) {
        self.finish(&task.batch, &task.item, Err(error)).await;
    }

    async fn finish(&self, batch: &BatchContext, item: &JobItem, result: Result<(u64, u64), ConvertError>) {
        let (settlement, outcome) = match result {
            Ok((source_size, output_size)) => {
                debug!(
                    "[OK] {}: {} -> {} bytes",
                    item.source_path.display(),
                    source_size,
                    output_size
                );
                (
                    Settlement::Success {
                        source_size,
                        output_size,
                    },
                    ItemOutcome::Success {
                        source_size,
                        output_size,
                    },
                )
            }
            Err(e) => {
                warn!("[ERROR] {}: {}", item.source_path.display(), e);
                (Settlement::Fail(JobFailure::from_error(&e)), ItemOutcome::Fail)
            }
        };

        let outcome = match self.jobs.settle(item.id, &item.source_path, settlement).await {
            Some(_) => outcome,
            None => ItemOutcome::Discarded,
        };
        self.aggregator.record(batch.id, item.id, outcome).await;
    }

    /// Read, encode, write. Returns `(source_size, output_size)`.
    async fn process_single_file(
        &self,
        batch: &BatchContext,
        item: &JobItem,
        output: Result<PathBuf, ConvertError>,
    ) -> Result<(u64, u64), ConvertError> {
        let bytes = tokio::fs::read(&item.source_path)
            .await
            .map_err(|e| ConvertError::SourceRead {
                path: item.source_path.clone(),
                reason: e.to_string(),
            })?;
        let source_size = bytes.len() as u64;
        self.jobs
            .record_source_size(item.id, &item.source_path, source_size)
            .await;

        let output_path = output?;

        // Encoding is CPU-bound, keep it off the async workers
        let encoder = self.encoder.clone();
        let config = batch.config;
        let encoded = tokio::task::spawn_blocking(move || encoder.encode(&bytes, &config))
            .await
            .map_err(|e| ConvertError::Encode(format!("encoder task failed: {}", e)))??;

        let output_size = encoded.len() as u64;
        Self::write_output(output_path, encoded).await?;

        Ok((source_size, output_size))
    }

    /// Write into a temp file next to the output, then rename it into place.
    ///
    /// A failed write only ever discards the temp file, never an existing output.
    async fn write_output(output_path: PathBuf, encoded: Vec<u8>) -> Result<(), ConvertError> {
        let target = output_path.clone();
        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let dir = target.parent().unwrap_or_else(|| Path::new("."));
            let mut file = tempfile::NamedTempFile::new_in(dir)?;
            file.write_all(&encoded)?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        .and_then(|result| result);

        written.map_err(|e| ConvertError::DestinationWrite {
            path: output_path,
            reason: e.to_string(),
        })
    }
}
