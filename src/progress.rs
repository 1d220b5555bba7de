//! # Progress Tracking Module
//!
//! Questo modulo gestisce il feedback visivo durante un batch di conversione.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Listener sugli eventi della job list (`JobEvent::StateChanged`)
//! - Messaggi per file: percentuale risparmiata o motivo dell'errore
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================>---------------] 12/20 (60%) [OK] photo.jpg: 45% saved
//! ```
//!
//! ## Esempio:
//! ```ignore
//! let progress = ProgressManager::new(total_files);
//! let bar = progress.clone();
//! let listener = spawn_listener(engine.subscribe_jobs(), total, move |item| bar.record(item));
//!
//! let result = handle.wait().await?;
//! listener.await?;
//! progress.finish(&result.format_summary());
//! ```

use crate::job::{JobItem, JobState};
use crate::job_list::JobEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// Manages the progress bar of one batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Tick for a settled item
    pub fn record(&self, item: &JobItem) {
        if let Some(message) = item_message(item) {
            self.bar.inc(1);
            self.bar.set_message(message);
        }
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Status line for a terminal item, `None` while it is still pending
pub fn item_message(item: &JobItem) -> Option<String> {
    match item.state {
        JobState::Success => {
            let saved = item.savings_display();
            if saved.is_empty() {
                Some(format!("[OK] {}", item.file_name()))
            } else {
                Some(format!("[OK] {}: {} saved", item.file_name(), saved))
            }
        }
        JobState::Fail => {
            let reason = item
                .last_error
                .as_ref()
                .map(|failure| failure.message.as_str())
                .unwrap_or("unknown error");
            Some(format!("[ERROR] {}: {}", item.file_name(), reason))
        }
        JobState::Unstarted | JobState::Processing => None,
    }
}

/// Call `on_settled` for every item that reaches a terminal state.
///
/// Stops after `limit` terminal items, when the job list is dropped, or when aborted.
pub fn spawn_listener<F>(
    mut events: broadcast::Receiver<JobEvent>,
    limit: usize,
    on_settled: F,
) -> JoinHandle<()>
where
    F: Fn(&JobItem) + Send + 'static,
{
    tokio::spawn(async move {
        let mut settled = 0;
        while settled < limit {
            match events.recv().await {
                Ok(JobEvent::StateChanged(item)) if item.state.is_terminal() => {
                    settled += 1;
                    on_settled(&item);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Progress listener missed {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FailureKind, JobFailure};
    use crate::job_list::{AddPolicy, JobList, Settlement};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn item(state: JobState) -> JobItem {
        let mut item = JobItem::new(1, PathBuf::from("/in/photo.jpg"));
        item.state = state;
        item
    }

    #[test]
    fn test_item_message() {
        let mut success = item(JobState::Success);
        success.source_size_bytes = Some(10_000);
        success.output_size_bytes = Some(4_000);
        assert_eq!(item_message(&success).unwrap(), "[OK] photo.jpg: 60% saved");

        success.output_size_bytes = Some(12_000);
        assert_eq!(item_message(&success).unwrap(), "[OK] photo.jpg");

        let mut failed = item(JobState::Fail);
        failed.last_error = Some(JobFailure::new(FailureKind::Encode, "bad header"));
        assert_eq!(item_message(&failed).unwrap(), "[ERROR] photo.jpg: bad header");

        assert!(item_message(&item(JobState::Processing)).is_none());
        assert!(item_message(&item(JobState::Unstarted)).is_none());
    }

    #[tokio::test]
    async fn test_listener_reports_terminal_items_only() {
        let jobs = Arc::new(JobList::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = spawn_listener(jobs.subscribe(), 1, move |item| {
            let _ = tx.send(item.clone());
        });

        let path = PathBuf::from("/in/photo.jpg");
        jobs.add(vec![path.clone()], AddPolicy::default()).await;
        let claimed = jobs.claim(jobs.get(&path).await.unwrap().id, &path).await.unwrap();
        jobs.settle(
            claimed.id,
            &path,
            Settlement::Success {
                source_size: 100,
                output_size: 40,
            },
        )
        .await;

        let settled = rx.recv().await.unwrap();
        assert_eq!(settled.state, JobState::Success);
        assert_eq!(settled.output_size_bytes, Some(40));
        listener.await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_progress_manager_counts_terminal_items() {
        let progress = ProgressManager::new(3);
        progress.record(&item(JobState::Processing));
        progress.record(&item(JobState::Fail));
        progress.record(&item(JobState::Success));
        assert_eq!(progress.position(), 2);
        progress.finish("done");
    }
}
