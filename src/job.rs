//! # Job Item Module
//!
//! Unità di lavoro per un singolo file e la sua macchina a stati.
//!
//! ```text
//! Unstarted ──► Processing ──► Success
//!                   ▲     └──► Fail
//!                   └──────────┘ (resubmission)
//! ```

use crate::error::ConvertError;
use crate::savings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension of every converted file
pub const OUTPUT_EXTENSION: &str = "webp";

/// Processing state of a job item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Unstarted,
    Processing,
    Success,
    Fail,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Fail)
    }

    /// Allowed edges of the per-item state machine
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Unstarted, JobState::Processing)
                | (JobState::Fail, JobState::Processing)
                | (JobState::Processing, JobState::Success)
                | (JobState::Processing, JobState::Fail)
        )
    }
}

/// Which step of the pipeline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceRead,
    Encode,
    DestinationWrite,
}

/// Cause of the last failure, kept on the item for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an engine error into the failure taxonomy
    pub fn from_error(error: &ConvertError) -> Self {
        let kind = match error {
            ConvertError::SourceRead { .. } | ConvertError::Image(_) => FailureKind::SourceRead,
            ConvertError::DestinationWrite { .. } => FailureKind::DestinationWrite,
            _ => FailureKind::Encode,
        };
        Self::new(kind, error.to_string())
    }
}

/// One file's conversion unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    /// Generation number, unique within the owning list
    pub id: u64,
    pub source_path: PathBuf,
    pub state: JobState,
    pub source_size_bytes: Option<u64>,
    pub output_size_bytes: Option<u64>,
    pub last_error: Option<JobFailure>,
}

impl JobItem {
    pub fn new(id: u64, source_path: PathBuf) -> Self {
        Self {
            id,
            source_path,
            state: JobState::Unstarted,
            source_size_bytes: None,
            output_size_bytes: None,
            last_error: None,
        }
    }

    /// Move to `next`, rejecting edges the state machine does not allow
    pub fn transition(&mut self, next: JobState) -> Result<(), ConvertError> {
        if !self.state.can_transition_to(next) {
            return Err(ConvertError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Output file name: source stem + `.webp`
    pub fn output_file_name(&self) -> Option<String> {
        self.source_path
            .file_stem()
            .map(|stem| format!("{}.{}", stem.to_string_lossy(), OUTPUT_EXTENSION))
    }

    /// Output path under `destination`, flat (no subdirectory mirroring)
    pub fn output_path(&self, destination: &Path) -> Option<PathBuf> {
        self.output_file_name().map(|name| destination.join(name))
    }

    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// Parent directory, used by the listing column
    pub fn directory(&self) -> String {
        self.source_path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    pub fn savings_ratio(&self) -> Option<f64> {
        if self.state != JobState::Success {
            return None;
        }
        savings::savings_ratio(self.source_size_bytes, self.output_size_bytes)
    }

    /// "Space saved" cell: empty unless the item succeeded with a positive saving
    pub fn savings_display(&self) -> String {
        savings::display_saving(self.savings_ratio())
    }
}
