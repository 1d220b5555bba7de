//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per i front-end esterni.
//!
//! ## Responsabilità:
//! - Emette un oggetto JSON per riga su stdout
//! - Riusa `JobItem` e `BatchResult` come sorgente dei dati
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch (destinazione, numero file, configurazione)
//! - `file_complete`: Esito di un singolo file
//! - `complete`: Fine del batch con statistiche aggregate
//! - `error`: Errore di setup

use crate::config::{ConversionConfig, Preset};
use crate::engine::BatchResult;
use crate::job::{JobItem, JobState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del batch
    Start {
        destination: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    /// Fine elaborazione di un file specifico
    FileComplete {
        path: PathBuf,
        state: JobState,
        source_size: Option<u64>,
        output_size: Option<u64>,
        saved_percent: Option<f64>,
        error: Option<String>,
    },

    /// Batch completato
    Complete {
        batch_id: u64,
        total_files: usize,
        files_converted: usize,
        errors: usize,
        removed: usize,
        total_bytes_saved: u64,
        duration_seconds: f64,
    },

    /// Errore generale
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonConfig {
    pub quality: u8,
    pub preset: Preset,
    pub workers: usize,
}

impl JsonConfig {
    pub fn new(config: &ConversionConfig, workers: usize) -> Self {
        Self {
            quality: config.quality,
            preset: config.preset,
            workers,
        }
    }
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Crea un messaggio di inizio
    pub fn start(destination: PathBuf, total_files: usize, config: JsonConfig) -> Self {
        Self::Start {
            destination,
            total_files,
            config,
        }
    }

    /// Crea un messaggio di completamento file
    pub fn file_complete(item: &JobItem) -> Self {
        Self::FileComplete {
            path: item.source_path.clone(),
            state: item.state,
            source_size: item.source_size_bytes,
            output_size: item.output_size_bytes,
            saved_percent: item.savings_ratio().map(|ratio| ratio * 100.0),
            error: item.last_error.as_ref().map(|failure| failure.message.clone()),
        }
    }

    /// Crea un messaggio di completamento del batch
    pub fn complete(result: &BatchResult) -> Self {
        Self::Complete {
            batch_id: result.batch_id,
            total_files: result.total_items,
            files_converted: result.success_count,
            errors: result.failure_count,
            removed: result.removed_count,
            total_bytes_saved: result.total_bytes_saved,
            duration_seconds: result.duration.as_secs_f64(),
        }
    }

    /// Crea un messaggio di errore
    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FailureKind, JobFailure};
    use serde_json::Value;
    use std::time::Duration;

    #[test]
    fn test_file_complete_success() {
        let mut item = JobItem::new(3, PathBuf::from("/in/a.png"));
        item.state = JobState::Success;
        item.source_size_bytes = Some(10_000);
        item.output_size_bytes = Some(4_000);

        let json: Value = serde_json::to_value(JsonMessage::file_complete(&item)).unwrap();
        assert_eq!(json["type"], "file_complete");
        assert_eq!(json["state"], "success");
        assert_eq!(json["output_size"], 4_000);
        assert_eq!(json["saved_percent"], 60.0);
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_file_complete_failure() {
        let mut item = JobItem::new(4, PathBuf::from("/in/b.png"));
        item.state = JobState::Fail;
        item.last_error = Some(JobFailure::new(FailureKind::Encode, "decode failed"));

        let json: Value = serde_json::to_value(JsonMessage::file_complete(&item)).unwrap();
        assert_eq!(json["state"], "fail");
        assert_eq!(json["error"], "decode failed");
        assert!(json["saved_percent"].is_null());
    }

    #[test]
    fn test_start_and_complete_messages() {
        let config = ConversionConfig {
            quality: 85,
            preset: Preset::Photo,
        };
        let start = JsonMessage::start(PathBuf::from("/out"), 2, JsonConfig::new(&config, 4));
        let json: Value = serde_json::to_value(&start).unwrap();
        assert_eq!(json["type"], "start");
        assert_eq!(json["config"]["preset"], "photo");
        assert_eq!(json["config"]["workers"], 4);

        let result = BatchResult {
            batch_id: 1,
            total_items: 2,
            success_count: 1,
            failure_count: 1,
            removed_count: 0,
            total_bytes_saved: 6_000,
            raw_bytes_delta: 6_000,
            duration: Duration::from_millis(1500),
        };
        let json: Value = serde_json::to_value(JsonMessage::complete(&result)).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["total_bytes_saved"], 6_000);
        assert_eq!(json["duration_seconds"], 1.5);
    }
}
