//! # WebP Express Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri front-end
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione di conversione, preset e preferenze persistite
//! - `error`: Tipi di errore custom per le diverse fasi
//! - `job`: Singolo file da convertire e la sua macchina a stati
//! - `job_list`: Collezione deduplicata dei file della sessione
//! - `encoder`: Adapter verso libwebp
//! - `savings`: Calcolo e formattazione dello spazio risparmiato
//! - `engine`: Worker pool, pipeline per file e aggregazione dei batch
//! - `file_manager`: Raccolta e filtro dei path di input
//! - `progress` / `json_output`: Feedback per la CLI
//!
//! ## Utilizzo:
//! ```ignore
//! use webp_express::{AddPolicy, BatchEngine, ConversionConfig};
//!
//! let engine = BatchEngine::new(4);
//! engine.add(files, AddPolicy::default()).await;
//! if let Some(handle) = engine.submit(&destination, ConversionConfig::default()).await? {
//!     let result = handle.wait().await?;
//!     println!("{}", result.format_summary());
//! }
//! ```

pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod job;
pub mod job_list;
pub mod json_output;
pub mod progress;
pub mod savings;

pub use config::{ConversionConfig, Preset, Settings};
pub use encoder::{ImageEncoder, WebpEncoder};
pub use engine::{BatchEngine, BatchHandle, BatchResult};
pub use error::ConvertError;
pub use job::{FailureKind, JobFailure, JobItem, JobState};
pub use job_list::{AddPolicy, JobEvent, JobList};
