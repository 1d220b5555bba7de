//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori di lettura, di encoding e di scrittura per ogni file
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `SourceRead`: File sorgente mancante o non leggibile
//! - `Encode`: Immagine non decodificabile o rifiutata dal codec
//! - `DestinationWrite`: Permessi, disco pieno, path in collisione
//! - `Validation`: Parametri di conversione fuori range
//! - `InvalidTransition`: Transizione di stato non ammessa
//! - `EngineClosed`: Worker pool già chiuso
//!
//! ## Esempio:
//! ```ignore
//! if quality % 5 != 0 {
//!     return Err(ConvertError::Validation("quality must be a multiple of 5".to_string()));
//! }
//! ```

use crate::job::JobState;
use std::path::PathBuf;

/// Custom error types for batch conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Cannot read source {}: {reason}", path.display())]
    SourceRead { path: PathBuf, reason: String },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Cannot write {}: {reason}", path.display())]
    DestinationWrite { path: PathBuf, reason: String },

    #[error("Invalid conversion settings: {0}")]
    Validation(String),

    #[error("Invalid state transition {from:?} -> {to:?}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Conversion engine is shut down")]
    EngineClosed,
}
