//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di output di un batch.
//! Output piatto: `<destination>/<stem>.webp`, nessun mirroring delle sottocartelle.
//!
//! ## Proprietà dei path:
//! - Il primo item che rivendica un path di output ne diventa proprietario per la sessione
//! - Un item successivo (stesso batch o batch diversi) con lo stesso path fallisce
//!   con `DestinationWrite` senza toccare il file
//! - Il path torna libero quando il proprietario viene rimosso o fallisce

use crate::error::ConvertError;
use crate::job::{JobItem, JobState};
use crate::job_list::JobList;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Calcola il path di output per un item
    pub fn get_output_path(item: &JobItem, destination: &Path) -> Result<PathBuf, ConvertError> {
        item.output_path(destination)
            .ok_or_else(|| ConvertError::DestinationWrite {
                path: destination.to_path_buf(),
                reason: format!("invalid file name: {}", item.source_path.display()),
            })
    }

    /// Crea la directory di destinazione se necessario
    pub async fn ensure_destination(destination: &Path) -> Result<(), ConvertError> {
        tokio::fs::create_dir_all(destination).await.map_err(|e| {
            ConvertError::DestinationWrite {
                path: destination.to_path_buf(),
                reason: format!("failed to create directory: {}", e),
            }
        })?;
        if !destination.is_dir() {
            return Err(ConvertError::DestinationWrite {
                path: destination.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Owner {
    id: u64,
    source_path: PathBuf,
}

/// Session-wide map from output path to the item that writes it
#[derive(Default)]
pub struct OutputOwners {
    owners: Mutex<HashMap<PathBuf, Owner>>,
}

impl OutputOwners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output path of every claimed item of a batch, in input order.
    ///
    /// A path already owned by another live item gives a `DestinationWrite` error.
    pub async fn assign(
        &self,
        items: Vec<JobItem>,
        destination: &Path,
        jobs: &JobList,
    ) -> Vec<(JobItem, Result<PathBuf, ConvertError>)> {
        let mut owners = self.owners.lock().await;
        let mut assigned = Vec::with_capacity(items.len());

        for item in items {
            let output = match PathResolver::get_output_path(&item, destination) {
                Ok(path) => Self::take(&mut owners, path, &item, jobs).await,
                Err(e) => Err(e),
            };
            assigned.push((item, output));
        }

        assigned
    }

    async fn take(
        owners: &mut HashMap<PathBuf, Owner>,
        path: PathBuf,
        item: &JobItem,
        jobs: &JobList,
    ) -> Result<PathBuf, ConvertError> {
        if let Some(owner) = owners.get(&path) {
            if owner.id != item.id && Self::is_live(owner, jobs).await {
                warn!(
                    "Output collision: {} and {} both map to {}",
                    owner.source_path.display(),
                    item.source_path.display(),
                    path.display()
                );
                return Err(ConvertError::DestinationWrite {
                    reason: format!("output path already used by {}", owner.source_path.display()),
                    path,
                });
            }
        }

        owners.insert(
            path.clone(),
            Owner {
                id: item.id,
                source_path: item.source_path.clone(),
            },
        );
        debug!("Resolved output path: {} -> {}", item.source_path.display(), path.display());
        Ok(path)
    }

    /// Owner still in the list and not failed
    async fn is_live(owner: &Owner, jobs: &JobList) -> bool {
        match jobs.get(&owner.source_path).await {
            Some(current) => current.id == owner.id && current.state != JobState::Fail,
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.owners.lock().await.len()
    }
}
