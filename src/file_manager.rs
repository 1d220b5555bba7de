//! # File Management Module
//!
//! Questo modulo gestisce la raccolta dei file di input passati dall'utente.
//!
//! ## Responsabilità:
//! - Determinazione del formato (solo immagini decodificabili)
//! - Espansione delle directory (solo primo livello, nessuna ricorsione)
//! - Deduplica e ordinamento dei path accettati
//! - Elenco dei path scartati con il motivo, per il report all'utente
//!
//! ## Formati supportati:
//! - **Immagini**: JPG, JPEG, PNG, WebP, GIF, BMP, TIFF
//!
//! ## Esempio:
//! ```ignore
//! let inputs = FileManager::collect_inputs(&args.files).await;
//! for (path, reason) in &inputs.skipped {
//!     warn!("Skipping {}: {}", path.display(), reason);
//! }
//! engine.add(inputs.accepted, AddPolicy::default()).await;
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// Result of input collection
#[derive(Debug, Default)]
pub struct CollectedInputs {
    /// Sorted, deduplicated image files
    pub accepted: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Check if a file is an image we can decode
    pub fn is_image(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
        } else {
            false
        }
    }

    /// Filter user-supplied paths down to existing image files.
    ///
    /// Directories contribute their direct image children.
    pub async fn collect_inputs(paths: &[PathBuf]) -> CollectedInputs {
        let mut accepted = BTreeSet::new();
        let mut skipped = Vec::new();

        for path in paths {
            let metadata = match fs::metadata(path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    skipped.push((path.clone(), e.to_string()));
                    continue;
                }
            };

            if metadata.is_dir() {
                match Self::images_in_directory(path).await {
                    Ok(found) => {
                        debug!("Found {} images in {}", found.len(), path.display());
                        accepted.extend(found);
                    }
                    Err(e) => skipped.push((path.clone(), e.to_string())),
                }
            } else if Self::is_image(path) {
                accepted.insert(path.clone());
            } else {
                skipped.push((path.clone(), "not a supported image".to_string()));
            }
        }

        CollectedInputs {
            accepted: accepted.into_iter().collect(),
            skipped,
        }
    }

    async fn images_in_directory(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && Self::is_image(&path) {
                found.push(path);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_image() {
        assert!(FileManager::is_image(Path::new("a.png")));
        assert!(FileManager::is_image(Path::new("/x/B.JPEG")));
        assert!(FileManager::is_image(Path::new("c.tiff")));
        assert!(!FileManager::is_image(Path::new("movie.mp4")));
        assert!(!FileManager::is_image(Path::new("README")));
    }

    #[tokio::test]
    async fn test_collect_inputs_filters_and_dedups() {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("b.png");
        let jpg = dir.path().join("a.jpg");
        let txt = dir.path().join("notes.txt");
        for path in [&png, &jpg, &txt] {
            fs::write(path, b"x").await.unwrap();
        }
        let missing = dir.path().join("missing.png");

        let inputs = FileManager::collect_inputs(&[
            png.clone(),
            txt.clone(),
            jpg.clone(),
            png.clone(),
            missing.clone(),
        ])
        .await;

        assert_eq!(inputs.accepted, vec![jpg, png]);
        let skipped: Vec<&PathBuf> = inputs.skipped.iter().map(|(p, _)| p).collect();
        assert_eq!(skipped, vec![&txt, &missing]);
    }

    #[tokio::test]
    async fn test_collect_inputs_expands_one_directory_level() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).await.unwrap();
        fs::write(dir.path().join("top.png"), b"x").await.unwrap();
        fs::write(dir.path().join("skip.txt"), b"x").await.unwrap();
        fs::write(nested.join("deep.png"), b"x").await.unwrap();

        let inputs = FileManager::collect_inputs(&[dir.path().to_path_buf()]).await;
        assert_eq!(inputs.accepted, vec![dir.path().join("top.png")]);
        assert!(inputs.skipped.is_empty());
    }
}
