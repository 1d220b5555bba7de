//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione della conversione e le preferenze utente.
//!
//! ## Responsabilità:
//! - Definisce `ConversionConfig` (qualità + preset) catturata ad ogni submit
//! - Definisce `Preset` con i nomi persistiti (`default`, `picture`, ...)
//! - Fornisce validazione dei parametri (qualità 50-100, step 5)
//! - Supporta caricamento/salvataggio delle preferenze da/verso file JSON
//!
//! ## Parametri:
//! - `quality`: Qualità WebP (50-100, step 5, default: 80)
//! - `preset`: Profilo di tuning dell'encoder (default: `Default`)
//! - `workers`: Numero di worker paralleli (default: parallelismo disponibile)
//!
//! ## Esempio:
//! ```ignore
//! let config = ConversionConfig {
//!     quality: 85,
//!     preset: Preset::Photo,
//! };
//! config.validate()?;
//! ```

use crate::error::ConvertError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const MIN_QUALITY: u8 = 50;
pub const MAX_QUALITY: u8 = 100;
pub const QUALITY_STEP: u8 = 5;
pub const DEFAULT_QUALITY: u8 = 80;

/// Encoder tuning profile
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Default,
    Picture,
    Photo,
    Drawing,
    Icon,
    Text,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Default,
        Preset::Picture,
        Preset::Photo,
        Preset::Drawing,
        Preset::Icon,
        Preset::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Picture => "picture",
            Preset::Photo => "photo",
            Preset::Drawing => "drawing",
            Preset::Icon => "icon",
            Preset::Text => "text",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == s)
            .ok_or_else(|| ConvertError::Validation(format!("unknown preset: {}", s)))
    }
}

/// Settings captured at submission time and passed untouched to every task of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// WebP quality (50-100, step 5)
    pub quality: u8,
    /// Encoder tuning profile
    pub preset: Preset,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            preset: Preset::Default,
        }
    }
}

impl ConversionConfig {
    /// Validate conversion parameters
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(ConvertError::Validation(format!(
                "quality must be between {} and {}, got {}",
                MIN_QUALITY, MAX_QUALITY, self.quality
            )));
        }

        if self.quality % QUALITY_STEP != 0 {
            return Err(ConvertError::Validation(format!(
                "quality must be a multiple of {}, got {}",
                QUALITY_STEP, self.quality
            )));
        }

        Ok(())
    }
}

/// User preferences persisted across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quality: u8,
    pub preset: Preset,
    /// Number of parallel workers (None = available parallelism)
    pub workers: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            preset: Preset::Default,
            workers: None,
        }
    }
}

impl Settings {
    /// Conversion config derived from the stored preferences
    pub fn conversion_config(&self) -> ConversionConfig {
        ConversionConfig {
            quality: self.quality,
            preset: self.preset,
        }
    }

    /// Validate stored preferences
    pub fn validate(&self) -> Result<()> {
        self.conversion_config().validate()?;

        if self.workers == Some(0) {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        Ok(())
    }

    /// Default location: `~/.webp-express/settings.json`
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
            .join(".webp-express")
            .join("settings.json"))
    }

    /// Load settings from file, defaults if missing
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Default worker count: one per available core
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = ConversionConfig::default();
        assert!(config.validate().is_ok());

        config.quality = 45;
        assert!(config.validate().is_err());

        config.quality = 105;
        assert!(config.validate().is_err());

        config.quality = 82;
        assert!(config.validate().is_err());

        config.quality = 50;
        assert!(config.validate().is_ok());

        config.quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_default() {
        let config = ConversionConfig::default();
        assert_eq!(config.quality, 80);
        assert_eq!(config.preset, Preset::Default);
    }

    #[test]
    fn test_preset_names() {
        for preset in Preset::ALL {
            assert_eq!(preset.as_str().parse::<Preset>().unwrap(), preset);
        }
        assert!("vector".parse::<Preset>().is_err());
        assert_eq!(serde_json::to_string(&Preset::Drawing).unwrap(), "\"drawing\"");
    }

    #[tokio::test]
    async fn test_settings_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("nested").join("settings.json");

        let original = Settings {
            quality: 65,
            preset: Preset::Icon,
            workers: Some(3),
        };

        original.save_to_file(&settings_path).await.unwrap();
        let loaded = Settings::from_file(&settings_path).await.unwrap();

        assert_eq!(loaded, original);
        assert_eq!(loaded.conversion_config().preset, Preset::Icon);
    }

    #[tokio::test]
    async fn test_settings_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Settings::from_file(&temp_dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[tokio::test]
    async fn test_settings_rejects_invalid_quality() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        tokio::fs::write(&settings_path, r#"{"quality": 42, "preset": "photo"}"#)
            .await
            .unwrap();

        assert!(Settings::from_file(&settings_path).await.is_err());
    }
}
