//! # Encoder Adapter Module
//!
//! Questo modulo incapsula il codec WebP dietro un'interfaccia pura.
//!
//! ## Responsabilità:
//! - Decodifica i byte sorgente con il crate `image` (JPEG, PNG, GIF, BMP, TIFF, WebP)
//! - Codifica in WebP lossy con `libwebp` applicando qualità e preset
//! - Nessun I/O: lettura sorgente e scrittura destinazione spettano al worker,
//!   così errori di encoding e di I/O restano distinguibili
//!
//! ## Preset:
//! I preset replicano la tabella di tuning di libwebp (`WebPConfigPreset`):
//!
//! | Preset  | sns | filter | sharpness | note                     |
//! |---------|-----|--------|-----------|--------------------------|
//! | default | -   | -      | -         | valori di libwebp        |
//! | picture | 80  | 35     | 4         | ritratti, interni        |
//! | photo   | 80  | 30     | 3         | foto outdoor, grain      |
//! | drawing | 25  | 10     | 6         | disegni, alto contrasto  |
//! | icon    | 0   | 0      | -         | icone piccole            |
//! | text    | 0   | 0      | -         | testo, 2 segmenti        |

use crate::config::{ConversionConfig, Preset};
use crate::error::ConvertError;
use std::ops::Deref;
use tracing::debug;

/// Turns raw image bytes into encoded bytes. Implementations must not touch the filesystem.
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, image_bytes: &[u8], config: &ConversionConfig) -> Result<Vec<u8>, ConvertError>;
}

/// libwebp tuning overrides for one preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetTuning {
    pub sns_strength: Option<i32>,
    pub filter_strength: Option<i32>,
    pub filter_sharpness: Option<i32>,
    /// `Some(true)` sets the pseudo-random dithering bit, `Some(false)` clears it
    pub dithering: Option<bool>,
    pub segments: Option<i32>,
}

impl PresetTuning {
    const NONE: PresetTuning = PresetTuning {
        sns_strength: None,
        filter_strength: None,
        filter_sharpness: None,
        dithering: None,
        segments: None,
    };

    pub fn for_preset(preset: Preset) -> Self {
        match preset {
            Preset::Default => Self::NONE,
            Preset::Picture => Self {
                sns_strength: Some(80),
                filter_strength: Some(35),
                filter_sharpness: Some(4),
                dithering: Some(false),
                ..Self::NONE
            },
            Preset::Photo => Self {
                sns_strength: Some(80),
                filter_strength: Some(30),
                filter_sharpness: Some(3),
                dithering: Some(true),
                ..Self::NONE
            },
            Preset::Drawing => Self {
                sns_strength: Some(25),
                filter_strength: Some(10),
                filter_sharpness: Some(6),
                ..Self::NONE
            },
            Preset::Icon => Self {
                sns_strength: Some(0),
                filter_strength: Some(0),
                dithering: Some(false),
                ..Self::NONE
            },
            Preset::Text => Self {
                sns_strength: Some(0),
                filter_strength: Some(0),
                dithering: Some(false),
                segments: Some(2),
                ..Self::NONE
            },
        }
    }
}

/// Lossy WebP encoder backed by libwebp
#[derive(Debug, Default, Clone, Copy)]
pub struct WebpEncoder;

impl WebpEncoder {
    pub fn new() -> Self {
        Self
    }

    fn webp_config(config: &ConversionConfig) -> Result<webp::WebPConfig, ConvertError> {
        let mut webp_config = webp::WebPConfig::new()
            .map_err(|_| ConvertError::Encode("failed to initialize libwebp config".to_string()))?;
        webp_config.lossless = 0;
        webp_config.alpha_compression = 1;
        webp_config.quality = config.quality as f32;

        let tuning = PresetTuning::for_preset(config.preset);
        if let Some(sns) = tuning.sns_strength {
            webp_config.sns_strength = sns;
        }
        if let Some(strength) = tuning.filter_strength {
            webp_config.filter_strength = strength;
        }
        if let Some(sharpness) = tuning.filter_sharpness {
            webp_config.filter_sharpness = sharpness;
        }
        match tuning.dithering {
            Some(true) => webp_config.preprocessing |= 2,
            Some(false) => webp_config.preprocessing &= !2,
            None => {}
        }
        if let Some(segments) = tuning.segments {
            webp_config.segments = segments;
        }

        Ok(webp_config)
    }
}

impl ImageEncoder for WebpEncoder {
    fn encode(&self, image_bytes: &[u8], config: &ConversionConfig) -> Result<Vec<u8>, ConvertError> {
        config.validate()?;

        let img = image::load_from_memory(image_bytes)?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!(
            "Encoding {}x{} image (quality {}, preset {})",
            width, height, config.quality, config.preset
        );

        let webp_config = Self::webp_config(config)?;
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), width, height);
        let encoded = encoder
            .encode_advanced(&webp_config)
            .map_err(|reason| ConvertError::Encode(format!("{:?}", reason)))?;

        // WebPMemory is !Send, copy out before leaving the blocking task
        Ok(encoded.deref().to_vec())
    }
}
