use std::{fmt, path::Path, sync::Arc};

use image::{ImageFormat, RgbaImage};
use ndarray::Array2;
use serde::Serialize;

use crate::{analysis::ela::{HeatTier, normalize}, error::Result};

pub mod error;
pub mod image_utils;
pub mod analysis;
pub mod metadata;
pub mod detection;
pub mod session;
pub mod report;

pub use crate::{
    analysis::ela::{ElaEngine, JpegRecompressor, Recompressor},
    detection::{RiskAssessment, RiskRule, risk::RiskScorer},
    error::ForensicsError,
    metadata::exif::MetadataExtractor,
    session::{ForensicsSession, SessionEvent, SessionState},
};

/// Recompression quality that emphasizes editing artifacts better than near-lossless settings.
pub const DEFAULT_ELA_QUALITY: f32 = 0.85;

#[derive(Debug, Clone)]
pub struct ForensicsConfig {
    pub ela_quality: f32,
    pub parallel: bool,
    pub event_capacity: usize,
}

impl Default for ForensicsConfig {
    fn default() -> Self {
        Self {
            ela_quality: DEFAULT_ELA_QUALITY,
            parallel: true,
            event_capacity: 64,
        }
    }
}

/// Generation token handed out for every upload. A higher id always means a newer image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An uploaded image. Immutable once created and owned by the session that loaded it.
#[derive(Debug)]
pub struct ImageAsset {
    id: AssetId,
    bytes: Arc<[u8]>,
    mime_type: String,
    declared_format: Option<ImageFormat>,
}

impl ImageAsset {
    pub fn new(id: AssetId, bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let declared_format = ImageFormat::from_mime_type(&mime_type);

        Self {
            id,
            bytes: bytes.into(),
            mime_type,
            declared_format,
        }
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Format implied by the declared MIME type, not by sniffing the bytes.
    pub fn declared_format(&self) -> Option<ImageFormat> {
        self.declared_format
    }

    pub fn decode(&self) -> Result<RgbaImage> {
        image_utils::decode_rgba(&self.bytes)
    }
}

/// Capture provenance tags. `found == false` is evidence in its own right.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureMetadata {
    pub found: bool,
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub captured_at: Option<String>,
}

impl CaptureMetadata {
    pub fn absent() -> Self {
        Self::default()
    }

    /// "Make Model" line, if either tag is present.
    pub fn camera_label(&self) -> Option<String> {
        let parts = [self.make.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub low: usize,
    pub mid: usize,
    pub high: usize,
}

/// False-colored error level map. Always opaque and the same size as its source image.
#[derive(Debug, Clone)]
pub struct ElaHeatmap {
    pub image: RgbaImage,
    pub error_levels: Array2<f64>,
    pub max_delta: f64,
    pub quality: f32,
}

impl ElaHeatmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Normalized error level in `[0, 255]`, or `None` outside the image.
    pub fn normalized_at(&self, x: u32, y: u32) -> Option<f64> {
        self.error_levels
            .get((y as usize, x as usize))
            .map(|&delta| normalize(delta, self.max_delta))
    }

    pub fn tier_counts(&self) -> TierCounts {
        let mut counts = TierCounts::default();

        for &delta in self.error_levels.iter() {
            match HeatTier::classify(normalize(delta, self.max_delta)) {
                HeatTier::Low => counts.low += 1,
                HeatTier::Mid => counts.mid += 1,
                HeatTier::High => counts.high += 1,
            }
        }

        counts
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }
}
