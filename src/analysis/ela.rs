use std::{io::Cursor, sync::Arc};

use image::{ImageFormat, Rgba, RgbImage, RgbaImage, codecs::jpeg::JpegEncoder};
use ndarray::Array2;
use rayon::prelude::*;

use crate::{
    DEFAULT_ELA_QUALITY, ElaHeatmap,
    error::{ForensicsError, Result},
    image_utils::{rgba_to_rgb, to_channel},
};

const LOW_TIER_CEILING: f64 = 40.0;
const MID_TIER_CEILING: f64 = 128.0;
const LOW_TIER_FLOOR: f64 = 20.0;

/// Lossy encode/decode round-trip used as the reference for error levels.
pub trait Recompressor: Send + Sync {
    /// `quality` is on a 0-1 scale. The result must have the input's dimensions.
    fn recompress(&self, image: &RgbImage, quality: f32) -> Result<RgbImage>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegRecompressor;

impl JpegRecompressor {
    pub fn jpeg_quality(quality: f32) -> u8 {
        (quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Recompressor for JpegRecompressor {
    fn recompress(&self, image: &RgbImage, quality: f32) -> Result<RgbImage> {
        let mut buffer = Cursor::new(Vec::new());

        let encoder = JpegEncoder::new_with_quality(&mut buffer, Self::jpeg_quality(quality));
        image
            .write_with_encoder(encoder)
            .map_err(|e| ForensicsError::Recompression(e.to_string()))?;

        let recompressed = image::load_from_memory_with_format(&buffer.into_inner(), ImageFormat::Jpeg)
            .map_err(|e| ForensicsError::Recompression(e.to_string()))?;

        Ok(recompressed.to_rgb8())
    }

    fn name(&self) -> &str {
        "jpeg"
    }
}

/// Three visual bands of the heatmap palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatTier {
    Low,
    Mid,
    High,
}

impl HeatTier {
    pub fn classify(normalized: f64) -> Self {
        if normalized < LOW_TIER_CEILING {
            HeatTier::Low
        } else if normalized < MID_TIER_CEILING {
            HeatTier::Mid
        } else {
            HeatTier::High
        }
    }
}

/// Maps a per-pixel delta onto `[0, 255]` against the image's own maximum.
pub fn normalize(delta: f64, max_delta: f64) -> f64 {
    delta / max_delta.max(1.0) * 255.0
}

pub fn tier_color(normalized: f64) -> Rgba<u8> {
    match HeatTier::classify(normalized) {
        HeatTier::Low => Rgba([0, 0, to_channel((normalized * 2.0).max(LOW_TIER_FLOOR)), 255]),
        HeatTier::Mid => Rgba([to_channel(normalized * 2.0), 0, to_channel(255.0 - normalized), 255]),
        HeatTier::High => Rgba([255, to_channel(normalized), to_channel(normalized), 255]),
    }
}

pub struct ElaEngine {
    quality: f32,
    parallel: bool,
    recompressor: Arc<dyn Recompressor>,
}

impl ElaEngine {
    pub fn new(quality: f32) -> Result<Self> {
        if !quality.is_finite() || quality <= 0.0 || quality > 1.0 {
            return Err(ForensicsError::InvalidParameter(format!(
                "ELA quality must be in (0, 1], got {}",
                quality
            )));
        }

        Ok(Self {
            quality,
            parallel: true,
            recompressor: Arc::new(JpegRecompressor),
        })
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_recompressor(mut self, recompressor: Arc<dyn Recompressor>) -> Self {
        self.recompressor = recompressor;
        self
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn run(&self, pixels: &RgbaImage) -> Result<ElaHeatmap> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(ForensicsError::InvalidParameter(format!(
                "cannot analyze an empty image ({}x{})",
                width, height
            )));
        }

        let original = rgba_to_rgb(pixels);
        let recompressed = self.recompressor.recompress(&original, self.quality)?;

        if recompressed.dimensions() != (width, height) {
            return Err(ForensicsError::Recompression(format!(
                "{} round-trip changed dimensions from {}x{} to {}x{}",
                self.recompressor.name(),
                width,
                height,
                recompressed.width(),
                recompressed.height()
            )));
        }

        let (deltas, max_delta) = self.error_levels(&original, &recompressed);
        let image = self.colorize(&deltas, max_delta, width);

        assert_eq!(image.dimensions(), (width, height), "heatmap must match its source");

        let error_levels = Array2::from_shape_vec((height as usize, width as usize), deltas)
            .map_err(|e| ForensicsError::AnalysisFailed(e.to_string()))?;

        log::debug!(
            "ELA {}x{} via {} at q={}: max delta {:.3}",
            width,
            height,
            self.recompressor.name(),
            self.quality,
            max_delta
        );

        Ok(ElaHeatmap {
            image,
            error_levels,
            max_delta,
            quality: self.quality,
        })
    }

    /// Per-pixel mean absolute RGB difference plus the global maximum, in one pass.
    fn error_levels(&self, original: &RgbImage, recompressed: &RgbImage) -> (Vec<f64>, f64) {
        let width = original.width() as usize;
        let mut deltas = vec![0.0f64; width * original.height() as usize];

        let row_bytes = width * 3;
        let max_delta = if self.parallel {
            deltas
                .par_chunks_mut(width)
                .zip(original.as_raw().par_chunks(row_bytes))
                .zip(recompressed.as_raw().par_chunks(row_bytes))
                .map(|((out, orig), recomp)| row_error_levels(out, orig, recomp))
                .reduce(|| 0.0, f64::max)
        } else {
            deltas
                .chunks_mut(width)
                .zip(original.as_raw().chunks(row_bytes))
                .zip(recompressed.as_raw().chunks(row_bytes))
                .map(|((out, orig), recomp)| row_error_levels(out, orig, recomp))
                .fold(0.0, f64::max)
        };

        (deltas, max_delta)
    }

    fn colorize(&self, deltas: &[f64], max_delta: f64, width: u32) -> RgbaImage {
        let height = deltas.len() as u32 / width;
        let mut image = RgbaImage::new(width, height);

        let paint = |(out, row): (&mut [u8], &[f64])| {
            for (px, &delta) in out.chunks_exact_mut(4).zip(row) {
                px.copy_from_slice(&tier_color(normalize(delta, max_delta)).0);
            }
        };

        let row_bytes = width as usize * 4;
        if self.parallel {
            image
                .par_chunks_mut(row_bytes)
                .zip(deltas.par_chunks(width as usize))
                .for_each(paint);
        } else {
            image
                .chunks_mut(row_bytes)
                .zip(deltas.chunks(width as usize))
                .for_each(paint);
        }

        image
    }
}

impl Default for ElaEngine {
    fn default() -> Self {
        Self {
            quality: DEFAULT_ELA_QUALITY,
            parallel: true,
            recompressor: Arc::new(JpegRecompressor),
        }
    }
}

fn row_error_levels(out: &mut [f64], original: &[u8], recompressed: &[u8]) -> f64 {
    let mut row_max = 0.0f64;

    for ((delta, orig), recomp) in out
        .iter_mut()
        .zip(original.chunks_exact(3))
        .zip(recompressed.chunks_exact(3))
    {
        let sum = orig
            .iter()
            .zip(recomp)
            .map(|(&a, &b)| (a as i32 - b as i32).abs())
            .sum::<i32>();

        *delta = sum as f64 / 3.0;
        row_max = row_max.max(*delta);
    }

    row_max
}
