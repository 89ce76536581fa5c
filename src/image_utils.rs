use std::io::Cursor;

use image::{ImageFormat, ImageReader, Rgb, RgbImage, RgbaImage};

use crate::error::{ForensicsError, Result};

/// Sniffs the container format and reads the header dimensions without decoding pixels.
pub fn read_header(bytes: &[u8]) -> Result<(ImageFormat, u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;

    let format = reader
        .format()
        .ok_or_else(|| ForensicsError::Undecodable("unrecognized image format".into()))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ForensicsError::Undecodable(e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(ForensicsError::Undecodable(format!(
            "empty image ({}x{})",
            width, height
        )));
    }

    Ok((format, width, height))
}

pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ForensicsError::Undecodable(e.to_string()))?;

    Ok(image.to_rgba8())
}

/// Drops the alpha channel as-is; no compositing against a background.
pub fn rgba_to_rgb(image: &RgbaImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut rgb = RgbImage::new(width, height);

    for (dst, src) in rgb.pixels_mut().zip(image.pixels()) {
        *dst = Rgb([src[0], src[1], src[2]]);
    }

    rgb
}

pub fn aspect_ratio(width: u32, height: u32) -> Option<f64> {
    if height == 0 {
        None
    } else {
        Some(width as f64 / height as f64)
    }
}

/// Ratio strictly inside `(0.95, 1.05)`.
pub fn is_near_square(width: u32, height: u32) -> bool {
    aspect_ratio(width, height)
        .map(|ratio| ratio > 0.95 && ratio < 1.05)
        .unwrap_or(false)
}

/// Byte-clamped channel store: clamp to `[0, 255]`, round half to even.
pub fn to_channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0).round_ties_even() as u8
}
