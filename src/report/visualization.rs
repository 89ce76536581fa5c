use image::{Rgba, RgbaImage};

use crate::{
    ElaHeatmap,
    analysis::ela::tier_color,
    error::{ForensicsError, Result},
};

/// Screen-blends the heatmap over the original photo so hot regions glow.
pub fn screen_blend(original: &RgbaImage, heatmap: &ElaHeatmap) -> Result<RgbaImage> {
    if original.dimensions() != heatmap.dimensions() {
        let (w, h) = original.dimensions();
        return Err(ForensicsError::InvalidParameter(format!(
            "heatmap is {}x{} but the original is {}x{}",
            heatmap.width(),
            heatmap.height(),
            w,
            h
        )));
    }

    let mut blended = RgbaImage::new(original.width(), original.height());

    for ((out, base), top) in blended
        .pixels_mut()
        .zip(original.pixels())
        .zip(heatmap.image.pixels())
    {
        *out = Rgba([
            screen(base[0], top[0]),
            screen(base[1], top[1]),
            screen(base[2], top[2]),
            255,
        ]);
    }

    Ok(blended)
}

fn screen(base: u8, top: u8) -> u8 {
    let (base, top) = (base as u32, top as u32);
    (255 - (255 - base) * (255 - top) / 255) as u8
}

/// Horizontal ramp across the full normalized range, for legends.
pub fn legend_strip(width: u32, height: u32) -> RgbaImage {
    let span = width.saturating_sub(1).max(1) as f64;

    RgbaImage::from_fn(width, height, |x, _| tier_color(x as f64 / span * 255.0))
}
