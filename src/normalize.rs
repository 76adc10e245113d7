//! Upload normalization ahead of the image-to-image call.
//!
//! SDXL only accepts a fixed set of canvas sizes, so every upload is decoded,
//! fitted to the closest supported canvas, and re-encoded as PNG.

use std::io::Cursor;

use image::imageops::FilterType;
use image::ImageOutputFormat;

use crate::error::NormalizeError;

/// Canvas sizes accepted by the SDXL 1024 engines.
pub const SDXL_DIMENSIONS: [(u32, u32); 9] = [
    (1024, 1024),
    (1152, 896),
    (1216, 832),
    (1344, 768),
    (1536, 640),
    (640, 1536),
    (768, 1344),
    (832, 1216),
    (896, 1152),
];

/// A decoded, resized and PNG-encoded upload.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub const MIME_TYPE: &'static str = "image/png";
}

/// Pick the supported canvas whose aspect ratio is closest to `width / height`.
pub fn closest_canvas(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return SDXL_DIMENSIONS[0];
    }
    let ratio = width as f64 / height as f64;
    let mut best = SDXL_DIMENSIONS[0];
    let mut best_delta = f64::MAX;
    for (w, h) in SDXL_DIMENSIONS {
        let delta = (ratio - w as f64 / h as f64).abs();
        if delta < best_delta {
            best_delta = delta;
            best = (w, h);
        }
    }
    best
}

/// Decode `bytes`, fill the closest SDXL canvas (center crop), encode PNG.
pub fn normalize(bytes: &[u8]) -> Result<NormalizedImage, NormalizeError> {
    if bytes.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let img = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
    let (width, height) = closest_canvas(img.width(), img.height());
    tracing::debug!(
        src_width = img.width(),
        src_height = img.height(),
        width,
        height,
        "Resizing upload to SDXL canvas"
    );

    let resized = img.resize_to_fill(width, height, FilterType::Lanczos3);

    let mut png = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(NormalizeError::Encode)?;

    Ok(NormalizedImage {
        bytes: png,
        width,
        height,
    })
}
