// Image compression module
// Downscales and re-encodes uploaded logos before they are used

use crate::config::CompressionConfig;
use crate::error::{QrFrameError, Result};
use crate::image_loader::{ImageFile, MIME_JPEG, MIME_PNG};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::info;
use std::io::Cursor;

/// Encoding used for compressed rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => MIME_JPEG,
            OutputFormat::Png => MIME_PNG,
        }
    }
}

/// Encoded image data produced by [`compress`]
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub mime: String,
    pub data: Vec<u8>,
    /// Raster size after downscaling, `None` for pass-through vectors
    pub dimensions: Option<(u32, u32)>,
}

/// Fit `(width, height)` inside `max_width` x `max_height`, keeping the aspect ratio.
///
/// Only the larger side is checked against its bound; results are truncated
/// to whole pixels and never drop below one.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let (w, h) = if width > height {
        if width > max_width {
            (max_width as f64, h * max_width as f64 / w)
        } else {
            (w, h)
        }
    } else if height > max_height {
        (w * max_height as f64 / h, max_height as f64)
    } else {
        (w, h)
    };
    ((w as u32).max(1), (h as u32).max(1))
}

/// Compress an uploaded image. SVG input is returned unchanged.
pub fn compress(file: &ImageFile, options: &CompressionConfig) -> Result<CompressedImage> {
    if file.is_svg() {
        return Ok(CompressedImage {
            mime: file.mime.clone(),
            data: file.data.clone(),
            dimensions: None,
        });
    }

    let img = image::load_from_memory(&file.data)
        .map_err(|e| QrFrameError::Resource(format!("failed to load image for compression: {e}")))?;
    let (width, height) = fit_dimensions(img.width(), img.height(), options.max_width, options.max_height);
    let resized = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    let data = encode(&resized, options)?;
    if data.is_empty() {
        return Err(QrFrameError::Encoding("image compression produced no data".to_string()));
    }

    info!(
        "Image compressed: original {} bytes, compressed {} bytes, ratio {:.1}%",
        file.size(),
        data.len(),
        (1.0 - data.len() as f64 / file.size().max(1) as f64) * 100.0
    );

    Ok(CompressedImage {
        mime: options.format.mime().to_string(),
        data,
        dimensions: Some((width, height)),
    })
}

fn encode(img: &DynamicImage, options: &CompressionConfig) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match options.format {
        OutputFormat::Jpeg => {
            let quality = (options.quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality)
                .encode_image(&rgb)
                .map_err(|e| QrFrameError::Encoding(format!("JPEG encode failed: {e}")))?;
        }
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| QrFrameError::Encoding(format!("PNG encode failed: {e}")))?;
        }
    }
    Ok(buf)
}
