// Image loading module
// Models uploaded files and decodes them into RGBA surfaces

use crate::bounded::run_with_timeout;
use crate::error::{QrFrameError, Result};
use image::{DynamicImage, RgbaImage};
use log::debug;
use resvg::{tiny_skia, usvg};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_SVG: &str = "image/svg+xml";

/// A file picked by the user, as the upload control hands it over
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    /// Declared MIME type
    pub mime: String,
    pub data: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data,
        }
    }

    /// Read a file from disk, deriving its MIME type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "logo".to_string());
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(mime_from_extension)
            .unwrap_or("application/octet-stream");

        Ok(Self::new(name, mime, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_svg(&self) -> bool {
        self.mime == MIME_SVG
    }
}

/// Get the MIME type for a file extension
pub fn mime_from_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => MIME_PNG,
        "jpg" | "jpeg" => MIME_JPEG,
        "svg" => MIME_SVG,
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// A decoded image ready to be drawn
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub image: RgbaImage,
    /// Intrinsic size; differs from the raster size for vector sources
    pub natural_width: u32,
    pub natural_height: u32,
}

impl LoadedImage {
    fn from_raster(img: DynamicImage) -> Self {
        let image = img.to_rgba8();
        let (natural_width, natural_height) = image.dimensions();
        Self {
            image,
            natural_width,
            natural_height,
        }
    }
}

/// Decode encoded image bytes of the declared `mime` type, giving up after `timeout`.
///
/// SVG input is rasterized; anything else goes through format detection.
pub fn load_image(data: Vec<u8>, mime: &str, svg_raster_size: u32, timeout: Duration) -> Result<LoadedImage> {
    let is_svg = mime == MIME_SVG;
    run_with_timeout("image decode", timeout, move || {
        if is_svg {
            rasterize_svg(&data, svg_raster_size)
        } else {
            load_from_bytes(&data).map(LoadedImage::from_raster)
        }
    })
}

/// Load an image from raw bytes, auto-detecting the format
fn load_from_bytes(data: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(data)
        .map_err(|e| QrFrameError::Resource(format!("failed to detect image format: {e}")))?;
    let img = image::load(Cursor::new(data), format)?;
    debug!("Decoded {:?} image {}x{}", format, img.width(), img.height());
    Ok(img)
}

/// Render a vector image so its longest edge is `raster_size`
fn rasterize_svg(data: &[u8], raster_size: u32) -> Result<LoadedImage> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|e| QrFrameError::Resource(format!("invalid SVG: {e}")))?;

    let svg_size = tree.size();
    let natural_width = svg_size.width().round().max(1.0) as u32;
    let natural_height = svg_size.height().round().max(1.0) as u32;

    let scale = raster_size as f32 / svg_size.width().max(svg_size.height());
    let width = (svg_size.width() * scale).round().max(1.0) as u32;
    let height = (svg_size.height() * scale).round().max(1.0) as u32;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| QrFrameError::Resource("failed to allocate SVG surface".to_string()))?;
    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    let image = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| QrFrameError::Resource("SVG surface size mismatch".to_string()))?;

    Ok(LoadedImage {
        image,
        natural_width,
        natural_height,
    })
}
