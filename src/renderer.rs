// QR renderer module
// Composites template background, QR wrapper, logo and caption onto a surface

use crate::bitmap::{BitmapSource, QrBitmapGenerator};
use crate::canvas::{draw_image, fill, fill_rounded_rect};
use crate::color::HexColor;
use crate::config::{CanvasConfig, ColorConfig, Config};
use crate::error::{Result, ValidationError};
use crate::memory::MemoryManager;
use crate::text::{CaptionLayout, TextRasterizer};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use log::{debug, info, warn};
use std::sync::Arc;

/// Everything a composition depends on
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub text: &'a str,
    pub template_text: &'a str,
    pub template_color: HexColor,
    pub logo: Option<&'a RgbaImage>,
    /// Output edge in pixels
    pub size: u32,
}

impl RenderRequest<'_> {
    pub fn has_caption(&self) -> bool {
        !self.template_text.trim().is_empty()
    }
}

/// Geometry of one composition, all values in output pixels.
///
/// Every quantity is a reference-size value multiplied by `scale`, so the
/// output looks the same at any resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionLayout {
    pub size: f32,
    pub scale: f32,
    pub padding: f32,
    pub text_zone_height: f32,
    pub wrapper_x: f32,
    pub wrapper_y: f32,
    pub wrapper_size: f32,
    pub wrapper_radius: f32,
    /// Inset of the QR bitmap inside the wrapper
    pub qr_inset: f32,
    pub logo_size: f32,
    pub logo_x: f32,
    pub logo_y: f32,
    pub logo_padding: f32,
    pub logo_radius: f32,
    pub caption_center_x: f32,
    pub caption_center_y: f32,
    pub caption_max_width: f32,
    pub caption_font_size: f32,
}

impl CompositionLayout {
    pub fn compute(size: u32, has_caption: bool, canvas: &CanvasConfig, logo_ratio: f32) -> Self {
        let size = size as f32;
        let scale = size / canvas.reference_size as f32;
        let text_zone_height = if has_caption { canvas.text_zone_height * scale } else { 0.0 };
        let padding = canvas.padding * scale;

        let wrapper_size = size - padding * 2.0 - text_zone_height;
        let wrapper_x = (size - wrapper_size) / 2.0;
        let wrapper_y = padding;

        let logo_size = wrapper_size * logo_ratio;

        Self {
            size,
            scale,
            padding,
            text_zone_height,
            wrapper_x,
            wrapper_y,
            wrapper_size,
            wrapper_radius: canvas.wrapper_radius * scale,
            qr_inset: canvas.wrapper_padding * scale,
            logo_size,
            logo_x: (size - logo_size) / 2.0,
            logo_y: wrapper_y + (wrapper_size - logo_size) / 2.0,
            logo_padding: canvas.logo_background_padding * scale,
            logo_radius: canvas.logo_radius * scale,
            caption_center_x: size / 2.0,
            caption_center_y: size - text_zone_height / 2.0,
            caption_max_width: size - canvas.caption_margin * scale,
            caption_font_size: canvas.caption_font_size * scale,
        }
    }

    /// Edge of the square the QR bitmap is drawn into
    pub fn qr_size(&self) -> f32 {
        self.wrapper_size - self.qr_inset * 2.0
    }
}

/// Wrapper background: a light gray when the template is already very light
pub fn wrapper_color(template: HexColor, colors: &ColorConfig) -> HexColor {
    if template.luminance() > colors.wrapper_luminance_threshold {
        colors.wrapper_light_fallback
    } else {
        colors.wrapper
    }
}

/// Caption color that stays legible on the template background
pub fn caption_color(template: HexColor, colors: &ColorConfig) -> HexColor {
    if template.luminance() > colors.caption_luminance_threshold {
        colors.caption_dark
    } else {
        colors.caption_light
    }
}

/// Draws complete compositions at any pixel size
#[derive(Clone)]
pub struct QrRenderer {
    canvas: CanvasConfig,
    colors: ColorConfig,
    logo_ratio: f32,
    bitmaps: BitmapSource,
}

impl QrRenderer {
    pub fn new(config: &Config, generator: Arc<dyn QrBitmapGenerator>) -> Self {
        Self {
            canvas: config.canvas.clone(),
            colors: config.colors.clone(),
            logo_ratio: config.logo.size_ratio,
            bitmaps: BitmapSource::new(
                generator,
                config.qr.bitmap_size,
                config.qr.correction_level,
                config.qr.acquire_timeout,
            ),
        }
    }

    pub fn layout(&self, request: &RenderRequest<'_>) -> CompositionLayout {
        CompositionLayout::compute(request.size, request.has_caption(), &self.canvas, self.logo_ratio)
    }

    /// Render `request` into `surface`, resizing it to `request.size` square.
    ///
    /// Any failure aborts the composition; the surface is then left in an
    /// unspecified state and must not be shown.
    pub fn render(
        &self,
        surface: &mut RgbaImage,
        request: &RenderRequest<'_>,
        text: &mut dyn TextRasterizer,
        memory: &mut MemoryManager,
    ) -> Result<()> {
        let payload = request.text.trim();
        if payload.is_empty() {
            warn!("Attempted to render a QR code without text");
            return Err(ValidationError::EmptyText.into());
        }
        if request.size == 0 {
            return Err(ValidationError::InvalidResolution(0).into());
        }

        debug!(
            "Rendering QR code: text {:?}, size {}",
            payload.chars().take(50).collect::<String>(),
            request.size
        );

        if surface.dimensions() != (request.size, request.size) {
            *surface = RgbaImage::new(request.size, request.size);
        }
        fill(surface, request.template_color.to_rgba());

        let bitmap = self.bitmaps.acquire(payload, memory)?;
        let layout = self.layout(request);

        let wrapper = wrapper_color(request.template_color, &self.colors);
        fill_rounded_rect(
            surface,
            layout.wrapper_x,
            layout.wrapper_y,
            layout.wrapper_size,
            layout.wrapper_size,
            layout.wrapper_radius,
            wrapper.to_rgba(),
        );

        let qr = DynamicImage::ImageLuma8(bitmap).into_rgba8();
        draw_image(
            surface,
            &qr,
            layout.wrapper_x + layout.qr_inset,
            layout.wrapper_y + layout.qr_inset,
            layout.qr_size(),
            layout.qr_size(),
            FilterType::Nearest,
        );

        if let Some(logo) = request.logo {
            self.draw_logo(surface, logo, &layout);
        }

        if request.has_caption() {
            let caption = CaptionLayout::compute(
                text,
                request.template_text.trim(),
                layout.caption_max_width,
                layout.caption_font_size,
                self.canvas.caption_min_font_size,
                self.canvas.line_height,
            );
            let color = caption_color(request.template_color, &self.colors);
            caption.draw(text, surface, layout.caption_center_x, layout.caption_center_y, color);
        }

        info!("QR code rendered at {}x{}", request.size, request.size);
        Ok(())
    }

    fn draw_logo(&self, surface: &mut RgbaImage, logo: &RgbaImage, layout: &CompositionLayout) {
        let pad = layout.logo_padding;
        fill_rounded_rect(
            surface,
            layout.logo_x - pad,
            layout.logo_y - pad,
            layout.logo_size + pad * 2.0,
            layout.logo_size + pad * 2.0,
            layout.logo_radius,
            self.colors.logo_backing.to_rgba(),
        );
        draw_image(
            surface,
            logo,
            layout.logo_x,
            layout.logo_y,
            layout.logo_size,
            layout.logo_size,
            FilterType::Lanczos3,
        );
    }
}
