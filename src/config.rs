// Configuration module
// All tunables for rendering, uploads, compression and timing

use crate::bitmap::EccLevel;
use crate::color::HexColor;
use crate::compressor::OutputFormat;
use crate::error::{QrFrameError, Result};
use std::time::Duration;

/// QR bitmap acquisition settings
#[derive(Debug, Clone)]
pub struct QrConfig {
    /// Edge of the generated bitmap in pixels
    pub bitmap_size: u32,
    pub correction_level: EccLevel,
    /// How long acquisition may take before it is treated as failed
    pub acquire_timeout: Duration,
}

/// Composition geometry, in logical pixels of the reference size
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    pub preview_size: u32,
    /// Size all other canvas values are expressed against
    pub reference_size: u32,
    pub padding: f32,
    pub wrapper_padding: f32,
    pub logo_background_padding: f32,
    pub text_zone_height: f32,
    pub wrapper_radius: f32,
    pub logo_radius: f32,
    pub caption_margin: f32,
    pub caption_font_size: f32,
    /// Absolute floor in output pixels, not scaled
    pub caption_min_font_size: f32,
    pub line_height: f32,
    /// Accepted download resolutions, inclusive
    pub min_download_size: u32,
    pub max_download_size: u32,
}

#[derive(Debug, Clone)]
pub struct LogoConfig {
    pub max_size_mb: f64,
    /// Logo edge relative to the wrapper edge
    pub size_ratio: f32,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub decode_timeout: Duration,
    /// Longest edge used when rasterizing vector logos
    pub svg_raster_size: u32,
}

#[derive(Debug, Clone)]
pub struct CompressionConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality in 0.0..=1.0
    pub quality: f32,
    pub format: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct TimingConfig {
    pub debounce_delay: Duration,
    pub error_display: Duration,
    pub success_display: Duration,
    /// Minimum time a generate request stays "in flight"
    pub render_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_text_length: usize,
    pub supported_image_types: Vec<String>,
}

/// Fixed colors of the composition
#[derive(Debug, Clone)]
pub struct ColorConfig {
    pub default_template: HexColor,
    pub wrapper: HexColor,
    /// Wrapper color used when the template is already very light
    pub wrapper_light_fallback: HexColor,
    pub wrapper_luminance_threshold: f64,
    pub caption_dark: HexColor,
    pub caption_light: HexColor,
    pub caption_luminance_threshold: f64,
    pub logo_backing: HexColor,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub qr: QrConfig,
    pub canvas: CanvasConfig,
    pub logo: LogoConfig,
    pub compression: CompressionConfig,
    pub timing: TimingConfig,
    pub validation: ValidationConfig,
    pub colors: ColorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qr: QrConfig {
                bitmap_size: 500,
                correction_level: EccLevel::H,
                acquire_timeout: Duration::from_millis(100),
            },
            canvas: CanvasConfig {
                preview_size: 600,
                reference_size: 600,
                padding: 40.0,
                wrapper_padding: 15.0,
                logo_background_padding: 5.0,
                text_zone_height: 100.0,
                wrapper_radius: 12.0,
                logo_radius: 8.0,
                caption_margin: 50.0,
                caption_font_size: 38.0,
                caption_min_font_size: 12.0,
                line_height: 1.2,
                min_download_size: 100,
                max_download_size: 4096,
            },
            logo: LogoConfig {
                max_size_mb: 2.0,
                size_ratio: 0.25,
                min_aspect_ratio: 0.5,
                max_aspect_ratio: 2.0,
                decode_timeout: Duration::from_secs(10),
                svg_raster_size: 1024,
            },
            compression: CompressionConfig {
                max_width: 512,
                max_height: 512,
                quality: 0.8,
                format: OutputFormat::Jpeg,
            },
            timing: TimingConfig {
                debounce_delay: Duration::from_millis(400),
                error_display: Duration::from_millis(4000),
                success_display: Duration::from_millis(2000),
                render_delay: Duration::from_millis(400),
            },
            validation: ValidationConfig {
                max_text_length: 2000,
                supported_image_types: vec![
                    "image/png".to_string(),
                    "image/jpeg".to_string(),
                    "image/svg+xml".to_string(),
                ],
            },
            colors: ColorConfig {
                default_template: HexColor::new(0x0f, 0x17, 0x2a),
                wrapper: HexColor::new(0xf8, 0xfa, 0xfc),
                wrapper_light_fallback: HexColor::new(0xee, 0xee, 0xee),
                wrapper_luminance_threshold: 200.0,
                caption_dark: HexColor::new(0x0f, 0x17, 0x2a),
                caption_light: HexColor::new(0xf8, 0xfa, 0xfc),
                caption_luminance_threshold: 160.0,
                logo_backing: HexColor::WHITE,
            },
        }
    }
}

impl Config {
    /// Reject configurations the renderer cannot work with
    pub fn check(&self) -> Result<()> {
        let invalid = |what: &str| -> Result<()> {
            Err(QrFrameError::CriticalInit(format!("invalid configuration: {what}")))
        };

        if self.qr.bitmap_size == 0 {
            return invalid("qr bitmap size is zero");
        }
        if self.qr.acquire_timeout.is_zero() {
            return invalid("qr acquire timeout is zero");
        }
        if self.canvas.preview_size == 0 || self.canvas.reference_size == 0 {
            return invalid("canvas sizes must be non-zero");
        }
        if self.canvas.min_download_size == 0 || self.canvas.min_download_size > self.canvas.max_download_size {
            return invalid("download size bounds are invalid");
        }
        if self.compression.max_width == 0 || self.compression.max_height == 0 {
            return invalid("compression bounds must be non-zero");
        }
        if !(0.0..=1.0).contains(&self.compression.quality) {
            return invalid("compression quality must be within 0.0..=1.0");
        }
        if self.logo.min_aspect_ratio > self.logo.max_aspect_ratio {
            return invalid("logo aspect ratio bounds are inverted");
        }
        if self.validation.max_text_length == 0 {
            return invalid("max text length is zero");
        }
        Ok(())
    }

    /// Upload size limit in bytes
    pub fn max_logo_bytes(&self) -> u64 {
        (self.logo.max_size_mb * 1024.0 * 1024.0) as u64
    }
}
