// Caption text module
// Fits, wraps and rasterizes the caption drawn under the QR code

use crate::canvas::{blend_pixel, fill_rect};
use crate::color::HexColor;
use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use image::{Rgba, RgbaImage};
use log::debug;

/// Measures and draws single lines of text
pub trait TextRasterizer {
    /// Advance width of `text` set on one line at `font_size`
    fn measure(&mut self, text: &str, font_size: f32) -> f32;

    /// Draw `text` centered on `center_x` with its baseline at `baseline_y`
    fn draw_centered(
        &mut self,
        surface: &mut RgbaImage,
        text: &str,
        center_x: f32,
        baseline_y: f32,
        font_size: f32,
        color: HexColor,
    );
}

/// Caption broken into lines at a chosen font size
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub font_size: f32,
    pub line_height: f32,
    pub lines: Vec<String>,
}

impl CaptionLayout {
    /// Lay out `text` for `max_width`, shrinking from `initial_size` down to `min_size`
    pub fn compute(
        rasterizer: &mut dyn TextRasterizer,
        text: &str,
        max_width: f32,
        initial_size: f32,
        min_size: f32,
        line_height_factor: f32,
    ) -> Self {
        let font_size = fit_font_size(rasterizer, text, max_width, initial_size, min_size);
        let lines = wrap_lines(rasterizer, text, max_width, font_size);
        Self {
            font_size,
            line_height: font_size * line_height_factor,
            lines,
        }
    }

    /// Baselines of every line for a block vertically centered on `center_y`
    pub fn baselines(&self, center_y: f32) -> Vec<f32> {
        let lh = self.line_height;
        let total = self.lines.len() as f32 * lh;
        let start = center_y - total / 2.0 + lh / 2.0 - lh * 0.1;
        (0..self.lines.len()).map(|i| start + i as f32 * lh).collect()
    }

    pub fn draw(
        &self,
        rasterizer: &mut dyn TextRasterizer,
        surface: &mut RgbaImage,
        center_x: f32,
        center_y: f32,
        color: HexColor,
    ) {
        for (line, baseline) in self.lines.iter().zip(self.baselines(center_y)) {
            rasterizer.draw_centered(surface, line.trim(), center_x, baseline, self.font_size, color);
        }
    }
}

/// Shrink one pixel at a time while the whole text is wider than `max_width`.
///
/// Shrinking stops at `min_size`; a start already at or below it is kept.
pub fn fit_font_size(
    rasterizer: &mut dyn TextRasterizer,
    text: &str,
    max_width: f32,
    initial_size: f32,
    min_size: f32,
) -> f32 {
    let mut size = initial_size;
    while rasterizer.measure(text, size) > max_width && size > min_size {
        size = (size - 1.0).max(min_size);
    }
    size
}

/// Greedy word wrap on single spaces. A word wider than the line stays on its own line.
pub fn wrap_lines(rasterizer: &mut dyn TextRasterizer, text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for (n, word) in text.split(' ').enumerate() {
        let candidate = format!("{line}{word} ");
        if n > 0 && rasterizer.measure(&candidate, font_size) > max_width {
            lines.push(std::mem::take(&mut line));
            line = format!("{word} ");
        } else {
            line = candidate;
        }
    }
    lines.push(line);

    lines.into_iter().map(|l| l.trim().to_string()).collect()
}

/// Bold sans-serif text through cosmic-text
pub struct CosmicTextRasterizer {
    font_system: FontSystem,
    cache: SwashCache,
}

impl CosmicTextRasterizer {
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            cache: SwashCache::new(),
        }
    }

    /// Whether any font face was found on this system
    pub fn has_fonts(&self) -> bool {
        self.font_system.db().faces().next().is_some()
    }

    fn shape(&mut self, text: &str, font_size: f32) -> Buffer {
        let mut buffer = Buffer::new(&mut self.font_system, Metrics::new(font_size, font_size * 1.2));
        buffer.set_size(&mut self.font_system, None, None);
        let attrs = Attrs::new().family(Family::SansSerif).weight(Weight::BOLD);
        buffer.set_text(&mut self.font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);
        buffer
    }
}

impl Default for CosmicTextRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRasterizer for CosmicTextRasterizer {
    fn measure(&mut self, text: &str, font_size: f32) -> f32 {
        let buffer = self.shape(text, font_size);
        buffer.layout_runs().fold(0.0f32, |w, run| w.max(run.line_w))
    }

    fn draw_centered(
        &mut self,
        surface: &mut RgbaImage,
        text: &str,
        center_x: f32,
        baseline_y: f32,
        font_size: f32,
        color: HexColor,
    ) {
        let buffer = self.shape(text, font_size);
        let Some((line_w, line_y)) = buffer.layout_runs().next().map(|run| (run.line_w, run.line_y)) else {
            return;
        };
        let offset_x = (center_x - line_w / 2.0).round() as i32;
        let offset_y = (baseline_y - line_y).round() as i32;

        buffer.draw(
            &mut self.font_system,
            &mut self.cache,
            Color::rgb(color.r, color.g, color.b),
            |x, y, w, h, c| {
                for dy in 0..h as i32 {
                    for dx in 0..w as i32 {
                        let px = x + dx + offset_x;
                        let py = y + dy + offset_y;
                        if px >= 0 && py >= 0 {
                            blend_pixel(surface, px as u32, py as u32, Rgba([c.r(), c.g(), c.b(), c.a()]));
                        }
                    }
                }
            },
        );
        debug!("Drew caption line {:?} at size {:.1}", text, font_size);
    }
}

/// Metrics-only stand-in used when no fonts are installed.
///
/// Every character advances `advance * font_size` and is drawn as a solid block.
#[derive(Debug, Clone, Copy)]
pub struct BlockRasterizer {
    pub advance: f32,
}

impl Default for BlockRasterizer {
    fn default() -> Self {
        Self { advance: 0.6 }
    }
}

impl TextRasterizer for BlockRasterizer {
    fn measure(&mut self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.advance
    }

    fn draw_centered(
        &mut self,
        surface: &mut RgbaImage,
        text: &str,
        center_x: f32,
        baseline_y: f32,
        font_size: f32,
        color: HexColor,
    ) {
        let advance = font_size * self.advance;
        let mut x = center_x - self.measure(text, font_size) / 2.0;
        let glyph_height = font_size * 0.7;
        for ch in text.chars() {
            if !ch.is_whitespace() {
                fill_rect(surface, x + advance * 0.1, baseline_y - glyph_height, advance * 0.8, glyph_height, color.to_rgba());
            }
            x += advance;
        }
    }
}
