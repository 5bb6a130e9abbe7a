// Preview module
// Keeps the fixed-size preview surface in sync with the current state

use crate::error::Result;
use crate::memory::MemoryManager;
use crate::renderer::{QrRenderer, RenderRequest};
use crate::text::TextRasterizer;
use image::RgbaImage;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// No text; the preview is hidden
    Hidden,
    Rendered,
}

/// Owner of the single shared preview surface
pub struct PreviewManager {
    size: u32,
    surface: RgbaImage,
    visible: bool,
    renders: u64,
}

impl PreviewManager {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            surface: RgbaImage::new(size, size),
            visible: false,
            renders: 0,
        }
    }

    /// Render `request` at the preview size, or hide the preview when there is no text
    pub fn render_preview(
        &mut self,
        renderer: &QrRenderer,
        request: RenderRequest<'_>,
        text: &mut dyn TextRasterizer,
        memory: &mut MemoryManager,
    ) -> Result<PreviewOutcome> {
        if request.text.trim().is_empty() {
            self.visible = false;
            return Ok(PreviewOutcome::Hidden);
        }

        self.visible = true;
        let request = RenderRequest {
            size: self.size,
            ..request
        };
        renderer.render(&mut self.surface, &request, text, memory)?;
        self.renders += 1;
        debug!("Preview rendered (#{})", self.renders);
        Ok(PreviewOutcome::Rendered)
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of completed preview renders
    pub fn renders(&self) -> u64 {
        self.renders
    }
}
