// QR bitmap module
// Acquires QR module bitmaps from a generator under a bounded wait

use crate::bounded::run_with_timeout;
use crate::error::{QrFrameError, Result, ValidationError};
use crate::memory::MemoryManager;
use image::GrayImage;
use log::debug;
use qrcode::{Color, EcLevel, QrCode};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// QR error correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EccLevel {
    L,
    M,
    Q,
    H,
}

impl From<EccLevel> for EcLevel {
    fn from(level: EccLevel) -> Self {
        match level {
            EccLevel::L => EcLevel::L,
            EccLevel::M => EcLevel::M,
            EccLevel::Q => EcLevel::Q,
            EccLevel::H => EcLevel::H,
        }
    }
}

impl FromStr for EccLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "L" => Ok(EccLevel::L),
            "M" => Ok(EccLevel::M),
            "Q" => Ok(EccLevel::Q),
            "H" => Ok(EccLevel::H),
            other => Err(format!("unknown error correction level: {other}")),
        }
    }
}

impl fmt::Display for EccLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EccLevel::L => "L",
            EccLevel::M => "M",
            EccLevel::Q => "Q",
            EccLevel::H => "H",
        };
        f.write_str(name)
    }
}

/// Anything that can turn text into a square QR bitmap
pub trait QrBitmapGenerator: Send + Sync {
    /// Produce a `size` x `size` bitmap, dark modules black, light modules white
    fn generate(&self, text: &str, size: u32, level: EccLevel) -> Result<GrayImage>;
}

/// Generator backed by the `qrcode` crate, drawn without a quiet zone
#[derive(Debug, Default, Clone, Copy)]
pub struct QrCodeGenerator;

impl QrBitmapGenerator for QrCodeGenerator {
    fn generate(&self, text: &str, size: u32, level: EccLevel) -> Result<GrayImage> {
        if size == 0 {
            return Err(QrFrameError::Resource("QR bitmap size must be non-zero".to_string()));
        }

        let code = QrCode::with_error_correction_level(text.as_bytes(), level.into())
            .map_err(|e| QrFrameError::Resource(format!("QR encoding error: {e}")))?;
        let modules = code.width();
        let colors = code.to_colors();

        // Output pixel -> module index, shared by rows and columns
        let index: Vec<usize> = (0..size as usize)
            .map(|p| p * modules / size as usize)
            .collect();

        let mut pixels = vec![255u8; size as usize * size as usize];
        for (row, &my) in pixels.chunks_exact_mut(size as usize).zip(index.iter()) {
            let modules_row = &colors[my * modules..(my + 1) * modules];
            for (pixel, &mx) in row.iter_mut().zip(index.iter()) {
                if modules_row[mx] == Color::Dark {
                    *pixel = 0;
                }
            }
        }

        GrayImage::from_raw(size, size, pixels)
            .ok_or_else(|| QrFrameError::Resource("QR bitmap size mismatch".to_string()))
    }
}

/// Generator plus the parameters the renderer acquires bitmaps with
#[derive(Clone)]
pub struct BitmapSource {
    generator: Arc<dyn QrBitmapGenerator>,
    size: u32,
    level: EccLevel,
    timeout: Duration,
}

impl BitmapSource {
    pub fn new(generator: Arc<dyn QrBitmapGenerator>, size: u32, level: EccLevel, timeout: Duration) -> Self {
        Self {
            generator,
            size,
            level,
            timeout,
        }
    }

    pub fn level(&self) -> EccLevel {
        self.level
    }

    /// Generate the bitmap for `text` on a scratch surface tracked by `memory`.
    ///
    /// Fails with `Timeout` when the generator does not deliver in time; the
    /// scratch surface then stays tracked until the next cleanup.
    pub fn acquire(&self, text: &str, memory: &mut MemoryManager) -> Result<GrayImage> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText.into());
        }

        let (id, slot) = memory.add_temp_surface();
        let worker_slot = Arc::clone(&slot);
        let generator = Arc::clone(&self.generator);
        let text = text.to_string();
        let (size, level) = (self.size, self.level);

        run_with_timeout("QR bitmap generation", self.timeout, move || {
            let bitmap = generator.generate(&text, size, level)?;
            let mut surface = worker_slot
                .lock()
                .map_err(|_| QrFrameError::Resource("scratch surface poisoned".to_string()))?;
            *surface = Some(bitmap);
            Ok(())
        })?;

        let bitmap = slot
            .lock()
            .map_err(|_| QrFrameError::Resource("scratch surface poisoned".to_string()))?
            .take()
            .ok_or_else(|| QrFrameError::Resource("failed to generate QR code bitmap".to_string()))?;

        memory.release_surface(id);
        debug!("Acquired {}x{} QR bitmap on {:?}", bitmap.width(), bitmap.height(), id);
        Ok(bitmap)
    }
}
