// Error module
// Error taxonomy shared by all components

use std::time::Duration;
use thiserror::Error;

/// Bad user input. The message is shown as-is to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please enter a text or URL.")]
    EmptyText,
    #[error("Text too long. Maximum: {max} characters.")]
    TextTooLong { max: usize },
    #[error("No file selected.")]
    NoFile,
    #[error("Invalid format. Use PNG, JPG or SVG.")]
    UnsupportedType { mime: String },
    #[error("File too large. Maximum: {max_mb}MB.")]
    FileTooLarge { max_mb: f64 },
    #[error("The image must be roughly square.")]
    NotSquare { ratio: f64 },
    #[error("Invalid color: {0}")]
    InvalidColor(String),
    #[error("Invalid resolution: {0}")]
    InvalidResolution(u32),
}

#[derive(Debug, Error)]
pub enum QrFrameError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Decode, compress or generate failure
    #[error("resource error: {0}")]
    Resource(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("{what} did not complete within {after:?}")]
    Timeout { what: &'static str, after: Duration },

    /// A required collaborator is missing at startup
    #[error("initialization failed: {0}")]
    CriticalInit(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QrFrameError>;

impl QrFrameError {
    /// Whether the user can simply retry the action
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, QrFrameError::CriticalInit(_))
    }
}
