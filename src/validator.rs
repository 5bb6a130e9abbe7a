// Validation module
// Pure checks on user text, uploaded files and decoded image geometry

use crate::config::Config;
use crate::error::ValidationError;
use crate::image_loader::ImageFile;

/// Validators bound to a configuration
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    config: &'a Config,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Text must be non-blank and at most `max_text_length` characters once trimmed
    pub fn validate_text(&self, text: &str) -> Result<(), ValidationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyText);
        }

        let max = self.config.validation.max_text_length;
        if trimmed.chars().count() > max {
            return Err(ValidationError::TextTooLong { max });
        }
        Ok(())
    }

    pub fn validate_image_file(&self, file: Option<&ImageFile>) -> Result<(), ValidationError> {
        let file = file.ok_or(ValidationError::NoFile)?;

        let supported = &self.config.validation.supported_image_types;
        if !supported.iter().any(|mime| mime == &file.mime) {
            return Err(ValidationError::UnsupportedType {
                mime: file.mime.clone(),
            });
        }

        if file.size() > self.config.max_logo_bytes() {
            return Err(ValidationError::FileTooLarge {
                max_mb: self.config.logo.max_size_mb,
            });
        }
        Ok(())
    }

    /// Width/height ratio must lie within the configured bounds, inclusive
    pub fn validate_image_dimensions(&self, width: u32, height: u32) -> Result<(), ValidationError> {
        if height == 0 {
            return Err(ValidationError::NotSquare { ratio: f64::INFINITY });
        }

        let ratio = width as f64 / height as f64;
        let logo = &self.config.logo;
        if ratio < logo.min_aspect_ratio || ratio > logo.max_aspect_ratio {
            return Err(ValidationError::NotSquare { ratio });
        }
        Ok(())
    }

    /// Download edge must lie within the configured bounds
    pub fn validate_resolution(&self, size: u32) -> Result<(), ValidationError> {
        let canvas = &self.config.canvas;
        if size < canvas.min_download_size || size > canvas.max_download_size {
            return Err(ValidationError::InvalidResolution(size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::{MIME_JPEG, MIME_PNG, MIME_SVG};

    fn file(mime: &str, size: usize) -> ImageFile {
        ImageFile::new("logo", mime, vec![0; size])
    }

    #[test]
    fn test_text_bounds() {
        let config = Config::default();
        let v = Validator::new(&config);

        assert!(v.validate_text("a").is_ok());
        assert!(v.validate_text(&"x".repeat(2000)).is_ok());
        assert_eq!(v.validate_text(""), Err(ValidationError::EmptyText));
        assert_eq!(v.validate_text("   \n\t"), Err(ValidationError::EmptyText));
        assert_eq!(
            v.validate_text(&"x".repeat(2001)),
            Err(ValidationError::TextTooLong { max: 2000 })
        );
    }

    #[test]
    fn test_text_length_counts_characters_not_bytes() {
        let config = Config::default();
        assert!(Validator::new(&config).validate_text(&"é".repeat(2000)).is_ok());
    }

    #[test]
    fn test_file_type_checked_before_size() {
        let config = Config::default();
        let v = Validator::new(&config);

        for mime in ["image/gif", "text/plain", "image/webp"] {
            for size in [0, 10, 3 * 1024 * 1024] {
                assert!(matches!(
                    v.validate_image_file(Some(&file(mime, size))),
                    Err(ValidationError::UnsupportedType { .. })
                ));
            }
        }
    }

    #[test]
    fn test_file_size_limit() {
        let config = Config::default();
        let v = Validator::new(&config);

        assert!(v.validate_image_file(Some(&file(MIME_PNG, 2 * 1024 * 1024))).is_ok());
        assert!(v.validate_image_file(Some(&file(MIME_SVG, 100))).is_ok());
        assert!(matches!(
            v.validate_image_file(Some(&file(MIME_JPEG, 2 * 1024 * 1024 + 1))),
            Err(ValidationError::FileTooLarge { .. })
        ));
        assert_eq!(v.validate_image_file(None), Err(ValidationError::NoFile));
    }

    #[test]
    fn test_aspect_ratio_boundaries_are_inclusive() {
        let config = Config::default();
        let v = Validator::new(&config);

        assert!(v.validate_image_dimensions(100, 200).is_ok());
        assert!(v.validate_image_dimensions(200, 100).is_ok());
        assert!(v.validate_image_dimensions(512, 512).is_ok());
        assert!(v.validate_image_dimensions(99, 200).is_err());
        assert!(v.validate_image_dimensions(201, 100).is_err());
        assert!(v.validate_image_dimensions(10, 0).is_err());
    }

    #[test]
    fn test_resolution_bounds() {
        let config = Config::default();
        let v = Validator::new(&config);

        assert!(v.validate_resolution(600).is_ok());
        assert!(v.validate_resolution(4096).is_ok());
        assert_eq!(v.validate_resolution(0), Err(ValidationError::InvalidResolution(0)));
        assert!(v.validate_resolution(10_000).is_err());
    }
}
