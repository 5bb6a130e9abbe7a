// Color module
// Hex color parsing, luminance and the preset palette

use crate::error::ValidationError;
use image::Rgba;
use std::fmt;
use std::str::FromStr;

/// An opaque RGB color parsed from `#rrggbb` or `#rgb`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const WHITE: HexColor = HexColor { r: 255, g: 255, b: 255 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Perceptual brightness in 0.0..=255.0 (Rec. 709 weights)
    pub fn luminance(&self) -> f64 {
        0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

impl FromStr for HexColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
        match hex.len() {
            6 => Ok(Self::new(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                // #abc is shorthand for #aabbcc
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A named swatch of the template palette
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub hex: &'static str,
}

pub const PRESET_SWATCHES: &[Swatch] = &[
    Swatch { name: "slate", hex: "#0f172a" },
    Swatch { name: "blue", hex: "#2563eb" },
    Swatch { name: "green", hex: "#16a34a" },
    Swatch { name: "red", hex: "#dc2626" },
    Swatch { name: "purple", hex: "#7c3aed" },
    Swatch { name: "orange", hex: "#ea580c" },
    Swatch { name: "white", hex: "#ffffff" },
];

/// Index of the swatch whose color matches `hex`, case-insensitively
pub fn find_swatch(hex: &str) -> Option<usize> {
    PRESET_SWATCHES
        .iter()
        .position(|swatch| swatch.hex.eq_ignore_ascii_case(hex.trim()))
}

/// Index of the swatch with the given name
pub fn swatch_by_name(name: &str) -> Option<usize> {
    PRESET_SWATCHES
        .iter()
        .position(|swatch| swatch.name.eq_ignore_ascii_case(name.trim()))
}
