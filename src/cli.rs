// Command line interface module
// Handles parsing of command line arguments and stdin input

use anyhow::{bail, Context, Result};
use clap::Parser;
use qrframe::bitmap::EccLevel;
use qrframe::color::{swatch_by_name, HexColor};
use std::io::{self, Read};
use std::path::PathBuf;

/// qrframe - Styled QR code generator with logo, color template and caption
#[derive(Parser, Debug)]
#[command(name = "qrframe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Text or URL to encode (can also be provided via stdin pipe)
    #[arg(value_name = "TEXT")]
    pub text: Option<String>,

    /// Caption drawn below the QR code
    #[arg(short, long)]
    pub caption: Option<String>,

    /// Template color as #rrggbb or #rgb
    #[arg(long, conflicts_with = "preset", value_parser = parse_color)]
    pub color: Option<HexColor>,

    /// Named preset color (slate, blue, green, red, purple, orange, white)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Logo image placed in the center (PNG, JPG or SVG)
    #[arg(short, long)]
    pub logo: Option<PathBuf>,

    /// Edge length of the downloaded image in pixels
    #[arg(short, long, default_value = "1024")]
    pub resolution: u32,

    /// Directory the PNG is written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Error correction level (L, M, Q, H)
    #[arg(long, default_value = "H")]
    pub ecc: EccLevel,

    /// JPEG quality used when compressing the logo (0.0 - 1.0)
    #[arg(short, long, default_value = "0.8", value_parser = parse_quality)]
    pub quality: f32,

    /// Stop after the preview render instead of downloading
    #[arg(long, default_value = "false")]
    pub preview: bool,
}

/// Parsed arguments with resolved text source
#[derive(Debug)]
pub struct ParsedArgs {
    pub text: String,
    pub caption: Option<String>,
    /// Index of the selected preset, if any
    pub preset: Option<usize>,
    pub color: Option<HexColor>,
    pub logo: Option<PathBuf>,
    pub resolution: u32,
    pub output: PathBuf,
    pub ecc: EccLevel,
    pub quality: f32,
    pub preview_only: bool,
}

fn parse_color(s: &str) -> Result<HexColor, String> {
    s.parse().map_err(|e| format!("{e}"))
}

/// Parse quality value and ensure it's within valid range
fn parse_quality(s: &str) -> Result<f32, String> {
    let quality: f32 = s.parse().map_err(|_| "Invalid quality value")?;
    if !(0.0..=1.0).contains(&quality) {
        return Err("Quality must be between 0.0 and 1.0".to_string());
    }
    Ok(quality)
}

/// Check if stdin has data available (is a pipe)
fn stdin_has_data() -> bool {
    !atty::is(atty::Stream::Stdin)
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("stdin is not valid UTF-8")?;
    Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
}

/// Parse command line arguments and handle stdin input
pub fn parse_args() -> Result<ParsedArgs> {
    let args = Args::parse();

    // A positional argument wins over piped input
    let text = if let Some(text) = args.text {
        text
    } else if stdin_has_data() {
        let data = read_stdin()?;
        if data.is_empty() {
            bail!("No data received from stdin");
        }
        data
    } else {
        bail!("No text provided. Please provide the text to encode or pipe it to stdin.\n\
               Usage: qrframe <TEXT> [OPTIONS]\n\
               Or:    echo https://example.com | qrframe [OPTIONS]");
    };

    let preset = match args.preset.as_deref() {
        Some(name) => match swatch_by_name(name) {
            Some(index) => Some(index),
            None => bail!("Unknown preset color: {name}"),
        },
        None => None,
    };

    Ok(ParsedArgs {
        text,
        caption: args.caption,
        preset,
        color: args.color,
        logo: args.logo,
        resolution: args.resolution,
        output: args.output,
        ecc: args.ecc,
        quality: args.quality,
        preview_only: args.preview,
    })
}
