// qrframe - Styled QR code generator
// Renders a QR code with template color, logo and caption to a PNG file

mod cli;

use anyhow::{bail, Result};
use log::{info, warn};
use qrframe::app::{App, Completed, Event, ViewState};
use qrframe::bitmap::QrCodeGenerator;
use qrframe::config::Config;
use qrframe::image_loader::ImageFile;
use qrframe::text::{BlockRasterizer, CosmicTextRasterizer, TextRasterizer};
use qrframe::QrFrameError;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::parse_args()?;

    let mut config = Config::default();
    config.qr.correction_level = args.ecc;
    config.compression.quality = args.quality;

    let text: Box<dyn TextRasterizer> = {
        let cosmic = CosmicTextRasterizer::new();
        if cosmic.has_fonts() {
            Box::new(cosmic)
        } else {
            warn!("No system fonts found, captions are drawn as blocks");
            Box::new(BlockRasterizer::default())
        }
    };

    let mut app = match App::new(config, Arc::new(QrCodeGenerator), text, &args.output) {
        Ok(app) => app,
        Err(e @ QrFrameError::CriticalInit(_)) => {
            eprintln!("qrframe could not start: {e}");
            eprintln!("Check the output directory and try again.");
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    let now = Instant::now();
    app.start(Some(args.text), now);
    if let Some(caption) = args.caption {
        app.handle(Event::TemplateTextInput(caption), now);
    }
    if let Some(index) = args.preset {
        app.handle(Event::PresetColor(index), now);
    }
    if let Some(color) = args.color {
        app.handle(Event::CustomColor(color.to_string()), now);
    }
    if let Some(path) = &args.logo {
        let file = ImageFile::from_path(path)?;
        app.handle(Event::LogoSelected(Some(file)), now);
        if let Some(message) = app.error_message() {
            bail!("{}: {message}", path.display());
        }
    }

    if args.preview_only {
        run_until_idle(&mut app);
        info!("Preview rendered {} time(s)", app.preview().renders());
        app.handle(Event::Unload, Instant::now());
        return Ok(());
    }

    app.handle(Event::Submit, Instant::now());
    run_until_idle(&mut app);
    if app.view() != ViewState::Result {
        bail!(app.error_message().unwrap_or("Failed to generate the QR code.").to_string());
    }

    app.handle(Event::Download(args.resolution), Instant::now());
    let mut saved = None;
    for done in run_until_idle(&mut app) {
        if let Completed::Downloaded(path) = done {
            saved = Some(path);
        }
    }

    app.handle(Event::Unload, Instant::now());
    match saved {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!(app.error_message().unwrap_or("Could not prepare the download.").to_string()),
    }
}

/// Sleep until each deadline and tick until no work is outstanding
fn run_until_idle(app: &mut App) -> Vec<Completed> {
    let mut completed = Vec::new();
    while app.is_busy() {
        let now = Instant::now();
        if let Some(deadline) = app.next_deadline(now) {
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
        completed.extend(app.tick(Instant::now()));
    }
    completed
}
