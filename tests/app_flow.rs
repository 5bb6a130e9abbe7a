// End-to-end controller scenarios on a simulated clock

use image::{GrayImage, ImageFormat, Rgba, RgbaImage};
use qrframe::app::{App, ColorSource, Completed, Dispatch, DownloadFeedback, Event, ViewState, LOGO_PLACEHOLDER};
use qrframe::bitmap::{EccLevel, QrBitmapGenerator, QrCodeGenerator};
use qrframe::config::Config;
use qrframe::image_loader::{ImageFile, MIME_PNG, MIME_SVG};
use qrframe::text::BlockRasterizer;
use qrframe::Result;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn config() -> Config {
    let mut config = Config::default();
    config.qr.acquire_timeout = Duration::from_secs(10);
    config
}

fn app_with(config: Config, generator: Arc<dyn QrBitmapGenerator>, dir: &Path) -> App {
    App::new(config, generator, Box::new(BlockRasterizer::default()), dir).unwrap()
}

fn app(dir: &Path) -> App {
    app_with(config(), Arc::new(QrCodeGenerator), dir)
}

fn png_file(name: &str, width: u32, height: u32) -> ImageFile {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    ImageFile::new(name, MIME_PNG, bytes)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_keystroke_burst_renders_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    let mut text = String::new();
    for (i, ch) in "hello".chars().enumerate() {
        text.push(ch);
        app.handle(Event::TextInput(text.clone()), t0 + ms(i as u64 * 50));
    }
    let last = t0 + ms(200);

    assert!(app.tick(last + ms(399)).is_empty());
    assert_eq!(app.tick(last + ms(400)), vec![Completed::PreviewRendered]);
    assert!(app.tick(last + ms(2000)).is_empty());
    assert_eq!(app.preview().renders(), 1);
    assert!(app.preview().is_visible());
}

#[test]
fn test_clearing_text_hides_preview() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("hello".into()), t0);
    app.tick(t0 + ms(400));
    app.handle(Event::TextInput(String::new()), t0 + ms(500));

    assert_eq!(app.tick(t0 + ms(900)), vec![Completed::PreviewHidden]);
    assert!(!app.preview().is_visible());
}

#[test]
fn test_generate_then_download() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("https://example.com".into()), t0);
    app.handle(Event::TemplateTextInput("Scan me".into()), t0);
    assert_eq!(app.handle(Event::Submit, t0), Dispatch::Accepted);
    assert_eq!(app.next_deadline(t0), Some(t0 + ms(400)));

    let done = app.tick(t0 + ms(400));
    assert!(done.contains(&Completed::Generated));
    assert_eq!(app.view(), ViewState::Result);
    assert!(app.view_model().download_visible);

    let t1 = t0 + ms(1000);
    assert_eq!(app.handle(Event::Download(600), t1), Dispatch::Accepted);
    assert_eq!(app.view_model().download_label, "Preparing...");
    assert_eq!(app.handle(Event::Download(600), t1), Dispatch::Ignored);

    let done = app.tick(t1);
    let path = match done.as_slice() {
        [Completed::Downloaded(path)] => path.clone(),
        other => panic!("unexpected completions: {other:?}"),
    };
    assert!(path.starts_with(dir.path()));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("qrcode-") && name.ends_with(".png"));

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (600, 600));

    assert_eq!(app.view_model().download_label, "Downloaded!");
    assert!(matches!(app.download_feedback(), DownloadFeedback::Succeeded { .. }));
    assert_eq!(app.tick(t1 + ms(2000)), vec![Completed::FeedbackReverted]);
    assert_eq!(app.view_model().download_label, "Download");
}

#[test]
fn test_download_is_unreachable_from_form() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("hello".into()), t0);
    assert_eq!(app.handle(Event::Download(600), t0), Dispatch::Ignored);
    app.tick(t0 + ms(5000));
    assert!(app.downloads().is_empty());
}

#[test]
fn test_invalid_resolution_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("hello".into()), t0);
    app.handle(Event::Submit, t0);
    app.tick(t0 + ms(400));

    app.handle(Event::Download(50), t0 + ms(500));
    assert!(app.error_message().is_some());
    assert!(!app.is_busy());
}

#[test]
fn test_back_resets_everything() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("hello".into()), t0);
    app.handle(Event::PresetColor(2), t0);
    app.handle(Event::LogoSelected(Some(png_file("logo.png", 64, 64))), t0);
    app.handle(Event::Submit, t0);
    app.tick(t0 + ms(400));
    assert_eq!(app.view(), ViewState::Result);
    assert_eq!(app.memory().live_blobs(), 1);

    app.handle(Event::Back, t0 + ms(500));

    let state = app.state();
    assert_eq!(app.view(), ViewState::Form);
    assert_eq!(state.qr_text, "");
    assert_eq!(state.template_text, "");
    assert!(state.logo.is_none());
    assert_eq!(state.color_source, ColorSource::Preset(0));
    assert!(!app.preview().is_visible());
    assert_eq!(app.memory().live_blobs(), 0);
    assert_eq!(app.memory().tracked_surfaces(), 0);
    assert!(!app.is_busy());
}

#[test]
fn test_back_cancels_pending_generate() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("hello".into()), t0);
    app.handle(Event::Submit, t0);
    app.handle(Event::Back, t0 + ms(100));

    assert!(app.tick(t0 + ms(1000)).is_empty());
    assert_eq!(app.view(), ViewState::Form);
    assert!(!app.state().is_generating);
}

#[test]
fn test_logo_upload_and_replacement() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::LogoSelected(Some(png_file("first.png", 3000, 3000))), t0);
    assert_eq!(app.error_message(), None);
    assert_eq!(app.view_model().logo_label, "first.png");
    let logo = app.state().logo.as_ref().unwrap();
    assert_eq!(logo.image.dimensions(), (512, 512));
    assert_eq!(app.memory().live_blobs(), 1);

    app.handle(Event::LogoSelected(Some(png_file("second.png", 80, 80))), t0);
    assert_eq!(app.view_model().logo_label, "second.png");
    assert_eq!(app.memory().live_blobs(), 1);

    app.handle(Event::LogoSelected(None), t0);
    assert_eq!(app.view_model().logo_label, LOGO_PLACEHOLDER);
    assert_eq!(app.memory().live_blobs(), 0);
}

#[test]
fn test_svg_logo_with_prolog_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    let svg = br##"<?xml version="1.0" encoding="UTF-8"?>
<!-- exported by editor -->
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64"><circle cx="32" cy="32" r="30" fill="#2563eb"/></svg>"##;
    app.handle(Event::LogoSelected(Some(ImageFile::new("logo.svg", MIME_SVG, svg.to_vec()))), t0);

    assert_eq!(app.error_message(), None);
    assert_eq!(app.view_model().logo_label, "logo.svg");
    let logo = app.state().logo.as_ref().unwrap();
    assert_eq!(logo.image.dimensions(), (1024, 1024));
    assert_eq!(app.memory().live_blobs(), 1);

    app.handle(Event::TextInput("hello".into()), t0);
    assert_eq!(app.tick(t0 + ms(400)), vec![Completed::PreviewRendered]);
}

#[test]
fn test_rejected_logos() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    app.handle(Event::LogoSelected(Some(png_file("wide.png", 300, 100))), t0);
    assert_eq!(app.error_message(), Some("The image must be roughly square."));
    assert!(app.state().logo.is_none());
    assert_eq!(app.memory().live_blobs(), 0);

    let gif = ImageFile::new("anim.gif", "image/gif", vec![0; 16]);
    app.handle(Event::LogoSelected(Some(gif)), t0);
    assert_eq!(app.error_message(), Some("Invalid format. Use PNG, JPG or SVG."));

    let broken = ImageFile::new("broken.png", MIME_PNG, b"not a png".to_vec());
    app.handle(Event::LogoSelected(Some(broken)), t0);
    assert_eq!(app.error_message(), Some("Could not process the image."));
    assert!(app.last_error().is_some());
}

struct StalledGenerator;

impl QrBitmapGenerator for StalledGenerator {
    fn generate(&self, _text: &str, size: u32, _level: EccLevel) -> Result<GrayImage> {
        thread::sleep(Duration::from_millis(500));
        Ok(GrayImage::new(size, size))
    }
}

#[test]
fn test_stalled_generator_fails_generate() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.qr.acquire_timeout = Duration::from_millis(50);
    let mut app = app_with(config, Arc::new(StalledGenerator), dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("hello".into()), t0);
    app.handle(Event::Submit, t0);
    let done = app.tick(t0 + ms(400));

    assert!(!done.contains(&Completed::Generated));
    assert_eq!(app.view(), ViewState::Form);
    assert_eq!(app.error_message(), Some("Failed to generate the QR code."));
    assert!(!app.state().is_generating);
    assert_eq!(app.view_model().generate_label, "Generate QR Code");

    // Abandoned scratch surfaces are released by the next cleanup
    assert!(app.memory().tracked_surfaces() > 0);
    app.handle(Event::Unload, t0 + ms(500));
    assert_eq!(app.memory().tracked_surfaces(), 0);
}

#[test]
fn test_default_config_generates_a_typical_url() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_with(Config::default(), Arc::new(QrCodeGenerator), dir.path());
    let t0 = Instant::now();

    app.handle(Event::TextInput("https://example.com/menu?table=12".into()), t0);
    app.handle(Event::Submit, t0);
    let done = app.tick(t0 + ms(400));

    assert!(done.contains(&Completed::Generated), "{:?}", app.last_error());
    assert_eq!(app.view(), ViewState::Result);
}

#[test]
fn test_repeated_renders_do_not_accumulate_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    let t0 = Instant::now();

    for i in 0..3u64 {
        let at = t0 + ms(i * 1000);
        app.handle(Event::TextInput(format!("hello {i}")), at);
        assert_eq!(app.tick(at + ms(400)), vec![Completed::PreviewRendered]);
    }
    assert_eq!(app.preview().renders(), 3);
    assert_eq!(app.memory().tracked_surfaces(), 0);
}
