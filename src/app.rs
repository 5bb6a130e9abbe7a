// Application state module
// Owns the state, wires user events to the components and runs the
// generate / download / reset lifecycle on an externally driven clock

use crate::bitmap::QrBitmapGenerator;
use crate::color::{find_swatch, HexColor, PRESET_SWATCHES};
use crate::compressor::compress;
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::error::{QrFrameError, Result, ValidationError};
use crate::image_loader::{load_image, ImageFile};
use crate::memory::{BlobUrl, MemoryManager};
use crate::preview::{PreviewManager, PreviewOutcome};
use crate::renderer::{QrRenderer, RenderRequest};
use crate::text::TextRasterizer;
use crate::validator::Validator;
use image::{ImageFormat, RgbaImage};
use log::{debug, error, info, warn};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub const LOGO_PLACEHOLDER: &str = "Add image";
const GENERATE_FAILED: &str = "Failed to generate the QR code.";
const PREVIEW_FAILED: &str = "Failed to render the QR code preview.";
const DOWNLOAD_FAILED: &str = "Could not prepare the download.";
const LOGO_FAILED: &str = "Could not process the image.";

/// Which screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Form,
    Result,
}

/// The single active color source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    /// Index into [`PRESET_SWATCHES`]
    Preset(usize),
    Custom,
}

/// A validated, compressed and decoded logo
#[derive(Debug, Clone)]
pub struct LogoImage {
    pub file_name: String,
    pub image: RgbaImage,
    /// Compressed bytes this image was decoded from
    pub blob: BlobUrl,
}

/// Mutable UI state. Reset to defaults by the back action.
#[derive(Debug, Clone)]
pub struct ApplicationState {
    pub qr_text: String,
    pub template_text: String,
    pub template_color: HexColor,
    pub color_source: ColorSource,
    pub logo: Option<LogoImage>,
    pub is_generating: bool,
    pub is_downloading: bool,
}

impl ApplicationState {
    pub fn new(config: &Config) -> Self {
        let default_color = config.colors.default_template;
        let source = find_swatch(&default_color.to_string())
            .map(ColorSource::Preset)
            .unwrap_or(ColorSource::Custom);
        Self {
            qr_text: String::new(),
            template_text: String::new(),
            template_color: default_color,
            color_source: source,
            logo: None,
            is_generating: false,
            is_downloading: false,
        }
    }

    pub fn logo_label(&self) -> &str {
        self.logo.as_ref().map(|l| l.file_name.as_str()).unwrap_or(LOGO_PLACEHOLDER)
    }
}

/// User interactions
#[derive(Debug, Clone)]
pub enum Event {
    TextInput(String),
    TemplateTextInput(String),
    LogoSelected(Option<ImageFile>),
    /// Index into [`PRESET_SWATCHES`]
    PresetColor(usize),
    CustomColor(String),
    Submit,
    /// Download at the given edge in pixels
    Download(u32),
    Back,
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Accepted,
    /// Dropped by a re-entrancy guard or because it is unreachable in this view
    Ignored,
}

/// Work finished during a [`App::tick`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completed {
    PreviewRendered,
    PreviewHidden,
    Generated,
    Downloaded(PathBuf),
    ErrorCleared,
    FeedbackReverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFeedback {
    Idle,
    Preparing,
    Succeeded { until: Instant },
}

#[derive(Debug, Clone)]
struct DisplayedError {
    message: String,
    expires: Instant,
}

/// Diagnostic record of the most recent failure
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: SystemTime,
    pub context: String,
    pub message: String,
}

/// Derived widget state
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel<'a> {
    pub view: ViewState,
    pub error: Option<&'a str>,
    pub preview_visible: bool,
    pub generate_label: &'static str,
    pub generate_enabled: bool,
    pub download_visible: bool,
    pub download_label: &'static str,
    pub logo_label: &'a str,
    pub active_color: ColorSource,
}

/// Application controller
pub struct App {
    config: Config,
    state: ApplicationState,
    view: ViewState,
    renderer: QrRenderer,
    preview: PreviewManager,
    memory: MemoryManager,
    text: Box<dyn TextRasterizer>,
    debounce: Debouncer,
    error: Option<DisplayedError>,
    last_error: Option<ErrorRecord>,
    pending_generate: Option<Instant>,
    pending_download: Option<u32>,
    feedback: DownloadFeedback,
    output_dir: PathBuf,
    downloads: Vec<PathBuf>,
}

impl App {
    /// Create the controller. Fails with `CriticalInit` when a collaborator is unusable.
    pub fn new(
        config: Config,
        generator: Arc<dyn QrBitmapGenerator>,
        text: Box<dyn TextRasterizer>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        info!("Initializing QR code generator");
        config.check()?;

        let output_dir = output_dir.into();
        prepare_output_dir(&output_dir)?;

        let renderer = QrRenderer::new(&config, generator);
        let preview = PreviewManager::new(config.canvas.preview_size);
        let debounce = Debouncer::new(config.timing.debounce_delay);
        let state = ApplicationState::new(&config);

        info!("Initialization complete, downloads go to {}", output_dir.display());
        Ok(Self {
            config,
            state,
            view: ViewState::Form,
            renderer,
            preview,
            memory: MemoryManager::new(),
            text,
            debounce,
            error: None,
            last_error: None,
            pending_generate: None,
            pending_download: None,
            feedback: DownloadFeedback::Idle,
            output_dir,
            downloads: Vec::new(),
        })
    }

    /// Seed the text field the way a pre-filled form would
    pub fn start(&mut self, initial_text: Option<String>, now: Instant) {
        if let Some(text) = initial_text.filter(|t| !t.is_empty()) {
            self.state.qr_text = text;
            self.debounce.schedule(now);
        }
    }

    pub fn handle(&mut self, event: Event, now: Instant) -> Dispatch {
        match event {
            Event::TextInput(value) => {
                self.update_text(value, now);
                Dispatch::Accepted
            }
            Event::TemplateTextInput(value) => {
                debug!("State updated: template_text {:?} -> {:?}", self.state.template_text, value);
                self.state.template_text = value;
                self.debounce.schedule(now);
                Dispatch::Accepted
            }
            Event::LogoSelected(file) => {
                self.handle_logo_upload(file, now);
                Dispatch::Accepted
            }
            Event::PresetColor(index) => self.select_preset(index, now),
            Event::CustomColor(value) => {
                self.select_custom_color(&value, now);
                Dispatch::Accepted
            }
            Event::Submit => self.submit(now),
            Event::Download(size) => self.request_download(size, now),
            Event::Back => {
                self.reset();
                Dispatch::Accepted
            }
            Event::Unload => {
                self.memory.cleanup();
                info!("Cleanup performed before exit");
                Dispatch::Accepted
            }
        }
    }

    /// Run every timer and pending operation that is due at `now`
    pub fn tick(&mut self, now: Instant) -> Vec<Completed> {
        let mut done = Vec::new();

        if self.error.as_ref().is_some_and(|e| now >= e.expires) {
            self.error = None;
            done.push(Completed::ErrorCleared);
        }

        if let DownloadFeedback::Succeeded { until } = self.feedback {
            if now >= until {
                self.feedback = DownloadFeedback::Idle;
                done.push(Completed::FeedbackReverted);
            }
        }

        if self.debounce.fire(now) {
            match self.render_preview() {
                Ok(PreviewOutcome::Rendered) => done.push(Completed::PreviewRendered),
                Ok(PreviewOutcome::Hidden) => done.push(Completed::PreviewHidden),
                Err(e) => {
                    self.report_error("preview", &e);
                    self.display_error(PREVIEW_FAILED, now);
                }
            }
        }

        if self.pending_generate.is_some_and(|due| now >= due) {
            self.pending_generate = None;
            if self.complete_generate(now) {
                done.push(Completed::Generated);
            }
        }

        if let Some(size) = self.pending_download.take() {
            if let Some(path) = self.complete_download(size, now) {
                done.push(Completed::Downloaded(path));
            }
        }

        done
    }

    /// Earliest instant at which [`App::tick`] has something to do
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let feedback = match self.feedback {
            DownloadFeedback::Succeeded { until } => Some(until),
            _ => None,
        };
        [
            self.debounce.deadline(),
            self.pending_generate,
            self.pending_download.map(|_| now),
            self.error.as_ref().map(|e| e.expires),
            feedback,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Whether a render, generate or download is still outstanding
    pub fn is_busy(&self) -> bool {
        self.debounce.is_pending() || self.pending_generate.is_some() || self.pending_download.is_some()
    }

    pub fn state(&self) -> &ApplicationState {
        &self.state
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn preview(&self) -> &PreviewManager {
        &self.preview
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.last_error.as_ref()
    }

    pub fn download_feedback(&self) -> DownloadFeedback {
        self.feedback
    }

    /// Files written by completed downloads, oldest first
    pub fn downloads(&self) -> &[PathBuf] {
        &self.downloads
    }

    pub fn view_model(&self) -> ViewModel<'_> {
        ViewModel {
            view: self.view,
            error: self.error_message(),
            preview_visible: self.preview.is_visible(),
            generate_label: if self.state.is_generating { "Generating..." } else { "Generate QR Code" },
            generate_enabled: !self.state.is_generating,
            download_visible: self.view == ViewState::Result,
            download_label: match self.feedback {
                DownloadFeedback::Idle => "Download",
                DownloadFeedback::Preparing => "Preparing...",
                DownloadFeedback::Succeeded { .. } => "Downloaded!",
            },
            logo_label: self.state.logo_label(),
            active_color: self.state.color_source,
        }
    }

    fn update_text(&mut self, value: String, now: Instant) {
        debug!("State updated: qr_text ({} chars)", value.chars().count());
        self.state.qr_text = value;
        if Validator::new(&self.config).validate_text(&self.state.qr_text).is_ok() {
            self.error = None;
        }
        self.debounce.schedule(now);
    }

    fn select_preset(&mut self, index: usize, now: Instant) -> Dispatch {
        let Some(swatch) = PRESET_SWATCHES.get(index) else {
            return Dispatch::Ignored;
        };
        match swatch.hex.parse::<HexColor>() {
            Ok(color) => {
                self.state.template_color = color;
                self.state.color_source = ColorSource::Preset(index);
                debug!("Color selected: {} ({})", swatch.name, color);
                self.debounce.schedule(now);
                Dispatch::Accepted
            }
            Err(e) => {
                warn!("Preset swatch {} has an invalid color: {}", swatch.name, e);
                Dispatch::Ignored
            }
        }
    }

    fn select_custom_color(&mut self, value: &str, now: Instant) {
        match value.parse::<HexColor>() {
            Ok(color) => {
                self.state.template_color = color;
                self.state.color_source = ColorSource::Custom;
                debug!("Custom color selected: {}", color);
                self.debounce.schedule(now);
            }
            Err(e) => self.display_error(&e.to_string(), now),
        }
    }

    fn submit(&mut self, now: Instant) -> Dispatch {
        if self.state.is_generating {
            return Dispatch::Ignored;
        }
        if let Err(e) = Validator::new(&self.config).validate_text(&self.state.qr_text) {
            self.display_error(&e.to_string(), now);
            return Dispatch::Accepted;
        }

        self.state.is_generating = true;
        self.pending_generate = Some(now + self.config.timing.render_delay);
        Dispatch::Accepted
    }

    fn complete_generate(&mut self, now: Instant) -> bool {
        let result: Result<()> = match self.render_preview() {
            Ok(PreviewOutcome::Rendered) => Ok(()),
            Ok(PreviewOutcome::Hidden) => Err(ValidationError::EmptyText.into()),
            Err(e) => Err(e),
        };
        self.state.is_generating = false;

        match result {
            Ok(()) => {
                self.show_view(ViewState::Result);
                info!("QR code generated");
                true
            }
            Err(e) => {
                self.report_error("generate", &e);
                self.display_error(GENERATE_FAILED, now);
                false
            }
        }
    }

    fn request_download(&mut self, size: u32, now: Instant) -> Dispatch {
        if self.view != ViewState::Result || self.state.is_downloading {
            return Dispatch::Ignored;
        }
        if let Err(e) = Validator::new(&self.config).validate_resolution(size) {
            self.display_error(&e.to_string(), now);
            return Dispatch::Accepted;
        }

        info!("Starting download at {}x{}", size, size);
        self.state.is_downloading = true;
        self.feedback = DownloadFeedback::Preparing;
        self.pending_download = Some(size);
        Dispatch::Accepted
    }

    fn complete_download(&mut self, size: u32, now: Instant) -> Option<PathBuf> {
        let result = self.write_download(size);
        self.state.is_downloading = false;

        match result {
            Ok(path) => {
                info!("Download saved to {}", path.display());
                self.feedback = DownloadFeedback::Succeeded {
                    until: now + self.config.timing.success_display,
                };
                self.downloads.push(path.clone());
                Some(path)
            }
            Err(e) => {
                self.report_error("download", &e);
                self.display_error(DOWNLOAD_FAILED, now);
                self.feedback = DownloadFeedback::Idle;
                None
            }
        }
    }

    /// Render a fresh composition at `size` and save it as PNG
    fn write_download(&mut self, size: u32) -> Result<PathBuf> {
        let mut surface = RgbaImage::new(size, size);
        let request = request_for(&self.state, size);
        self.renderer.render(&mut surface, &request, self.text.as_mut(), &mut self.memory)?;

        let mut bytes = Vec::new();
        surface.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = self.output_dir.join(download_file_name(timestamp));
        fs::write(&path, bytes)?;
        Ok(path)
    }

    fn render_preview(&mut self) -> Result<PreviewOutcome> {
        let request = request_for(&self.state, self.preview.size());
        self.preview
            .render_preview(&self.renderer, request, self.text.as_mut(), &mut self.memory)
    }

    fn handle_logo_upload(&mut self, file: Option<ImageFile>, now: Instant) {
        let Some(file) = file else {
            self.reset_upload(now);
            return;
        };

        if let Err(e) = Validator::new(&self.config).validate_image_file(Some(&file)) {
            self.display_error(&e.to_string(), now);
            self.reset_upload(now);
            return;
        }

        info!("Processing logo upload: {} ({} bytes)", file.name, file.size());
        match self.process_logo(&file) {
            Ok(logo) => {
                if let Some(old) = self.state.logo.replace(logo) {
                    self.memory.revoke_blob_url(&old.blob);
                }
                info!("Logo processed");
                self.debounce.schedule(now);
            }
            Err(e) => {
                let message = match &e {
                    QrFrameError::Validation(v) => v.to_string(),
                    _ => LOGO_FAILED.to_string(),
                };
                self.report_error("logo upload", &e);
                self.display_error(&message, now);
                self.reset_upload(now);
            }
        }
    }

    /// Compress, decode and check a logo file
    fn process_logo(&mut self, file: &ImageFile) -> Result<LogoImage> {
        let compressed = compress(file, &self.config.compression)?;
        let blob = self.memory.create_blob_url(compressed.data.clone());

        let logo = &self.config.logo;
        let loaded = load_image(compressed.data, &compressed.mime, logo.svg_raster_size, logo.decode_timeout)
            .and_then(|loaded| {
                Validator::new(&self.config)
                    .validate_image_dimensions(loaded.natural_width, loaded.natural_height)?;
                Ok(loaded)
            });

        match loaded {
            Ok(loaded) => Ok(LogoImage {
                file_name: file.name.clone(),
                image: loaded.image,
                blob,
            }),
            Err(e) => {
                self.memory.revoke_blob_url(&blob);
                Err(e)
            }
        }
    }

    fn reset_upload(&mut self, now: Instant) {
        if let Some(old) = self.state.logo.take() {
            self.memory.revoke_blob_url(&old.blob);
        }
        self.debounce.schedule(now);
    }

    /// Back to the empty form with default state
    fn reset(&mut self) {
        info!("Resetting application");
        self.memory.cleanup();
        self.state = ApplicationState::new(&self.config);
        self.debounce.cancel();
        self.pending_generate = None;
        self.pending_download = None;
        self.feedback = DownloadFeedback::Idle;
        self.error = None;
        self.preview.hide();
        self.show_view(ViewState::Form);
    }

    fn show_view(&mut self, view: ViewState) {
        debug!("View changed: {:?} -> {:?}", self.view, view);
        self.view = view;
    }

    fn display_error(&mut self, message: &str, now: Instant) {
        warn!("Error shown to user: {}", message);
        self.error = Some(DisplayedError {
            message: message.to_string(),
            expires: now + self.config.timing.error_display,
        });
    }

    fn report_error(&mut self, context: &str, err: &QrFrameError) {
        error!("{} failed: {}", context, err);
        self.last_error = Some(ErrorRecord {
            timestamp: SystemTime::now(),
            context: context.to_string(),
            message: err.to_string(),
        });
    }
}

/// Snapshot of the state as a render request
fn request_for(state: &ApplicationState, size: u32) -> RenderRequest<'_> {
    RenderRequest {
        text: &state.qr_text,
        template_text: &state.template_text,
        template_color: state.template_color,
        logo: state.logo.as_ref().map(|l| &l.image),
        size,
    }
}

/// `qrcode-<unix millis>.png`
pub fn download_file_name(timestamp_ms: u128) -> String {
    format!("qrcode-{timestamp_ms}.png")
}

fn prepare_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .map_err(|e| QrFrameError::CriticalInit(format!("cannot create {}: {e}", dir.display())))?;
    }
    if !dir.is_dir() {
        return Err(QrFrameError::CriticalInit(format!("{} is not a directory", dir.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::QrCodeGenerator;
    use crate::text::BlockRasterizer;
    use std::time::Duration;

    fn app(dir: &Path) -> App {
        let mut config = Config::default();
        config.qr.acquire_timeout = Duration::from_secs(10);
        App::new(config, Arc::new(QrCodeGenerator), Box::new(BlockRasterizer::default()), dir).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let vm = app.view_model();

        assert_eq!(vm.view, ViewState::Form);
        assert_eq!(vm.active_color, ColorSource::Preset(0));
        assert_eq!(vm.logo_label, LOGO_PLACEHOLDER);
        assert!(!vm.download_visible);
        assert_eq!(app.state().template_color.to_string(), "#0f172a");
    }

    #[test]
    fn test_output_path_that_is_a_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();

        let result = App::new(Config::default(), Arc::new(QrCodeGenerator), Box::new(BlockRasterizer::default()), &file);
        assert!(matches!(result, Err(QrFrameError::CriticalInit(_))));
    }

    #[test]
    fn test_invalid_submit_shows_error_that_expires() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let t0 = Instant::now();

        app.handle(Event::Submit, t0);
        assert_eq!(app.error_message(), Some("Please enter a text or URL."));
        assert!(!app.state().is_generating);

        assert!(app.tick(t0 + Duration::from_millis(3999)).is_empty());
        assert_eq!(app.tick(t0 + Duration::from_millis(4000)), vec![Completed::ErrorCleared]);
        assert_eq!(app.error_message(), None);
    }

    #[test]
    fn test_valid_input_clears_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let t0 = Instant::now();

        app.handle(Event::Submit, t0);
        app.handle(Event::TextInput("   ".into()), t0);
        assert!(app.error_message().is_some());
        app.handle(Event::TextInput("hello".into()), t0);
        assert_eq!(app.error_message(), None);
    }

    #[test]
    fn test_color_sources_are_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let t0 = Instant::now();

        app.handle(Event::CustomColor("#123456".into()), t0);
        assert_eq!(app.state().color_source, ColorSource::Custom);
        assert_eq!(app.state().template_color.to_string(), "#123456");

        app.handle(Event::PresetColor(1), t0);
        assert_eq!(app.state().color_source, ColorSource::Preset(1));
        assert_eq!(app.state().template_color.to_string(), PRESET_SWATCHES[1].hex);

        assert_eq!(app.handle(Event::PresetColor(99), t0), Dispatch::Ignored);
        assert_eq!(app.state().color_source, ColorSource::Preset(1));
    }

    #[test]
    fn test_invalid_custom_color_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.handle(Event::CustomColor("blue".into()), Instant::now());

        assert!(app.error_message().is_some());
        assert_eq!(app.state().color_source, ColorSource::Preset(0));
    }

    #[test]
    fn test_second_submit_while_generating_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let t0 = Instant::now();

        app.handle(Event::TextInput("hello".into()), t0);
        assert_eq!(app.handle(Event::Submit, t0), Dispatch::Accepted);
        assert_eq!(app.view_model().generate_label, "Generating...");
        assert_eq!(app.handle(Event::Submit, t0 + Duration::from_millis(10)), Dispatch::Ignored);

        let done = app.tick(t0 + Duration::from_millis(400));
        assert!(done.contains(&Completed::Generated));
        assert_eq!(app.view(), ViewState::Result);
        assert!(!app.state().is_generating);
    }

    #[test]
    fn test_download_requires_result_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert_eq!(app.handle(Event::Download(600), Instant::now()), Dispatch::Ignored);
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(download_file_name(1700000000123), "qrcode-1700000000123.png");
    }
}
