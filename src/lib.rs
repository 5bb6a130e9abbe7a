// qrframe - Styled QR code generator
// Composes a QR code with a colored template, a centered logo and a caption

pub mod app;
pub mod bitmap;
pub mod bounded;
pub mod canvas;
pub mod color;
pub mod compressor;
pub mod config;
pub mod debounce;
pub mod error;
pub mod image_loader;
pub mod memory;
pub mod preview;
pub mod renderer;
pub mod text;
pub mod validator;

pub use app::{App, Completed, Dispatch, Event, ViewState};
pub use config::Config;
pub use error::{QrFrameError, Result};
