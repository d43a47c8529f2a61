//! Camera-driven QR scanner for employee check-in/check-out.
//!
//! The camera device, the QR decode routine and the backend reporter are
//! injected; this crate owns the camera session, the 100 ms decode loop and
//! the cooldown between accepted scans.

pub mod camera;
pub mod config;
pub mod decode;
pub mod reporter;
pub mod scanner;
pub mod utils;

pub use camera::{Camera, CameraError, FacingMode, FrameSource, StreamRequest};
pub use config::ScannerConfig;
pub use decode::{Decoder, Frame};
pub use reporter::{ScanOutcome, ScanReporter, ScanResponse};
pub use scanner::{ScannerController, ScannerError, ScannerEvent, ScannerSnapshot};
pub use utils::init_logging;
