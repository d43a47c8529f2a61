pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ScannerConfig;
use crate::decode::Frame;

pub use session::CameraSession;

/// Which physical camera a stream comes from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    /// Rear camera.
    #[default]
    Environment,
}

impl FacingMode {
    pub fn opposite(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FacingMode::User => "Front camera",
            FacingMode::Environment => "Rear camera",
        }
    }
}

/// Parameters handed to [`Camera::open`]. Width and height are hints; the
/// device may pick the closest mode it supports.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamRequest {
    pub fn new(facing: FacingMode, config: &ScannerConfig) -> Self {
        Self {
            facing,
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera access was denied. Check the camera permissions for this app.")]
    PermissionDenied,
    #[error("No camera was found. Check that the device has a camera.")]
    NotFound,
    #[error("The camera cannot be started with the requested settings.")]
    Overconstrained,
    #[error("Unable to access the camera: {0}")]
    Other(String),
}

impl CameraError {
    /// Maps a platform error name (as reported by media capture APIs) to the
    /// taxonomy. Unknown names keep their message under [`CameraError::Other`].
    pub fn classify(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                CameraError::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" => CameraError::NotFound,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                CameraError::Overconstrained
            }
            _ if message.is_empty() => CameraError::Other(name.to_string()),
            _ => CameraError::Other(message.to_string()),
        }
    }

    /// Stable identifier used in serialized events.
    pub fn kind(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => "permissionDenied",
            CameraError::NotFound => "notFound",
            CameraError::Overconstrained => "overconstrained",
            CameraError::Other(_) => "other",
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
            std::io::ErrorKind::NotFound => CameraError::NotFound,
            std::io::ErrorKind::InvalidInput => CameraError::Overconstrained,
            _ => CameraError::Other(err.to_string()),
        }
    }
}

/// A camera device that can hand out live streams.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn open(&self, request: StreamRequest) -> Result<Box<dyn FrameSource>, CameraError>;
}

/// A live stream. Dropping the box without calling [`FrameSource::stop`]
/// may leave the device busy, so the session always stops explicitly.
pub trait FrameSource: Send {
    /// Latest frame, or `None` while the stream has not buffered enough data.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Halt every track of the stream. Must tolerate repeated calls.
    fn stop(&mut self);
}
