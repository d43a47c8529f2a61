use crate::decode::Frame;

use super::{FacingMode, FrameSource};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Holds the one live camera stream.
pub struct CameraSession {
    stream: Option<Box<dyn FrameSource>>,
    facing: Option<FacingMode>,
}

impl CameraSession {
    pub fn new() -> Self {
        Self {
            stream: None,
            facing: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Facing mode of the live stream, if any.
    pub fn facing(&self) -> Option<FacingMode> {
        self.facing
    }

    /// Bind a freshly opened stream. A stream that is somehow still bound
    /// gets stopped first so two never coexist.
    pub fn install(&mut self, stream: Box<dyn FrameSource>, facing: FacingMode) {
        if self.stream.is_some() {
            log_warn!("camera stream still bound while installing a new one; releasing it");
            self.release();
        }
        log_info!("camera stream bound ({})", facing.label());
        self.stream = Some(stream);
        self.facing = Some(facing);
    }

    /// Stop all tracks and drop the handle. Safe to call when idle.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            log_info!("camera stream released");
        }
        self.facing = None;
    }

    pub fn next_frame(&mut self) -> Option<Frame> {
        self.stream.as_mut().and_then(|stream| stream.next_frame())
    }
}

impl Default for CameraSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}
