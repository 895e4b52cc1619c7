use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::shared::constants::{CAPTURE_FILE_EXTENSION, CAPTURE_FILE_PREFIX};
use crate::shared::pose::Pose;

/// Failures on the still-capture path. All of them are recoverable: the
/// session simply asks the user to hold the pose again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("frame not ready ({width}x{height})")]
    FrameNotReady { width: u32, height: u32 },
    #[error("failed to encode still image: {0}")]
    Encoding(String),
}

/// An encoded still image. Bytes are shared, never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StillImage {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
    mime_type: &'static str,
}

impl StillImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32, mime_type: &'static str) -> Self {
        Self {
            bytes: bytes.into(),
            width,
            height,
            mime_type,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }
}

/// One still image taken for one pose.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pose: Pose,
    image: StillImage,
    captured_at: SystemTime,
}

impl Capture {
    pub fn new(pose: Pose, image: StillImage, captured_at: SystemTime) -> Self {
        Self {
            pose,
            image,
            captured_at,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn image(&self) -> &StillImage {
        &self.image
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn captured_at_millis(&self) -> u128 {
        self.captured_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }

    /// Download name: `liveness-<pose>-<unix millis>.jpg`.
    pub fn file_name(&self) -> String {
        format!(
            "{CAPTURE_FILE_PREFIX}-{}-{}.{CAPTURE_FILE_EXTENSION}",
            self.pose,
            self.captured_at_millis()
        )
    }
}
