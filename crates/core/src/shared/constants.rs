/// Continuous time a pose must be held before it is captured.
pub const DEFAULT_DWELL_MS: u64 = 1000;

/// Pause between a successful capture and the next pose instruction.
pub const DEFAULT_SETTLE_MS: u64 = 800;

/// How long the capture flash stays visible before the frame is sampled.
pub const DEFAULT_FLASH_MS: u64 = 600;

/// Dwell poll period, independent of camera frame rate.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Normalized nose offset beyond which the head counts as turned.
pub const DEFAULT_ORIENTATION_THRESHOLD: f64 = 0.15;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Discrete steps of the dwell progress bar.
pub const DEFAULT_DWELL_PROGRESS_STEPS: u32 = 30;

/// Frames to wait for valid dimensions before giving up on a camera.
pub const DEFAULT_FIRST_FRAME_ATTEMPTS: u32 = 30;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const CAPTURE_FILE_PREFIX: &str = "liveness";
pub const CAPTURE_FILE_EXTENSION: &str = "jpg";
