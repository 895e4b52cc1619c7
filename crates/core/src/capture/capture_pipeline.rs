use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::capture::domain::capture::{Capture, CaptureError};
use crate::capture::domain::frame_provider::FrameProvider;
use crate::capture::domain::still_encoder::StillEncoder;
use crate::shared::constants::DEFAULT_FLASH_MS;
use crate::shared::pose::Pose;

/// Takes one still for one pose: flash, sample the current frame, encode.
///
/// The flash flag is shared so a renderer can draw the overlay while the
/// pipeline waits. It is lowered on every exit path.
pub struct CapturePipeline {
    encoder: Box<dyn StillEncoder>,
    flash: Arc<AtomicBool>,
    flash_duration: Duration,
}

/// Clears the flash flag when the capture attempt ends.
struct FlashGuard<'a>(&'a AtomicBool);

impl<'a> FlashGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FlashGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CapturePipeline {
    pub fn new(encoder: Box<dyn StillEncoder>, flash_duration: Duration) -> Self {
        Self {
            encoder,
            flash: Arc::new(AtomicBool::new(false)),
            flash_duration,
        }
    }

    pub fn with_default_flash(encoder: Box<dyn StillEncoder>) -> Self {
        Self::new(encoder, Duration::from_millis(DEFAULT_FLASH_MS))
    }

    pub fn flash_visible(&self) -> bool {
        self.flash.load(Ordering::SeqCst)
    }

    pub fn flash_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flash)
    }

    pub fn flash_duration(&self) -> Duration {
        self.flash_duration
    }

    /// Blocks for the flash duration, then encodes whatever frame is current.
    ///
    /// The frame is sampled after the flash so the subject has had time to
    /// hold still.
    pub fn capture(&self, frames: &dyn FrameProvider, pose: Pose) -> Result<Capture, CaptureError> {
        let _flash = FlashGuard::raise(&self.flash);
        if !self.flash_duration.is_zero() {
            std::thread::sleep(self.flash_duration);
        }

        let frame = frames
            .current_frame()
            .ok_or(CaptureError::FrameNotReady { width: 0, height: 0 })?;
        if !frame.has_valid_dimensions() {
            return Err(CaptureError::FrameNotReady {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let image = self
            .encoder
            .encode(&frame)
            .map_err(|e| CaptureError::Encoding(e.to_string()))?;

        log::debug!(
            "Captured {pose} still ({}x{}, {} bytes)",
            image.width(),
            image.height(),
            image.bytes().len()
        );
        Ok(Capture::new(pose, image, SystemTime::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture::StillImage;
    use crate::shared::frame::Frame;
    use std::sync::Mutex;

    // ── Stubs ────────────────────────────────────────────────────────

    struct StubFrames(Option<Frame>);

    impl FrameProvider for StubFrames {
        fn current_frame(&self) -> Option<Frame> {
            self.0.clone()
        }
    }

    /// Records whether the flash was up while encoding.
    struct StubEncoder {
        flash: Mutex<Option<Arc<AtomicBool>>>,
        saw_flash: Arc<AtomicBool>,
        fail: bool,
    }

    impl StubEncoder {
        fn new(fail: bool) -> Self {
            Self {
                flash: Mutex::new(None),
                saw_flash: Arc::new(AtomicBool::new(false)),
                fail,
            }
        }
    }

    impl StillEncoder for StubEncoder {
        fn encode(&self, frame: &Frame) -> Result<StillImage, Box<dyn std::error::Error>> {
            if let Some(flag) = self.flash.lock().unwrap().as_ref() {
                self.saw_flash.store(flag.load(Ordering::SeqCst), Ordering::SeqCst);
            }
            if self.fail {
                return Err("encoder exploded".into());
            }
            Ok(StillImage::new(vec![7; 4], frame.width(), frame.height(), "image/jpeg"))
        }
    }

    fn rgb_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![0u8; (width * height * 3) as usize], width, height, 3, 0)
    }

    fn pipeline_with(encoder: StubEncoder) -> CapturePipeline {
        CapturePipeline::new(Box::new(encoder), Duration::from_millis(5))
    }

    // ── capture ──────────────────────────────────────────────────────

    #[test]
    fn test_capture_encodes_current_frame() {
        let pipeline = pipeline_with(StubEncoder::new(false));
        let frames = StubFrames(Some(rgb_frame(4, 2)));

        let capture = pipeline.capture(&frames, Pose::Left).unwrap();
        assert_eq!(capture.pose(), Pose::Left);
        assert_eq!(capture.image().width(), 4);
        assert_eq!(capture.image().height(), 2);
        assert!(!pipeline.flash_visible());
    }

    #[test]
    fn test_flash_is_visible_during_encode() {
        let encoder = StubEncoder::new(false);
        let saw_flash = encoder.saw_flash.clone();
        let pipeline_flash = Arc::new(AtomicBool::new(false));
        let pipeline = CapturePipeline {
            encoder: {
                *encoder.flash.lock().unwrap() = Some(pipeline_flash.clone());
                Box::new(encoder)
            },
            flash: pipeline_flash,
            flash_duration: Duration::ZERO,
        };

        pipeline
            .capture(&StubFrames(Some(rgb_frame(2, 2))), Pose::Center)
            .unwrap();
        assert!(saw_flash.load(Ordering::SeqCst));
        assert!(!pipeline.flash_visible());
    }

    #[test]
    fn test_missing_frame_is_not_ready() {
        let pipeline = pipeline_with(StubEncoder::new(false));
        let result = pipeline.capture(&StubFrames(None), Pose::Right);
        assert_eq!(
            result.unwrap_err(),
            CaptureError::FrameNotReady { width: 0, height: 0 }
        );
        assert!(!pipeline.flash_visible());
    }

    #[test]
    fn test_zero_dimension_frame_is_not_ready() {
        let pipeline = pipeline_with(StubEncoder::new(false));
        let result = pipeline.capture(&StubFrames(Some(Frame::not_ready(3))), Pose::Left);
        assert!(matches!(result, Err(CaptureError::FrameNotReady { .. })));
        assert!(!pipeline.flash_visible());
    }

    #[test]
    fn test_encoder_failure_is_encoding_error() {
        let pipeline = pipeline_with(StubEncoder::new(true));
        let result = pipeline.capture(&StubFrames(Some(rgb_frame(2, 2))), Pose::Left);
        match result {
            Err(CaptureError::Encoding(msg)) => assert!(msg.contains("exploded")),
            other => panic!("expected encoding error, got {other:?}"),
        }
        assert!(!pipeline.flash_visible());
    }

    #[test]
    fn test_capture_waits_for_flash() {
        let pipeline = CapturePipeline::new(
            Box::new(StubEncoder::new(false)),
            Duration::from_millis(30),
        );
        let started = std::time::Instant::now();
        pipeline
            .capture(&StubFrames(Some(rgb_frame(2, 2))), Pose::Left)
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_default_flash_duration() {
        let pipeline = CapturePipeline::with_default_flash(Box::new(StubEncoder::new(false)));
        assert_eq!(pipeline.flash_duration(), Duration::from_millis(600));
    }
}
