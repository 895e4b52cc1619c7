use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

/// Domain interface for the facial-landmark inference engine.
///
/// Returns `Ok(None)` when no face is confidently detected. Only the first
/// face matters; implementations tracking several faces return the most
/// prominent one. Implementations may be stateful (e.g., video-mode
/// trackers), hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<FaceLandmarks>, Box<dyn std::error::Error>>;
}
