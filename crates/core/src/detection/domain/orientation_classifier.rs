//! Coarse head orientation from face-mesh anchors.
//!
//! The nose offset from the eye midpoint is divided by face width (cheek to
//! cheek), so the result does not depend on how far the subject sits from
//! the camera. Offsets inside `±threshold` read as `Center`.

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::constants::DEFAULT_ORIENTATION_THRESHOLD;
use crate::shared::pose::Orientation;

/// Face widths at or below this are treated as degenerate input.
const MIN_FACE_WIDTH: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientationClassifier {
    threshold: f64,
}

impl OrientationClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, landmarks: Option<&FaceLandmarks>) -> Orientation {
        match landmarks.and_then(|lm| self.normalized_offset(lm)) {
            None => Orientation::None,
            Some(offset) if offset < -self.threshold => Orientation::Left,
            Some(offset) if offset > self.threshold => Orientation::Right,
            Some(_) => Orientation::Center,
        }
    }

    /// Signed nose offset relative to face width; negative means turned left.
    pub fn normalized_offset(&self, landmarks: &FaceLandmarks) -> Option<f64> {
        let anchors = landmarks.anchors()?;

        let eye_center_x = (anchors.left_eye_outer.0 + anchors.right_eye_outer.0) / 2.0;
        let nose_offset = anchors.nose_tip.0 - eye_center_x;
        let face_width = (anchors.right_cheek.0 - anchors.left_cheek.0).abs();

        if face_width <= MIN_FACE_WIDTH {
            return None;
        }

        Some(nose_offset / face_width)
    }
}

impl Default for OrientationClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ORIENTATION_THRESHOLD)
    }
}
