use std::fs;
use std::path::Path;

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::frame::Frame;

/// Replays a recorded landmark track instead of running a vision model.
///
/// The track is a JSON array with one entry per camera frame: either `null`
/// (no face) or an array of `[x, y]` mesh points. Entries are looked up by
/// frame index; frames past the end of the track report no face, unless the
/// track loops along with a looping camera.
pub struct ReplayLandmarkDetector {
    track: Vec<Option<FaceLandmarks>>,
    looping: bool,
}

impl ReplayLandmarkDetector {
    pub fn new(track: Vec<Option<FaceLandmarks>>) -> Self {
        Self {
            track,
            looping: false,
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read landmark track {}: {e}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let raw: Vec<Option<Vec<[f64; 2]>>> = serde_json::from_str(json)?;
        if raw.is_empty() {
            return Err("Landmark track is empty".into());
        }
        let track = raw
            .into_iter()
            .map(|entry| {
                entry.map(|points| FaceLandmarks::new(points.into_iter().map(|[x, y]| (x, y)).collect()))
            })
            .collect();
        Ok(Self::new(track))
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }
}

impl LandmarkDetector for ReplayLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<FaceLandmarks>, Box<dyn std::error::Error>> {
        if self.track.is_empty() {
            return Ok(None);
        }
        let index = if self.looping {
            frame.index() % self.track.len()
        } else {
            frame.index()
        };
        Ok(self.track.get(index).cloned().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 2 * 2 * 3], 2, 2, 3, index)
    }

    #[test]
    fn test_from_json_parses_faces_and_gaps() {
        let json = r#"[ [[0.1, 0.2], [0.3, 0.4]], null, [] ]"#;
        let mut detector = ReplayLandmarkDetector::from_json(json).unwrap();
        assert_eq!(detector.len(), 3);

        let first = detector.detect(&frame(0)).unwrap().unwrap();
        assert_eq!(first.points(), &[(0.1, 0.2), (0.3, 0.4)]);
        assert!(detector.detect(&frame(1)).unwrap().is_none());
        assert!(detector.detect(&frame(2)).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_past_end_reports_no_face() {
        let mut detector = ReplayLandmarkDetector::from_json("[[[0.5, 0.5]]]").unwrap();
        assert!(detector.detect(&frame(0)).unwrap().is_some());
        assert!(detector.detect(&frame(1)).unwrap().is_none());
        assert!(detector.detect(&frame(100)).unwrap().is_none());
    }

    #[test]
    fn test_looping_wraps_frame_index() {
        let mut detector = ReplayLandmarkDetector::from_json("[null, [[0.5, 0.5]]]")
            .unwrap()
            .with_looping(true);
        assert!(detector.detect(&frame(2)).unwrap().is_none());
        assert!(detector.detect(&frame(3)).unwrap().is_some());
    }

    #[test]
    fn test_empty_track_is_error() {
        assert!(ReplayLandmarkDetector::from_json("[]").is_err());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(ReplayLandmarkDetector::from_json("{\"frames\": 1}").is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("track.json");
        fs::write(&path, "[null, null]").unwrap();
        let detector = ReplayLandmarkDetector::load(&path).unwrap();
        assert_eq!(detector.len(), 2);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(ReplayLandmarkDetector::load(&tmp.path().join("nope.json")).is_err());
    }
}
