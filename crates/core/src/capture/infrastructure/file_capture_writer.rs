use std::path::{Path, PathBuf};

use crate::capture::domain::capture::Capture;
use crate::capture::domain::capture_writer::CaptureWriter;

/// Writes a capture's encoded bytes to `<dir>/<capture file name>`.
pub struct FileCaptureWriter;

impl FileCaptureWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileCaptureWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureWriter for FileCaptureWriter {
    fn write(&self, dir: &Path, capture: &Capture) -> Result<PathBuf, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(capture.file_name());
        std::fs::write(&path, capture.image().bytes())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture::StillImage;
    use crate::shared::pose::Pose;
    use std::time::{Duration, UNIX_EPOCH};

    fn capture(pose: Pose) -> Capture {
        Capture::new(
            pose,
            StillImage::new(vec![0xFF, 0xD8, 0xFF, 0xD9], 1, 1, "image/jpeg"),
            UNIX_EPOCH + Duration::from_millis(1234),
        )
    }

    #[test]
    fn test_write_creates_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = FileCaptureWriter::new()
            .write(dir.path(), &capture(Pose::Left))
            .unwrap();
        assert_eq!(path, dir.path().join("liveness-left-1234.jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn test_write_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = FileCaptureWriter::new()
            .write(&nested, &capture(Pose::Center))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_invalid_path_returns_error() {
        let writer = FileCaptureWriter::new();
        assert!(writer
            .write(Path::new("/nonexistent/dir/\0bad"), &capture(Pose::Right))
            .is_err());
    }
}
