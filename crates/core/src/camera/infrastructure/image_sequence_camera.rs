use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::camera::domain::camera::Camera;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Replays a directory of still images as a camera stream.
///
/// Files with a known image extension are played in file-name order at a
/// fixed frame rate. Each frame is decoded on demand with the `image`
/// crate, so memory stays flat for long recordings. Frame indices keep
/// counting across loops so a replayed landmark track stays aligned.
pub struct ImageSequenceCamera {
    dir: PathBuf,
    frame_interval: Duration,
    looping: bool,
    files: Vec<PathBuf>,
    cursor: usize,
    frames_read: usize,
    next_due: Option<Instant>,
    open: bool,
}

impl ImageSequenceCamera {
    pub fn new(dir: &Path, fps: f64) -> Self {
        let frame_interval = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Self {
            dir: dir.to_path_buf(),
            frame_interval,
            looping: false,
            files: Vec::new(),
            cursor: 0,
            frames_read: 0,
            next_due: None,
            open: false,
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| format!("Cannot open camera source {}: {e}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn wait_for_next_frame(&mut self) {
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(Instant::now() + self.frame_interval);
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl Camera for ImageSequenceCamera {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let files = Self::list_images(&self.dir)?;
        if files.is_empty() {
            return Err(format!("No image frames found in {}", self.dir.display()).into());
        }
        log::debug!(
            "Opened image sequence {} ({} frames)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        self.frames_read = 0;
        self.next_due = None;
        self.open = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if !self.open {
            return Err("ImageSequenceCamera: not opened".into());
        }
        if self.cursor >= self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }

        self.wait_for_next_frame();

        let path = &self.files[self.cursor];
        let img = image::open(path)
            .map_err(|e| format!("Failed to decode frame {}: {e}", path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        let frame = Frame::new(img.into_raw(), width, height, 3, self.frames_read);

        self.cursor += 1;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.files.clear();
        self.cursor = 0;
        self.next_due = None;
        self.open = false;
    }
}
