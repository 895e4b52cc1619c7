use std::path::{Path, PathBuf};

use crate::capture::domain::capture::Capture;

/// Exports one capture into a directory, returning the written path.
pub trait CaptureWriter: Send {
    fn write(&self, dir: &Path, capture: &Capture) -> Result<PathBuf, Box<dyn std::error::Error>>;
}
