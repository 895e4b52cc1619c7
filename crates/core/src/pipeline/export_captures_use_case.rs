use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::capture::domain::capture::Capture;
use crate::capture::domain::capture_writer::CaptureWriter;
use crate::shared::pose::Pose;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// One manifest entry per exported still.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedCapture {
    pub pose: Pose,
    pub file: String,
    pub captured_at_ms: u128,
    pub width: u32,
    pub height: u32,
}

/// Downloads session captures: one file per capture plus `manifest.json`.
pub struct ExportCapturesUseCase {
    writer: Box<dyn CaptureWriter>,
}

impl ExportCapturesUseCase {
    pub fn new(writer: Box<dyn CaptureWriter>) -> Self {
        Self { writer }
    }

    /// Writes a single capture and returns its path.
    pub fn download(
        &self,
        capture: &Capture,
        output_dir: &Path,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = self.writer.write(output_dir, capture)?;
        log::info!("Saved {} capture to {}", capture.pose(), path.display());
        Ok(path)
    }

    pub fn execute(
        &self,
        captures: &[Capture],
        output_dir: &Path,
    ) -> Result<Vec<ExportedCapture>, Box<dyn std::error::Error>> {
        if captures.is_empty() {
            return Err("No captures to export".into());
        }

        let mut exported = Vec::with_capacity(captures.len());
        for capture in captures {
            let path = self.download(capture, output_dir)?;
            let file = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| capture.file_name());
            exported.push(ExportedCapture {
                pose: capture.pose(),
                file,
                captured_at_ms: capture.captured_at_millis(),
                width: capture.image().width(),
                height: capture.image().height(),
            });
        }

        let manifest = serde_json::to_string_pretty(&exported)?;
        std::fs::write(output_dir.join(MANIFEST_FILE_NAME), manifest)?;
        Ok(exported)
    }
}
