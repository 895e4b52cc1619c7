use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};

use poseguard_core::camera::infrastructure::image_sequence_camera::ImageSequenceCamera;
use poseguard_core::capture::capture_pipeline::CapturePipeline;
use poseguard_core::capture::domain::capture::Capture;
use poseguard_core::capture::infrastructure::file_capture_writer::FileCaptureWriter;
use poseguard_core::capture::infrastructure::jpeg_still_encoder::JpegStillEncoder;
use poseguard_core::detection::domain::landmark_detector::LandmarkDetector;
use poseguard_core::detection::domain::orientation_classifier::OrientationClassifier;
use poseguard_core::detection::frame_source::FrameSource;
use poseguard_core::detection::infrastructure::replay_landmark_detector::ReplayLandmarkDetector;
use poseguard_core::pipeline::export_captures_use_case::{ExportCapturesUseCase, MANIFEST_FILE_NAME};
use poseguard_core::pipeline::infrastructure::threaded_session_runner::{
    SessionEvent, ThreadedSessionRunner,
};
use poseguard_core::pipeline::liveness_engine::{EngineConfig, LivenessEngine};
use poseguard_core::pipeline::presentation::{ConsoleRenderer, DisplayModel, SnapshotRenderer};
use poseguard_core::pipeline::session_logger::StdoutSessionLogger;
use poseguard_core::shared::config::LivenessConfig;

/// Head-turn liveness check over a recorded camera stream.
#[derive(Parser, Debug)]
#[command(name = "poseguard")]
struct Cli {
    /// Directory of camera frames (images, played in name order).
    frames: PathBuf,

    /// Landmark track JSON: one entry per frame, `null` or `[[x, y], ...]`.
    #[arg(long)]
    landmarks: PathBuf,

    /// Directory for the captured stills and manifest.json.
    #[arg(long)]
    output: PathBuf,

    /// Config file (defaults to the per-user config, if any).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera frame rate.
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Replay frames and landmarks in a loop.
    #[arg(long)]
    loop_frames: bool,

    /// Time a pose must be held before capture, in milliseconds.
    #[arg(long)]
    dwell_ms: Option<u64>,

    /// Pause after a capture before the next pose, in milliseconds.
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Capture flash duration, in milliseconds.
    #[arg(long)]
    flash_ms: Option<u64>,

    /// JPEG quality (1-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Give up after this many seconds.
    #[arg(long, default_value = "60")]
    timeout: u64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let camera = ImageSequenceCamera::new(&cli.frames, cli.fps).with_looping(cli.loop_frames);
    let detector = ReplayLandmarkDetector::load(&cli.landmarks).map(
        |detector| -> Box<dyn LandmarkDetector> {
            Box::new(detector.with_looping(cli.loop_frames))
        },
    );
    let source = FrameSource::new(
        Box::new(camera),
        detector,
        OrientationClassifier::new(config.orientation_threshold),
        config.first_frame_attempts,
    );
    let pipeline = CapturePipeline::new(
        Box::new(JpegStillEncoder::new(config.jpeg_quality)),
        config.flash(),
    );
    let engine = LivenessEngine::new(EngineConfig::from(&config));

    let runner = ThreadedSessionRunner::spawn(
        source,
        pipeline,
        engine,
        config.poll_interval(),
        Box::new(StdoutSessionLogger::new()),
    );
    let events = runner.events();
    runner.start()?;

    let result = wait_for_completion(&events, Duration::from_secs(cli.timeout));
    runner.shutdown();
    eprintln!();
    let captures = result?;

    let exported = ExportCapturesUseCase::new(Box::new(FileCaptureWriter::new()))
        .execute(&captures, &cli.output)?;
    log::info!(
        "Saved {} captures and {MANIFEST_FILE_NAME} to {}",
        exported.len(),
        cli.output.display()
    );
    Ok(())
}

fn wait_for_completion(
    events: &Receiver<SessionEvent>,
    timeout: Duration,
) -> Result<Vec<Capture>, Box<dyn std::error::Error>> {
    let renderer = ConsoleRenderer::default();
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(SessionEvent::Snapshot(snapshot)) => {
                let line = renderer.render(&DisplayModel::from_snapshot(&snapshot));
                eprint!("\r{line:<100}");
            }
            Ok(SessionEvent::CaptureTaken(capture)) => {
                log::debug!("Captured {}", capture.pose());
            }
            Ok(SessionEvent::CaptureFailed { pose, reason }) => {
                log::warn!("Capture for {pose} failed, hold the pose again: {reason}");
            }
            Ok(SessionEvent::Completed(captures)) => return Ok(captures),
            Err(RecvTimeoutError::Timeout) => {
                return Err(format!("Session timed out after {}s", timeout.as_secs()).into())
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err("Session ended before completion".into())
            }
        }
    }
}

fn build_config(cli: &Cli) -> Result<LivenessConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => LivenessConfig::load_from(path)?,
        None => LivenessConfig::load(),
    };
    if let Some(dwell_ms) = cli.dwell_ms {
        config.dwell_ms = dwell_ms;
    }
    if let Some(settle_ms) = cli.settle_ms {
        config.settle_ms = settle_ms;
    }
    if let Some(flash_ms) = cli.flash_ms {
        config.flash_ms = flash_ms;
    }
    if let Some(quality) = cli.quality {
        config.jpeg_quality = quality;
    }
    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames.is_dir() {
        return Err(format!("Frames directory not found: {}", cli.frames.display()).into());
    }
    if !cli.landmarks.is_file() {
        return Err(format!("Landmark track not found: {}", cli.landmarks.display()).into());
    }
    if cli.output.exists() && !cli.output.is_dir() {
        return Err(format!("Output is not a directory: {}", cli.output.display()).into());
    }
    if !(cli.fps > 0.0 && cli.fps <= 240.0) {
        return Err(format!("FPS must be between 0 and 240, got {}", cli.fps).into());
    }
    if let Some(q) = cli.quality {
        if !(1..=100).contains(&q) {
            return Err(format!("Quality must be between 1 and 100, got {q}").into());
        }
    }
    if cli.timeout == 0 {
        return Err("Timeout must be at least one second".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let frames = tmp.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        let track = tmp.path().join("track.json");
        std::fs::write(&track, "[null]").unwrap();
        (tmp, frames, track)
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("poseguard").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_validate_accepts_existing_inputs() {
        let (tmp, frames, track) = fixture();
        let out = tmp.path().join("out");
        let cli = parse(&[
            frames.to_str().unwrap(),
            "--landmarks",
            track.to_str().unwrap(),
            "--output",
            out.to_str().unwrap(),
        ]);
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_frames_dir() {
        let (tmp, _frames, track) = fixture();
        let cli = parse(&[
            tmp.path().join("nope").to_str().unwrap(),
            "--landmarks",
            track.to_str().unwrap(),
            "--output",
            tmp.path().to_str().unwrap(),
        ]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_quality_and_fps() {
        let (tmp, frames, track) = fixture();
        let base = [
            frames.to_str().unwrap().to_string(),
            "--landmarks".to_string(),
            track.to_str().unwrap().to_string(),
            "--output".to_string(),
            tmp.path().to_str().unwrap().to_string(),
        ];
        let with = |extra: &[&str]| {
            let mut args: Vec<&str> = base.iter().map(String::as_str).collect();
            args.extend_from_slice(extra);
            parse(&args)
        };
        assert!(validate(&with(&["--quality", "0"])).is_err());
        assert!(validate(&with(&["--fps", "0"])).is_err());
        assert!(validate(&with(&["--timeout", "0"])).is_err());
    }

    #[test]
    fn test_build_config_applies_overrides() {
        let (tmp, frames, track) = fixture();
        let config_path = tmp.path().join("config.json");
        std::fs::write(&config_path, r#"{ "dwell_ms": 1500, "settle_ms": 400 }"#).unwrap();
        let cli = parse(&[
            frames.to_str().unwrap(),
            "--landmarks",
            track.to_str().unwrap(),
            "--output",
            tmp.path().to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "--settle-ms",
            "100",
            "--quality",
            "80",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.dwell_ms, 1500);
        assert_eq!(config.settle_ms, 100);
        assert_eq!(config.jpeg_quality, 80);
    }

    #[test]
    fn test_build_config_rejects_zero_dwell_override() {
        let (tmp, frames, track) = fixture();
        let config_path = tmp.path().join("config.json");
        std::fs::write(&config_path, "{}").unwrap();
        let cli = parse(&[
            frames.to_str().unwrap(),
            "--landmarks",
            track.to_str().unwrap(),
            "--output",
            tmp.path().to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "--dwell-ms",
            "0",
        ]);
        assert!(build_config(&cli).is_err());
    }
}
