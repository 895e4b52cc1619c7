//! Camera + landmark engine lifecycle, publishing one orientation per frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::camera::domain::camera::Camera;
use crate::capture::domain::frame_provider::FrameProvider;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::detection::domain::orientation_classifier::OrientationClassifier;
use crate::shared::frame::Frame;
use crate::shared::pose::Orientation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameSourceError {
    #[error("camera unavailable: {0}")]
    Device(String),
    #[error("landmark engine failed to initialize: {0}")]
    EngineInit(String),
}

/// Cloneable view of the most recent valid camera frame.
#[derive(Clone, Default)]
pub struct FrameHandle {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl FrameHandle {
    fn slot(&self) -> MutexGuard<'_, Option<Frame>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self, frame: Frame) {
        *self.slot() = Some(frame);
    }

    fn clear(&self) {
        *self.slot() = None;
    }
}

impl FrameProvider for FrameHandle {
    fn current_frame(&self) -> Option<Frame> {
        self.slot().clone()
    }
}

/// State shared between the owner and the detection thread.
///
/// `running` is checked under the same lock that publishes, so nothing is
/// published once `stop` has flipped it.
struct Published {
    running: bool,
    orientation: Orientation,
    subscribers: Vec<Sender<Orientation>>,
}

impl Published {
    fn publish(&mut self, orientation: Orientation) {
        if !self.running {
            return;
        }
        self.orientation = orientation;
        self.subscribers.retain(|tx| tx.send(orientation).is_ok());
    }
}

type Devices = (Box<dyn Camera>, Box<dyn LandmarkDetector>);

/// Owns the camera and the landmark engine.
///
/// `start` blocks until the camera delivers its first frame with real
/// dimensions, then hands both devices to a detection thread. `stop` joins
/// that thread and takes the devices back, so a stopped source can be
/// started again.
pub struct FrameSource {
    camera: Option<Box<dyn Camera>>,
    detector: Option<Box<dyn LandmarkDetector>>,
    init_error: Option<String>,
    classifier: OrientationClassifier,
    first_frame_attempts: u32,
    published: Arc<Mutex<Published>>,
    frames: FrameHandle,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<Devices>>,
}

impl FrameSource {
    /// `detector` is the outcome of loading the inference engine; a failed
    /// load is reported by `start` as [`FrameSourceError::EngineInit`].
    pub fn new(
        camera: Box<dyn Camera>,
        detector: Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>>,
        classifier: OrientationClassifier,
        first_frame_attempts: u32,
    ) -> Self {
        let mut source = Self {
            camera: Some(camera),
            detector: None,
            init_error: None,
            classifier,
            first_frame_attempts: first_frame_attempts.max(1),
            published: Arc::new(Mutex::new(Published {
                running: false,
                orientation: Orientation::None,
                subscribers: Vec::new(),
            })),
            frames: FrameHandle::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
            worker: None,
        };
        source.install_detector(detector);
        source
    }

    /// Stops the source and swaps in a freshly loaded landmark engine.
    pub fn reinitialize(
        &mut self,
        detector: Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>>,
    ) {
        self.stop();
        self.install_detector(detector);
    }

    fn install_detector(
        &mut self,
        detector: Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>>,
    ) {
        match detector {
            Ok(detector) => {
                self.detector = Some(detector);
                self.init_error = None;
            }
            Err(e) => {
                log::error!("Landmark engine failed to initialize: {e}");
                self.detector = None;
                self.init_error = Some(e.to_string());
            }
        }
    }

    fn published(&self) -> MutexGuard<'_, Published> {
        self.published.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Receives every orientation published from now on.
    pub fn subscribe(&self) -> Receiver<Orientation> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.published().subscribers.push(tx);
        rx
    }

    /// Latest published orientation; `None` while stopped.
    pub fn orientation(&self) -> Orientation {
        self.published().orientation
    }

    pub fn frame_handle(&self) -> FrameHandle {
        self.frames.clone()
    }

    /// False once stopped or once the camera stream has ended.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished()) && self.published().running
    }

    /// Whether the landmark engine loaded.
    pub fn is_ready(&self) -> bool {
        self.init_error.is_none()
    }

    /// Acquires the camera and starts the detection loop. No-op if running.
    ///
    /// A loop that ended on its own (stream end, read failure) is joined
    /// first and the camera acquired again.
    pub fn start(&mut self) -> Result<(), FrameSourceError> {
        if self.worker.is_some() && !self.published().running {
            log::debug!("Detection loop already ended; reacquiring camera");
            self.stop();
        }
        if self.worker.is_some() {
            return Ok(());
        }

        let Some(detector) = self.detector.take() else {
            let reason = self
                .init_error
                .clone()
                .unwrap_or_else(|| "landmark detector unavailable".to_string());
            return Err(FrameSourceError::EngineInit(reason));
        };
        let Some(mut camera) = self.camera.take() else {
            self.detector = Some(detector);
            return Err(FrameSourceError::Device("camera was lost".to_string()));
        };

        let first = match acquire_first_frame(&mut *camera, self.first_frame_attempts) {
            Ok(frame) => frame,
            Err(e) => {
                camera.close();
                self.camera = Some(camera);
                self.detector = Some(detector);
                return Err(e);
            }
        };
        log::info!(
            "Camera ready ({}x{})",
            first.width(),
            first.height()
        );

        self.cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut published = self.published();
            published.running = true;
            published.orientation = Orientation::None;
        }

        let mut detection = DetectionLoop {
            camera,
            detector,
            classifier: self.classifier,
            frames: self.frames.clone(),
            published: Arc::clone(&self.published),
            cancelled: Arc::clone(&self.cancelled),
        };
        detection.process(first);
        self.worker = Some(std::thread::spawn(move || detection.run()));
        Ok(())
    }

    /// Halts the loop and releases the camera. Safe to call repeatedly or
    /// before `start`.
    pub fn stop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        {
            let mut published = self.published();
            published.running = false;
            published.orientation = Orientation::None;
        }

        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok((mut camera, detector)) => {
                    camera.close();
                    self.camera = Some(camera);
                    self.detector = Some(detector);
                    log::debug!("Camera released");
                }
                Err(_) => log::error!("Detection thread panicked; camera lost"),
            }
        }
        self.frames.clear();
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn acquire_first_frame(camera: &mut dyn Camera, attempts: u32) -> Result<Frame, FrameSourceError> {
    camera
        .open()
        .map_err(|e| FrameSourceError::Device(e.to_string()))?;

    for _ in 0..attempts {
        match camera.read_frame() {
            Ok(Some(frame)) if frame.has_valid_dimensions() => return Ok(frame),
            Ok(Some(_)) => continue,
            Ok(None) => {
                return Err(FrameSourceError::Device(
                    "stream ended before the first frame".to_string(),
                ))
            }
            Err(e) => return Err(FrameSourceError::Device(e.to_string())),
        }
    }
    Err(FrameSourceError::Device(format!(
        "no frame with valid dimensions after {attempts} attempts"
    )))
}

struct DetectionLoop {
    camera: Box<dyn Camera>,
    detector: Box<dyn LandmarkDetector>,
    classifier: OrientationClassifier,
    frames: FrameHandle,
    published: Arc<Mutex<Published>>,
    cancelled: Arc<AtomicBool>,
}

impl DetectionLoop {
    fn run(mut self) -> Devices {
        while !self.cancelled.load(Ordering::SeqCst) {
            match self.camera.read_frame() {
                Ok(Some(frame)) => self.process(frame),
                Ok(None) => {
                    log::info!("Camera stream ended");
                    self.finish();
                    break;
                }
                Err(e) => {
                    log::warn!("Camera read failed: {e}");
                    self.finish();
                    break;
                }
            }
        }
        (self.camera, self.detector)
    }

    fn process(&mut self, frame: Frame) {
        // Keeps the last orientation.
        if !frame.has_valid_dimensions() {
            log::trace!("Skipping frame {} with no dimensions", frame.index());
            return;
        }

        let landmarks = match self.detector.detect(&frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                log::warn!("Landmark detection failed on frame {}: {e}", frame.index());
                None
            }
        };
        let orientation = self.classifier.classify(landmarks.as_ref());

        self.frames.store(frame);
        self.publish(orientation);
    }

    /// Publishes a last `None` and marks the source as no longer running.
    fn finish(&self) {
        let mut published = self.published.lock().unwrap_or_else(|e| e.into_inner());
        published.publish(Orientation::None);
        published.running = false;
    }

    fn publish(&self, orientation: Orientation) {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .publish(orientation);
    }
}
