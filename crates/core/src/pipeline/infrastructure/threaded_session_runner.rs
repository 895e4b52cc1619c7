use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::capture_pipeline::CapturePipeline;
use crate::capture::domain::capture::{Capture, CaptureError};
use crate::detection::frame_source::{FrameHandle, FrameSource, FrameSourceError};
use crate::pipeline::liveness_engine::{CaptureTicket, EngineEffect, EngineEvent, LivenessEngine};
use crate::pipeline::session_logger::SessionLogger;
use crate::pipeline::session_snapshot::SessionSnapshot;
use crate::pipeline::session_status::SessionStatus;
use crate::shared::pose::{Orientation, Pose};

/// What the runner reports to its owner.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Snapshot(SessionSnapshot),
    CaptureTaken(Capture),
    CaptureFailed { pose: Pose, reason: String },
    Completed(Vec<Capture>),
}

enum Command {
    Start {
        reply: Sender<Result<(), FrameSourceError>>,
    },
    Reset,
    Shutdown,
}

type CaptureResult = (CaptureTicket, Result<Capture, CaptureError>);

/// Drives a [`LivenessEngine`] on a dedicated thread.
///
/// Layout: `frame source → engine thread ← dwell ticker`, with each capture
/// on its own short-lived worker reporting back to the engine thread. All
/// engine transitions happen on the engine thread, so they are serialized.
pub struct ThreadedSessionRunner {
    commands: Sender<Command>,
    events: Receiver<SessionEvent>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
    flash: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedSessionRunner {
    pub fn spawn(
        frame_source: FrameSource,
        pipeline: CapturePipeline,
        engine: LivenessEngine,
        poll_interval: Duration,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (capture_tx, capture_rx) = crossbeam_channel::unbounded();

        let snapshot = Arc::new(Mutex::new(engine.snapshot(false)));
        let flash = pipeline.flash_flag();

        let engine_loop = EngineLoop {
            orientations: frame_source.subscribe(),
            frames: frame_source.frame_handle(),
            frame_source,
            pipeline: Arc::new(pipeline),
            engine,
            latest: Orientation::None,
            capture_tx,
            events: event_tx,
            snapshot: Arc::clone(&snapshot),
            published: None,
            flash: Arc::clone(&flash),
            logger,
            pose_started: None,
        };

        let worker = std::thread::spawn(move || {
            engine_loop.run(command_rx, capture_rx, poll_interval.max(Duration::from_millis(1)))
        });

        Self {
            commands: command_tx,
            events: event_rx,
            snapshot,
            flash,
            worker: Some(worker),
        }
    }

    /// Starts a session; blocks until the camera delivers its first frame.
    ///
    /// On failure the session stays idle.
    pub fn start(&self) -> Result<(), FrameSourceError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(Command::Start { reply: reply_tx })
            .map_err(|_| FrameSourceError::Device("session runner has shut down".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| FrameSourceError::Device("session runner has shut down".to_string()))?
    }

    /// Abandons the session and releases the camera.
    pub fn reset(&self) {
        let _ = self.commands.send(Command::Reset);
    }

    /// Latest session state with the live flash flag.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut snapshot = lock(&self.snapshot).clone();
        snapshot.flash_visible = flash_shown(&self.flash, snapshot.status);
        snapshot
    }

    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events.clone()
    }

    /// Stops the engine thread and the camera.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.commands.send(Command::Shutdown);
            if handle.join().is_err() {
                log::error!("Session engine thread panicked");
            }
        }
    }
}

impl Drop for ThreadedSessionRunner {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

/// The flash only shows while a capture is underway.
fn flash_shown(flash: &AtomicBool, status: SessionStatus) -> bool {
    status == SessionStatus::Capturing && flash.load(Ordering::SeqCst)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct EngineLoop {
    frame_source: FrameSource,
    orientations: Receiver<Orientation>,
    frames: FrameHandle,
    pipeline: Arc<CapturePipeline>,
    engine: LivenessEngine,
    latest: Orientation,
    capture_tx: Sender<CaptureResult>,
    events: Sender<SessionEvent>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
    published: Option<SessionSnapshot>,
    flash: Arc<AtomicBool>,
    logger: Box<dyn SessionLogger>,
    pose_started: Option<Instant>,
}

impl EngineLoop {
    fn run(
        mut self,
        commands: Receiver<Command>,
        captures: Receiver<CaptureResult>,
        poll_interval: Duration,
    ) {
        let ticker = crossbeam_channel::tick(poll_interval);
        let orientations = self.orientations.clone();
        self.publish();

        loop {
            crossbeam_channel::select! {
                recv(commands) -> command => match command {
                    Ok(Command::Start { reply }) => {
                        let result = self.start();
                        let _ = reply.send(result);
                    }
                    Ok(Command::Reset) => self.reset(),
                    Ok(Command::Shutdown) | Err(_) => break,
                },
                recv(orientations) -> orientation => {
                    if let Ok(orientation) = orientation {
                        self.latest = orientation;
                        self.dispatch(EngineEvent::Orientation(orientation));
                    }
                },
                recv(ticker) -> _ => self.dispatch(EngineEvent::Tick(self.latest)),
                recv(captures) -> resolved => {
                    if let Ok((ticket, result)) = resolved {
                        self.resolve(ticket, result);
                    }
                },
            }
        }

        self.frame_source.stop();
        log::debug!("Session engine stopped");
    }

    fn start(&mut self) -> Result<(), FrameSourceError> {
        while self.orientations.try_recv().is_ok() {}
        self.latest = Orientation::None;

        match self.frame_source.start() {
            Ok(()) => {
                self.dispatch(EngineEvent::Start);
                Ok(())
            }
            Err(e) => {
                log::warn!("Could not start session: {e}");
                self.frame_source.stop();
                self.dispatch(EngineEvent::Reset);
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        self.frame_source.stop();
        // A worker still inside its flash lowers it again on exit.
        self.flash.store(false, Ordering::SeqCst);
        self.latest = Orientation::None;
        self.pose_started = None;
        self.dispatch(EngineEvent::Reset);
    }

    fn resolve(&mut self, ticket: CaptureTicket, result: Result<Capture, CaptureError>) {
        let fresh = self.engine.is_current(&ticket);
        let captured_before = self.engine.captures().len();
        let failure = result.as_ref().err().map(|e| e.to_string());

        let effects = self
            .engine
            .handle(EngineEvent::CaptureResolved { ticket, result }, Instant::now());
        if fresh {
            self.report_capture(ticket, captured_before, failure);
        }
        self.apply(effects);
    }

    fn report_capture(&mut self, ticket: CaptureTicket, captured_before: usize, failure: Option<String>) {
        if self.engine.captures().len() > captured_before {
            if let Some(pose_started) = self.pose_started {
                self.logger.timing(
                    &format!("pose_{}", ticket.pose),
                    pose_started.elapsed().as_secs_f64() * 1000.0,
                );
            }
            if let Some(capture) = self.engine.captures().last() {
                let _ = self.events.send(SessionEvent::CaptureTaken(capture.clone()));
            }
        } else {
            self.logger.metric("capture_failures", 1.0);
            let reason = failure.unwrap_or_else(|| "captured pose does not match".to_string());
            let _ = self.events.send(SessionEvent::CaptureFailed {
                pose: ticket.pose,
                reason,
            });
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        let effects = self.engine.handle(event, Instant::now());
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<EngineEffect>) {
        for effect in effects {
            match effect {
                EngineEffect::RequestCapture(ticket) => self.spawn_capture(ticket),
                EngineEffect::PoseAdvanced(pose) => {
                    self.pose_started = Some(Instant::now());
                    self.logger.info(&format!(
                        "Step {}: {}",
                        pose.sequence_index() + 1,
                        pose.descriptor().instruction
                    ));
                }
                EngineEffect::Completed => {
                    self.frame_source.stop();
                    self.logger.summary();
                    let captures = self.engine.captures().to_vec();
                    let _ = self.events.send(SessionEvent::Completed(captures));
                }
            }
        }
        self.publish();
    }

    fn spawn_capture(&self, ticket: CaptureTicket) {
        let pipeline = Arc::clone(&self.pipeline);
        let frames = self.frames.clone();
        let results = self.capture_tx.clone();
        std::thread::spawn(move || {
            let result = pipeline.capture(&frames, ticket.pose);
            let _ = results.send((ticket, result));
        });
    }

    /// Publishes a snapshot when anything visible changed.
    fn publish(&mut self) {
        let snapshot = self
            .engine
            .snapshot(flash_shown(&self.flash, self.engine.status()));
        let changed = match &self.published {
            None => true,
            Some(previous) => {
                previous.status != snapshot.status
                    || previous.pose_index != snapshot.pose_index
                    || previous.captures.len() != snapshot.captures.len()
                    || previous.dwell_progress != snapshot.dwell_progress
                    || previous.flash_visible != snapshot.flash_visible
            }
        };
        if !changed {
            return;
        }

        self.logger.snapshot(&snapshot);
        *lock(&self.snapshot) = snapshot.clone();
        let _ = self.events.send(SessionEvent::Snapshot(snapshot.clone()));
        self.published = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::camera::Camera;
    use crate::capture::infrastructure::jpeg_still_encoder::JpegStillEncoder;
    use crate::detection::domain::face_landmarks::{
        FaceLandmarks, LEFT_CHEEK, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_CHEEK, RIGHT_EYE_OUTER,
    };
    use crate::detection::domain::landmark_detector::LandmarkDetector;
    use crate::detection::domain::orientation_classifier::OrientationClassifier;
    use crate::pipeline::liveness_engine::EngineConfig;
    use crate::pipeline::session_logger::NullSessionLogger;
    use crate::shared::frame::Frame;
    use crate::shared::pose::POSE_SEQUENCE;

    const WAIT: Duration = Duration::from_secs(5);

    // ── Stubs ────────────────────────────────────────────────────────

    struct StubCamera {
        fail_open: bool,
        next_index: usize,
    }

    impl Camera for StubCamera {
        fn open(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("device busy".into());
            }
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            std::thread::sleep(Duration::from_millis(2));
            let index = self.next_index;
            self.next_index += 1;
            Ok(Some(Frame::new(vec![128u8; 8 * 8 * 3], 8, 8, 3, index)))
        }

        fn close(&mut self) {}
    }

    /// Reports a face turned whichever way the test currently asks for.
    struct StubDetector {
        nose_x: Arc<Mutex<Option<f64>>>,
    }

    impl LandmarkDetector for StubDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Option<FaceLandmarks>, Box<dyn std::error::Error>> {
            Ok(self.nose_x.lock().unwrap().map(|nose_x| {
                let mut points = vec![(0.5, 0.5); 478];
                points[LEFT_EYE_OUTER] = (0.40, 0.40);
                points[RIGHT_EYE_OUTER] = (0.60, 0.40);
                points[NOSE_TIP] = (nose_x, 0.55);
                points[LEFT_CHEEK] = (0.30, 0.50);
                points[RIGHT_CHEEK] = (0.70, 0.50);
                FaceLandmarks::new(points)
            }))
        }
    }

    fn nose_for(pose: Pose) -> f64 {
        match pose {
            Pose::Left => 0.40,
            Pose::Center => 0.50,
            Pose::Right => 0.60,
        }
    }

    fn runner(fail_open: bool, flash: Duration) -> (ThreadedSessionRunner, Arc<Mutex<Option<f64>>>) {
        let nose_x = Arc::new(Mutex::new(None));
        let source = FrameSource::new(
            Box::new(StubCamera {
                fail_open,
                next_index: 0,
            }),
            Ok(Box::new(StubDetector {
                nose_x: nose_x.clone(),
            })),
            OrientationClassifier::default(),
            5,
        );
        let pipeline = CapturePipeline::new(Box::new(JpegStillEncoder::default()), flash);
        let engine = LivenessEngine::new(EngineConfig {
            dwell: Duration::from_millis(60),
            settle: Duration::from_millis(20),
            progress_steps: 30,
        });
        let runner = ThreadedSessionRunner::spawn(
            source,
            pipeline,
            engine,
            Duration::from_millis(5),
            Box::new(NullSessionLogger),
        );
        (runner, nose_x)
    }

    fn wait_for<F>(events: &Receiver<SessionEvent>, mut predicate: F) -> SessionEvent
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = events
                .recv_timeout(remaining)
                .expect("timed out waiting for session event");
            if predicate(&event) {
                return event;
            }
        }
    }

    // ── session flow ─────────────────────────────────────────────────

    #[test]
    fn test_full_session_completes_once() {
        let (runner, nose_x) = runner(false, Duration::from_millis(5));
        let events = runner.events();
        runner.start().unwrap();
        assert_eq!(runner.snapshot().status, SessionStatus::Active);

        for pose in POSE_SEQUENCE {
            *nose_x.lock().unwrap() = Some(nose_for(pose));
            let taken = wait_for(&events, |e| matches!(e, SessionEvent::CaptureTaken(_)));
            match taken {
                SessionEvent::CaptureTaken(capture) => assert_eq!(capture.pose(), pose),
                _ => unreachable!(),
            }
        }

        let completed = wait_for(&events, |e| matches!(e, SessionEvent::Completed(_)));
        match completed {
            SessionEvent::Completed(captures) => {
                let poses: Vec<Pose> = captures.iter().map(|c| c.pose()).collect();
                assert_eq!(poses, POSE_SEQUENCE.to_vec());
                assert!(captures.iter().all(|c| c.image().mime_type() == "image/jpeg"));
            }
            _ => unreachable!(),
        }

        let snapshot = runner.snapshot();
        assert!(snapshot.is_completed());
        assert_eq!(snapshot.captures.len(), 3);

        std::thread::sleep(Duration::from_millis(50));
        let extra_completions = events
            .try_iter()
            .filter(|e| matches!(e, SessionEvent::Completed(_)))
            .count();
        assert_eq!(extra_completions, 0);
        runner.shutdown();
    }

    #[test]
    fn test_start_failure_leaves_session_idle() {
        let (runner, nose_x) = runner(true, Duration::from_millis(5));
        *nose_x.lock().unwrap() = Some(0.40);
        let events = runner.events();

        match runner.start() {
            Err(FrameSourceError::Device(msg)) => assert!(msg.contains("device busy")),
            other => panic!("expected device error, got {other:?}"),
        }
        assert_eq!(runner.snapshot().status, SessionStatus::Idle);

        std::thread::sleep(Duration::from_millis(100));
        for event in events.try_iter() {
            match event {
                SessionEvent::Snapshot(snapshot) => {
                    assert_eq!(snapshot.status, SessionStatus::Idle)
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        runner.shutdown();
    }

    #[test]
    fn test_reset_during_capture_discards_result() {
        let (runner, nose_x) = runner(false, Duration::from_millis(150));
        let events = runner.events();
        runner.start().unwrap();
        *nose_x.lock().unwrap() = Some(nose_for(Pose::Left));

        wait_for(&events, |e| {
            matches!(e, SessionEvent::Snapshot(s) if s.status == SessionStatus::Capturing)
        });
        runner.reset();

        std::thread::sleep(Duration::from_millis(300));
        for event in events.try_iter() {
            assert!(
                !matches!(event, SessionEvent::CaptureTaken(_)),
                "capture leaked past reset"
            );
        }
        let snapshot = runner.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert!(snapshot.captures.is_empty());
        assert!(!snapshot.flash_visible);
        runner.shutdown();
    }

    #[test]
    fn test_reset_lowers_flash_while_capture_is_sleeping() {
        let (runner, nose_x) = runner(false, Duration::from_millis(400));
        let events = runner.events();
        runner.start().unwrap();
        *nose_x.lock().unwrap() = Some(nose_for(Pose::Left));

        let deadline = Instant::now() + WAIT;
        while !runner.snapshot().flash_visible {
            assert!(Instant::now() < deadline, "flash never raised");
            std::thread::sleep(Duration::from_millis(2));
        }
        let flash_raised = Instant::now();

        runner.reset();
        wait_for(&events, |e| {
            matches!(e, SessionEvent::Snapshot(s) if s.status == SessionStatus::Idle)
        });
        assert!(flash_raised.elapsed() < Duration::from_millis(400));
        assert!(!runner.snapshot().flash_visible);
        runner.shutdown();
    }

    #[test]
    fn test_no_face_never_captures() {
        let (runner, _nose_x) = runner(false, Duration::from_millis(5));
        let events = runner.events();
        runner.start().unwrap();

        std::thread::sleep(Duration::from_millis(200));
        assert!(events
            .try_iter()
            .all(|e| matches!(e, SessionEvent::Snapshot(_))));
        assert_eq!(runner.snapshot().status, SessionStatus::Active);
        assert!(runner.snapshot().captures.is_empty());
        runner.shutdown();
    }

    #[test]
    fn test_restart_after_completion() {
        let (runner, nose_x) = runner(false, Duration::from_millis(5));
        let events = runner.events();
        runner.start().unwrap();
        for pose in POSE_SEQUENCE {
            *nose_x.lock().unwrap() = Some(nose_for(pose));
            wait_for(&events, |e| matches!(e, SessionEvent::CaptureTaken(_)));
        }
        wait_for(&events, |e| matches!(e, SessionEvent::Completed(_)));

        *nose_x.lock().unwrap() = None;
        runner.start().unwrap();
        let snapshot = runner.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Active);
        assert!(snapshot.captures.is_empty());
        assert_eq!(snapshot.current_pose, Some(Pose::Left));
        runner.shutdown();
    }

    #[test]
    fn test_drop_without_shutdown_stops_thread() {
        let (runner, _) = runner(false, Duration::from_millis(5));
        runner.start().unwrap();
        drop(runner);
    }
}
