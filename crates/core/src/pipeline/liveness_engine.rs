//! The head-turn challenge as a pure state machine.
//!
//! Every input (commands, orientation samples, the dwell poll, capture
//! completions) goes through [`LivenessEngine::handle`] together with the
//! current time, and the engine answers with the side effects the caller
//! must perform. Nothing here sleeps or spawns, so timing is fully driven
//! by the caller.

use std::time::{Duration, Instant};

use crate::capture::domain::capture::{Capture, CaptureError};
use crate::pipeline::session_snapshot::SessionSnapshot;
use crate::pipeline::session_status::SessionStatus;
use crate::shared::config::LivenessConfig;
use crate::shared::constants::{
    DEFAULT_DWELL_MS, DEFAULT_DWELL_PROGRESS_STEPS, DEFAULT_SETTLE_MS,
};
use crate::shared::pose::{Orientation, Pose, POSE_COUNT, POSE_SEQUENCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub dwell: Duration,
    pub settle: Duration,
    pub progress_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dwell: Duration::from_millis(DEFAULT_DWELL_MS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            progress_steps: DEFAULT_DWELL_PROGRESS_STEPS,
        }
    }
}

impl From<&LivenessConfig> for EngineConfig {
    fn from(config: &LivenessConfig) -> Self {
        Self {
            dwell: config.dwell(),
            settle: config.settle(),
            progress_steps: config.dwell_progress_steps,
        }
    }
}

/// Identifies one capture request. Results carrying an outdated ticket are
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTicket {
    pub generation: u64,
    pub pose_index: usize,
    pub pose: Pose,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Start,
    Reset,
    /// A fresh per-frame classification.
    Orientation(Orientation),
    /// The fixed-period dwell poll, carrying the latest orientation.
    Tick(Orientation),
    CaptureResolved {
        ticket: CaptureTicket,
        result: Result<Capture, CaptureError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEffect {
    /// Take a still for `ticket.pose` and report back with the same ticket.
    RequestCapture(CaptureTicket),
    /// The engine now asks for this pose.
    PoseAdvanced(Pose),
    /// All poses captured; the camera can be released.
    Completed,
}

pub struct LivenessEngine {
    config: EngineConfig,
    status: SessionStatus,
    pose_index: usize,
    captures: Vec<Capture>,
    dwell_start: Option<Instant>,
    held: Duration,
    capture_in_flight: bool,
    settle_deadline: Option<Instant>,
    generation: u64,
}

impl LivenessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            status: SessionStatus::Idle,
            pose_index: 0,
            captures: Vec::new(),
            dwell_start: None,
            held: Duration::ZERO,
            capture_in_flight: false,
            settle_deadline: None,
            generation: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn pose_index(&self) -> usize {
        self.pose_index
    }

    pub fn current_pose(&self) -> Option<Pose> {
        POSE_SEQUENCE.get(self.pose_index).copied()
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capture_in_flight(&self) -> bool {
        self.capture_in_flight
    }

    /// Time the current pose has been held without interruption.
    pub fn held(&self) -> Duration {
        self.held
    }

    /// Visual dwell progress in `0..=progress_steps`. Has no say in when a
    /// capture is taken.
    pub fn dwell_progress(&self) -> u32 {
        let dwell = self.config.dwell.as_secs_f64();
        if dwell <= 0.0 {
            return 0;
        }
        let steps = self.config.progress_steps;
        let raw = (self.held.as_secs_f64() / dwell * steps as f64).floor();
        (raw as u32).min(steps)
    }

    pub fn snapshot(&self, flash_visible: bool) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            current_pose: self.current_pose(),
            pose_index: self.pose_index,
            captures: self.captures.clone(),
            dwell_progress: self.dwell_progress(),
            dwell_progress_steps: self.config.progress_steps,
            flash_visible,
        }
    }

    /// The single transition function.
    pub fn handle(&mut self, event: EngineEvent, now: Instant) -> Vec<EngineEffect> {
        match event {
            EngineEvent::Start => self.start(),
            EngineEvent::Reset => {
                self.reset();
                Vec::new()
            }
            EngineEvent::Orientation(orientation) | EngineEvent::Tick(orientation) => {
                let mut effects = self.poll_settle(now);
                effects.extend(self.evaluate(orientation, now));
                effects
            }
            EngineEvent::CaptureResolved { ticket, result } => {
                self.resolve_capture(ticket, result, now)
            }
        }
    }

    fn start(&mut self) -> Vec<EngineEffect> {
        self.reset();
        if !self.set_status(SessionStatus::Active) {
            return Vec::new();
        }
        log::info!("Liveness session started (generation {})", self.generation);
        vec![EngineEffect::PoseAdvanced(POSE_SEQUENCE[0])]
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.status = SessionStatus::Idle;
        self.pose_index = 0;
        self.captures.clear();
        self.clear_dwell();
        self.capture_in_flight = false;
        self.settle_deadline = None;
    }

    fn clear_dwell(&mut self) {
        self.dwell_start = None;
        self.held = Duration::ZERO;
    }

    fn set_status(&mut self, to: SessionStatus) -> bool {
        match self.status.transition(to) {
            Ok(status) => {
                self.status = status;
                true
            }
            Err(e) => {
                log::error!("{e}");
                false
            }
        }
    }

    fn evaluate(&mut self, orientation: Orientation, now: Instant) -> Vec<EngineEffect> {
        if self.status != SessionStatus::Active {
            return Vec::new();
        }
        let Some(pose) = self.current_pose() else {
            return Vec::new();
        };

        if !orientation.matches(pose) {
            self.clear_dwell();
            return Vec::new();
        }

        match self.dwell_start {
            None => {
                self.dwell_start = Some(now);
                self.held = Duration::ZERO;
            }
            Some(start) => self.held = now.saturating_duration_since(start),
        }

        if self.held < self.config.dwell || self.capture_in_flight {
            return Vec::new();
        }
        if !self.set_status(SessionStatus::Capturing) {
            return Vec::new();
        }
        log::debug!("Pose {pose} held for {:?}, requesting capture", self.held);
        // Dwell only exists while active.
        self.clear_dwell();
        self.capture_in_flight = true;
        vec![EngineEffect::RequestCapture(CaptureTicket {
            generation: self.generation,
            pose_index: self.pose_index,
            pose,
        })]
    }

    fn poll_settle(&mut self, now: Instant) -> Vec<EngineEffect> {
        match self.settle_deadline {
            Some(deadline) if now >= deadline => self.advance(),
            _ => Vec::new(),
        }
    }

    fn advance(&mut self) -> Vec<EngineEffect> {
        self.settle_deadline = None;
        self.pose_index += 1;
        self.clear_dwell();
        if !self.set_status(SessionStatus::Active) {
            return Vec::new();
        }
        match self.current_pose() {
            Some(pose) => {
                log::info!("Next pose: {pose}");
                vec![EngineEffect::PoseAdvanced(pose)]
            }
            None => Vec::new(),
        }
    }

    /// Whether a result carrying `ticket` would still be applied.
    pub fn is_current(&self, ticket: &CaptureTicket) -> bool {
        ticket.generation == self.generation
            && self.capture_in_flight
            && ticket.pose_index == self.pose_index
    }

    fn resolve_capture(
        &mut self,
        ticket: CaptureTicket,
        result: Result<Capture, CaptureError>,
        now: Instant,
    ) -> Vec<EngineEffect> {
        if !self.is_current(&ticket) {
            log::debug!(
                "Discarding stale capture result for {} (generation {}, current {})",
                ticket.pose,
                ticket.generation,
                self.generation
            );
            return Vec::new();
        }
        self.capture_in_flight = false;

        let capture = match result {
            Ok(capture) if capture.pose() == ticket.pose => capture,
            Ok(capture) => {
                log::warn!(
                    "Capture for {} does not match requested pose {}",
                    capture.pose(),
                    ticket.pose
                );
                return self.retry_current_pose();
            }
            Err(e) => {
                log::warn!("Capture failed for {}: {e}", ticket.pose);
                return self.retry_current_pose();
            }
        };

        self.captures.push(capture);
        self.clear_dwell();

        if self.captures.len() >= POSE_COUNT {
            if !self.set_status(SessionStatus::Completed) {
                return Vec::new();
            }
            self.pose_index = POSE_COUNT;
            log::info!("Liveness session completed");
            return vec![EngineEffect::Completed];
        }

        if self.config.settle.is_zero() {
            return self.advance();
        }
        self.settle_deadline = Some(now + self.config.settle);
        Vec::new()
    }

    fn retry_current_pose(&mut self) -> Vec<EngineEffect> {
        self.clear_dwell();
        self.set_status(SessionStatus::Active);
        Vec::new()
    }
}

impl Default for LivenessEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
