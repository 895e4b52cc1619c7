use crate::capture::domain::capture::Capture;
use crate::pipeline::session_status::SessionStatus;
use crate::shared::pose::{Pose, POSE_COUNT};

/// Read-only view of a session, published after every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// `None` once every pose has been captured.
    pub current_pose: Option<Pose>,
    pub pose_index: usize,
    pub captures: Vec<Capture>,
    pub dwell_progress: u32,
    pub dwell_progress_steps: u32,
    pub flash_visible: bool,
}

impl SessionSnapshot {
    pub fn idle(dwell_progress_steps: u32) -> Self {
        Self {
            status: SessionStatus::Idle,
            current_pose: Some(Pose::Left),
            pose_index: 0,
            captures: Vec::new(),
            dwell_progress: 0,
            dwell_progress_steps,
            flash_visible: false,
        }
    }

    /// Captured poses over the total, in percent.
    pub fn progress_percent(&self) -> f64 {
        self.captures.len() as f64 / POSE_COUNT as f64 * 100.0
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn has_capture_for(&self, pose: Pose) -> bool {
        self.captures.iter().any(|c| c.pose() == pose)
    }
}
