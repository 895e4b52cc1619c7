//! Pure mapping from a session snapshot to what a UI shows.
//!
//! Renderers are strategies over [`DisplayModel`]; the engine never knows
//! how it is drawn.

use crate::pipeline::session_snapshot::SessionSnapshot;
use crate::pipeline::session_status::SessionStatus;
use crate::shared::pose::{Pose, POSES, POSE_COUNT};

pub const CAMERA_IDLE_TEXT: &str = "Caméra inactive";
pub const COMPLETED_TITLE: &str = "Vérification terminée !";
pub const COMPLETED_TEXT: &str = "Toutes les photos ont été capturées.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBadge {
    Hidden,
    Active,
    Capturing,
}

impl StatusBadge {
    fn for_status(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Active => StatusBadge::Active,
            SessionStatus::Capturing => StatusBadge::Capturing,
            SessionStatus::Idle | SessionStatus::Completed => StatusBadge::Hidden,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            StatusBadge::Hidden => "",
            StatusBadge::Active => "Active",
            StatusBadge::Capturing => "Capture...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub index: usize,
    pub pose: Pose,
    pub label: &'static str,
    pub instruction: &'static str,
    pub is_captured: bool,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub pose: Pose,
    pub label: &'static str,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayModel {
    pub badge: StatusBadge,
    /// Whole-number percentage of poses captured.
    pub progress_percent: u32,
    /// `"Étape n/3"` while a pose is being asked for.
    pub step_caption: Option<String>,
    pub instruction: Option<&'static str>,
    pub steps: Vec<StepView>,
    pub gallery: Vec<GalleryItem>,
    pub dwell_progress: u32,
    pub dwell_progress_steps: u32,
    pub flash_visible: bool,
    pub camera_active: bool,
    pub is_completed: bool,
}

impl DisplayModel {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let status = snapshot.status;
        let prompting = matches!(status, SessionStatus::Active | SessionStatus::Capturing);
        let current = snapshot.current_pose.filter(|_| prompting);

        let steps = POSES
            .iter()
            .enumerate()
            .map(|(index, descriptor)| StepView {
                index,
                pose: descriptor.id,
                label: descriptor.display_label,
                instruction: descriptor.instruction,
                is_captured: snapshot.has_capture_for(descriptor.id),
                is_current: index == snapshot.pose_index && status == SessionStatus::Active,
            })
            .collect();

        let gallery = snapshot
            .captures
            .iter()
            .map(|capture| GalleryItem {
                pose: capture.pose(),
                label: capture.pose().descriptor().display_label,
                file_name: capture.file_name(),
                width: capture.image().width(),
                height: capture.image().height(),
            })
            .collect();

        Self {
            badge: StatusBadge::for_status(status),
            progress_percent: snapshot.progress_percent().round() as u32,
            step_caption: current
                .map(|pose| format!("Étape {}/{POSE_COUNT}", pose.sequence_index() + 1)),
            instruction: current.map(|pose| pose.descriptor().instruction),
            steps,
            gallery,
            dwell_progress: snapshot.dwell_progress,
            dwell_progress_steps: snapshot.dwell_progress_steps,
            flash_visible: snapshot.flash_visible,
            camera_active: status != SessionStatus::Idle && status != SessionStatus::Completed,
            is_completed: snapshot.is_completed(),
        }
    }
}

/// Strategy for drawing a session.
pub trait SnapshotRenderer {
    fn render(&self, model: &DisplayModel) -> String;
}

/// One status line for a terminal.
pub struct ConsoleRenderer {
    bar_width: usize,
}

impl ConsoleRenderer {
    pub fn new(bar_width: usize) -> Self {
        Self {
            bar_width: bar_width.max(1),
        }
    }

    fn dwell_bar(&self, model: &DisplayModel) -> String {
        let steps = model.dwell_progress_steps.max(1) as usize;
        let filled = (model.dwell_progress as usize * self.bar_width / steps).min(self.bar_width);
        format!(
            "[{}{}]",
            "#".repeat(filled),
            "-".repeat(self.bar_width - filled)
        )
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new(20)
    }
}

impl SnapshotRenderer for ConsoleRenderer {
    fn render(&self, model: &DisplayModel) -> String {
        if model.is_completed {
            return format!("{COMPLETED_TITLE} {COMPLETED_TEXT} ({}%)", model.progress_percent);
        }
        if !model.camera_active {
            return CAMERA_IDLE_TEXT.to_string();
        }

        let steps: String = model
            .steps
            .iter()
            .map(|step| {
                if step.is_captured {
                    format!("[x] {}", step.label)
                } else if step.is_current {
                    format!("[>] {}", step.label)
                } else {
                    format!("[ ] {}", step.label)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        let mut line = format!(
            "{} | {} | {} {} | {}%",
            model.step_caption.as_deref().unwrap_or(""),
            model.instruction.unwrap_or(""),
            self.dwell_bar(model),
            model.badge.text(),
            model.progress_percent
        );
        line.push_str(" | ");
        line.push_str(&steps);
        if model.flash_visible {
            line.push_str(" *");
        }
        line
    }
}
