use serde::{Deserialize, Serialize};

/// One of the three head orientations the challenge asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pose {
    Left,
    Center,
    Right,
}

/// Fixed challenge order.
pub const POSE_SEQUENCE: [Pose; 3] = [Pose::Left, Pose::Center, Pose::Right];

pub const POSE_COUNT: usize = POSE_SEQUENCE.len();

/// Static display configuration for a pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseDescriptor {
    pub id: Pose,
    pub display_label: &'static str,
    pub instruction: &'static str,
}

pub const POSES: [PoseDescriptor; POSE_COUNT] = [
    PoseDescriptor {
        id: Pose::Left,
        display_label: "Gauche",
        instruction: "Tournez la tête vers la gauche",
    },
    PoseDescriptor {
        id: Pose::Center,
        display_label: "Centre",
        instruction: "Regardez droit devant vous",
    },
    PoseDescriptor {
        id: Pose::Right,
        display_label: "Droite",
        instruction: "Tournez la tête vers la droite",
    },
];

impl Pose {
    pub fn descriptor(self) -> &'static PoseDescriptor {
        &POSES[self.sequence_index()]
    }

    pub fn sequence_index(self) -> usize {
        match self {
            Pose::Left => 0,
            Pose::Center => 1,
            Pose::Right => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pose::Left => "left",
            Pose::Center => "center",
            Pose::Right => "right",
        }
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse head direction estimated for a single frame.
///
/// `None` means no face was confidently detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    Left,
    Center,
    Right,
    #[default]
    None,
}

impl Orientation {
    pub fn as_pose(self) -> Option<Pose> {
        match self {
            Orientation::Left => Some(Pose::Left),
            Orientation::Center => Some(Pose::Center),
            Orientation::Right => Some(Pose::Right),
            Orientation::None => None,
        }
    }

    /// `None` never matches, so it can never start a dwell.
    pub fn matches(self, pose: Pose) -> bool {
        self.as_pose() == Some(pose)
    }

    /// Orientation of the same head seen in a horizontally flipped image.
    pub fn mirrored(self) -> Self {
        match self {
            Orientation::Left => Orientation::Right,
            Orientation::Right => Orientation::Left,
            other => other,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_pose() {
            Some(pose) => f.write_str(pose.as_str()),
            None => f.write_str("none"),
        }
    }
}
