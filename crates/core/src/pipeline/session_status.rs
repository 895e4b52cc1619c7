use thiserror::Error;

/// Lifecycle of one liveness session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Active,
    Capturing,
    Completed,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal session transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

impl SessionStatus {
    /// Reset may return to `Idle` from anywhere; every other edge is explicit.
    pub fn can_transition_to(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (_, Idle)
                | (Idle, Active)
                | (Active, Capturing)
                | (Capturing, Active)
                | (Active | Capturing, Completed)
        )
    }

    pub fn transition(self, to: SessionStatus) -> Result<SessionStatus, IllegalTransition> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(IllegalTransition { from: self, to })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Active => "active",
            SessionStatus::Capturing => "capturing",
            SessionStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
