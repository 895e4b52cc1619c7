use crate::shared::frame::Frame;

/// Gives the capture pipeline access to whatever frame the camera shows now.
pub trait FrameProvider: Send + Sync {
    /// `None` when the camera has not delivered a frame yet or was stopped.
    fn current_frame(&self) -> Option<Frame>;
}
