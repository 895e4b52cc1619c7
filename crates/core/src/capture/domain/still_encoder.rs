use crate::capture::domain::capture::StillImage;
use crate::shared::frame::Frame;

/// Renders a frame into an encoded still image.
pub trait StillEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<StillImage, Box<dyn std::error::Error>>;
}
