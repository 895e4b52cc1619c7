use crate::shared::frame::Frame;

/// A live video source.
///
/// Implementations own the hardware or file handle; the frame source
/// drives them from its detection thread.
pub trait Camera: Send {
    /// Acquires the stream. Fails when the device is busy, missing, or
    /// permission is denied.
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// Blocks until the next frame is available, pacing at the camera rate.
    ///
    /// Returns `Ok(None)` at end of stream. Frames with zero dimensions may
    /// be delivered while the stream is still warming up.
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the stream. Must be idempotent.
    fn close(&mut self);
}
