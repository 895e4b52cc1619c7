pub mod file_capture_writer;
pub mod jpeg_still_encoder;
