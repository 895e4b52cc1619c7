pub mod capture;
pub mod capture_writer;
pub mod frame_provider;
pub mod still_encoder;
