pub mod export_captures_use_case;
pub mod infrastructure;
pub mod liveness_engine;
pub mod presentation;
pub mod session_logger;
pub mod session_snapshot;
pub mod session_status;
