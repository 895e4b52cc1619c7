pub mod capture_pipeline;
pub mod domain;
pub mod infrastructure;
