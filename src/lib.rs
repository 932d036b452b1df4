// lib.rs - Video repost pipeline: download, watermark, publish to two destinations,
// with a persisted per-video record so failed steps can be resumed later.
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod stages;
pub mod utils;
pub mod validation;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use error::{AppError, StageError, StoreError};
pub use pipeline::{NewVideo, PipelineRecord, PipelineState, ResumeEngine, SqliteRecordStore, Stage};
pub use validation::WatermarkPosition;
