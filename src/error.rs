// src/error.rs
//! Error types shared by the store, the stage collaborators and the binaries.

use crate::pipeline::Stage;
use thiserror::Error;

/// Failures of the pipeline record store. These are never swallowed by the
/// engine: they propagate to whoever drives the pipeline.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Pipeline record not found: {0}")]
    NotFound(String),

    #[error("Field '{field}' is already set on record {id}")]
    AlreadySet { id: String, field: &'static str },

    #[error("Refusing to store an empty value for '{0}'")]
    EmptyValue(&'static str),

    #[error("Invalid pipeline record row: {0}")]
    InvalidRow(String),
}

/// A collaborator returned no result. Non-fatal: the record is parked at its
/// current state until a later resume pass.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} failed: {reason}")]
pub struct StageError {
    pub stage: Stage,
    pub reason: String,
}

impl StageError {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }

    pub fn acquire(reason: impl Into<String>) -> Self {
        Self::new(Stage::Acquire, reason)
    }

    pub fn transform(reason: impl Into<String>) -> Self {
        Self::new(Stage::Transform, reason)
    }

    pub fn publish_primary(reason: impl Into<String>) -> Self {
        Self::new(Stage::PublishPrimary, reason)
    }

    pub fn publish_secondary(reason: impl Into<String>) -> Self {
        Self::new(Stage::PublishSecondary, reason)
    }
}

/// Top-level error for the binaries.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type StageResult<T> = std::result::Result<T, StageError>;
