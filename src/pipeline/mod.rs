// src/pipeline/mod.rs
//! Per-video pipeline records and the four-stage state machine that drives them.

use crate::validation::WatermarkPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod engine;
pub mod store;

pub use engine::{AdvanceReport, ResumeEngine, ResumeSummary};
pub use store::{RecordStore, SqliteRecordStore};

/// Unique identifier for a pipeline record
pub type RecordId = String;

/// The four pipeline steps, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Acquire,
    Transform,
    PublishPrimary,
    PublishSecondary,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Acquire,
        Stage::Transform,
        Stage::PublishPrimary,
        Stage::PublishSecondary,
    ];

    /// Column holding this stage's result.
    pub fn column(&self) -> &'static str {
        match self {
            Stage::Acquire => "acquired_artifact",
            Stage::Transform => "transformed_artifact",
            Stage::PublishPrimary => "primary_publish_status",
            Stage::PublishSecondary => "secondary_publish_status",
        }
    }

    /// State a record is in once this stage has succeeded.
    pub fn completes_to(&self) -> PipelineState {
        match self {
            Stage::Acquire => PipelineState::Acquired,
            Stage::Transform => PipelineState::Transformed,
            Stage::PublishPrimary => PipelineState::PublishedPrimary,
            Stage::PublishSecondary => PipelineState::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Acquire => "download",
            Stage::Transform => "watermark",
            Stage::PublishPrimary => "TikTok upload",
            Stage::PublishSecondary => "YouTube upload",
        };
        f.write_str(name)
    }
}

/// Where a record sits in the pipeline. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineState {
    NotAcquired,
    Acquired,
    Transformed,
    PublishedPrimary,
    Done,
}

impl PipelineState {
    /// The stage that has to succeed next, `None` once done.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::NotAcquired => Some(Stage::Acquire),
            PipelineState::Acquired => Some(Stage::Transform),
            PipelineState::Transformed => Some(Stage::PublishPrimary),
            PipelineState::PublishedPrimary => Some(Stage::PublishSecondary),
            PipelineState::Done => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::NotAcquired => "not downloaded",
            PipelineState::Acquired => "downloaded",
            PipelineState::Transformed => "watermarked",
            PipelineState::PublishedPrimary => "on TikTok",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Validated input for a new pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVideo {
    pub source_url: String,
    pub description: String,
    pub watermark_position: WatermarkPosition,
}

/// Persisted progress of one video through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: RecordId,
    pub source_url: String,
    pub description: String,
    pub watermark_position: WatermarkPosition,
    pub acquired_artifact: Option<String>,
    pub transformed_artifact: Option<String>,
    pub primary_publish_status: Option<String>,
    pub secondary_publish_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRecord {
    /// Result stored for `stage`, if it has succeeded.
    pub fn field(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Acquire => self.acquired_artifact.as_deref(),
            Stage::Transform => self.transformed_artifact.as_deref(),
            Stage::PublishPrimary => self.primary_publish_status.as_deref(),
            Stage::PublishSecondary => self.secondary_publish_status.as_deref(),
        }
    }

    pub(crate) fn set_field(&mut self, stage: Stage, value: String) {
        let slot = match stage {
            Stage::Acquire => &mut self.acquired_artifact,
            Stage::Transform => &mut self.transformed_artifact,
            Stage::PublishPrimary => &mut self.primary_publish_status,
            Stage::PublishSecondary => &mut self.secondary_publish_status,
        };
        *slot = Some(value);
    }

    /// State implied by the stage fields, taking the first unset one.
    pub fn state(&self) -> PipelineState {
        Stage::ALL
            .iter()
            .find(|stage| self.field(**stage).is_none())
            .map(|stage| match stage {
                Stage::Acquire => PipelineState::NotAcquired,
                Stage::Transform => PipelineState::Acquired,
                Stage::PublishPrimary => PipelineState::Transformed,
                Stage::PublishSecondary => PipelineState::PublishedPrimary,
            })
            .unwrap_or(PipelineState::Done)
    }

    pub fn is_complete(&self) -> bool {
        Stage::ALL.iter().all(|stage| self.field(*stage).is_some())
    }

    /// No later stage is set while an earlier one is still missing.
    pub fn is_well_ordered(&self) -> bool {
        let mut seen_gap = false;
        for stage in Stage::ALL {
            match self.field(stage) {
                None => seen_gap = true,
                Some(_) if seen_gap => return false,
                Some(_) => {}
            }
        }
        true
    }
}
