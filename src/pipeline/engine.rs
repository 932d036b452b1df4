// src/pipeline/engine.rs
//! Stage-advance logic: take a record to its next unmet stage and keep going
//! until a collaborator comes back empty or the record is done.

use super::{NewVideo, PipelineRecord, PipelineState, RecordId, RecordStore, Stage};
use crate::error::{StageError, StageResult, StoreResult};
use crate::stages::Collaborators;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

/// Outcome of running the stage-advance algorithm on one record.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceReport {
    pub record_id: RecordId,
    pub start_state: PipelineState,
    pub end_state: PipelineState,
    /// The collaborator failure that parked the record, if any.
    pub stopped: Option<StageError>,
}

impl AdvanceReport {
    pub fn is_done(&self) -> bool {
        self.end_state == PipelineState::Done
    }

    pub fn advanced(&self) -> bool {
        self.end_state > self.start_state
    }
}

/// Totals for one resume pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResumeSummary {
    pub examined: usize,
    pub completed: usize,
    pub parked: usize,
    pub store_failures: usize,
}

pub struct ResumeEngine<S: RecordStore> {
    store: S,
    stages: Collaborators,
}

impl<S: RecordStore> ResumeEngine<S> {
    pub fn new(store: S, stages: Collaborators) -> Self {
        Self { store, stages }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run every stage the record still needs, in order, persisting each result
    /// as soon as it arrives. A collaborator failure stops this record; a store
    /// failure is returned to the caller.
    pub async fn advance(&self, mut record: PipelineRecord) -> StoreResult<AdvanceReport> {
        let start_state = record.state();

        let stopped = loop {
            let Some(stage) = record.state().next_stage() else {
                break None;
            };

            match self.run_stage(stage, &record).await {
                Ok(value) => {
                    self.store.update_field(&record.id, stage, &value).await?;
                    info!("✅ {} finished for {}: {}", stage, record.source_url, value);
                    record.set_field(stage, value);
                }
                Err(e) => {
                    warn!("⚠️ Record {} parked at '{}': {}", record.id, record.state(), e);
                    break Some(e);
                }
            }
        };

        Ok(AdvanceReport {
            record_id: record.id.clone(),
            start_state,
            end_state: record.state(),
            stopped,
        })
    }

    async fn run_stage(&self, stage: Stage, record: &PipelineRecord) -> StageResult<String> {
        match stage {
            Stage::Acquire => {
                let path = self.stages.acquire.acquire(&record.source_url).await?;
                Ok(path.to_string_lossy().into_owned())
            }
            Stage::Transform => {
                let input = required_input(record, Stage::Acquire, stage)?;
                let path = self
                    .stages
                    .transform
                    .transform(Path::new(input), record.watermark_position)
                    .await?;
                Ok(path.to_string_lossy().into_owned())
            }
            Stage::PublishPrimary => {
                let video = required_input(record, Stage::Transform, stage)?;
                self.stages
                    .publish_primary
                    .publish_primary(Path::new(video), &record.description)
                    .await
            }
            Stage::PublishSecondary => {
                let video = required_input(record, Stage::Transform, stage)?;
                self.stages
                    .publish_secondary
                    .publish_secondary(Path::new(video), &record.description, &record.description)
                    .await
            }
        }
    }

    /// Re-drive every incomplete record once. Records are isolated from each
    /// other: neither a parked record nor a store error on one record stops the
    /// batch. Only failing to list the records does.
    pub async fn resume_all(&self) -> StoreResult<ResumeSummary> {
        let records = self.store.list_incomplete().await?;
        let mut summary = ResumeSummary {
            examined: records.len(),
            ..Default::default()
        };

        info!("🔁 Resuming {} incomplete record(s)", records.len());

        for record in records {
            let id = record.id.clone();
            match self.advance(record).await {
                Ok(report) if report.is_done() => summary.completed += 1,
                Ok(_) => summary.parked += 1,
                Err(e) => {
                    error!("❌ Store error while resuming record {}: {}", id, e);
                    summary.store_failures += 1;
                }
            }
        }

        info!(
            "🔁 Resume pass finished: {} completed, {} parked, {} store failure(s)",
            summary.completed, summary.parked, summary.store_failures
        );
        Ok(summary)
    }

    /// Persist a record for a fresh video before any stage runs, then drive it.
    pub async fn run_new(&self, video: &NewVideo) -> StoreResult<AdvanceReport> {
        let record = self.store.create(video).await?;
        info!("🎬 New pipeline record {} for {}", record.id, record.source_url);
        self.advance(record).await
    }
}

fn required_input<'r>(record: &'r PipelineRecord, from: Stage, needed_by: Stage) -> StageResult<&'r str> {
    record
        .field(from)
        .ok_or_else(|| StageError::new(needed_by, format!("no {} result on record {}", from, record.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use crate::error::StoreError;
    use crate::pipeline::SqliteRecordStore;
    use crate::stages::{Acquire, PublishPrimary, PublishSecondary, Transform};
    use crate::validation::WatermarkPosition;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<(Stage, String)>>>;

    /// Stand-in collaborator: records each call and answers with a canned result.
    struct FakeStage {
        stage: Stage,
        result: Result<String, String>,
        log: CallLog,
    }

    impl FakeStage {
        fn respond(&self, input: String) -> StageResult<String> {
            self.log.lock().unwrap().push((self.stage, input));
            self.result
                .clone()
                .map_err(|reason| StageError::new(self.stage, reason))
        }
    }

    #[async_trait]
    impl Acquire for FakeStage {
        async fn acquire(&self, source_url: &str) -> StageResult<PathBuf> {
            self.respond(source_url.to_string()).map(PathBuf::from)
        }
    }

    #[async_trait]
    impl Transform for FakeStage {
        async fn transform(&self, input: &Path, position: WatermarkPosition) -> StageResult<PathBuf> {
            self.respond(format!("{}@{}", input.display(), position))
                .map(PathBuf::from)
        }
    }

    #[async_trait]
    impl PublishPrimary for FakeStage {
        async fn publish_primary(&self, video: &Path, description: &str) -> StageResult<String> {
            self.respond(format!("{}|{}", video.display(), description))
        }
    }

    #[async_trait]
    impl PublishSecondary for FakeStage {
        async fn publish_secondary(&self, video: &Path, title: &str, description: &str) -> StageResult<String> {
            self.respond(format!("{}|{}|{}", video.display(), title, description))
        }
    }

    const OUTPUTS: [&str; 4] = ["downloads/1.mp4", "edited/1.mp4", "publish-1", "yt-1"];

    /// Collaborators that all succeed except `failing`.
    fn collaborators(failing: Option<Stage>, log: &CallLog) -> Collaborators {
        let fake = |stage: Stage, output: &str| FakeStage {
            stage,
            result: if failing == Some(stage) {
                Err("no result".to_string())
            } else {
                Ok(output.to_string())
            },
            log: log.clone(),
        };
        Collaborators {
            acquire: Box::new(fake(Stage::Acquire, OUTPUTS[0])),
            transform: Box::new(fake(Stage::Transform, OUTPUTS[1])),
            publish_primary: Box::new(fake(Stage::PublishPrimary, OUTPUTS[2])),
            publish_secondary: Box::new(fake(Stage::PublishSecondary, OUTPUTS[3])),
        }
    }

    async fn engine(failing: Option<Stage>) -> (ResumeEngine<SqliteRecordStore>, CallLog) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let log = CallLog::default();
        let engine = ResumeEngine::new(SqliteRecordStore::new(pool), collaborators(failing, &log));
        (engine, log)
    }

    fn video(n: u32) -> NewVideo {
        NewVideo {
            source_url: format!("https://www.tiktok.com/@user/video/{}", n),
            description: "Top bins".to_string(),
            watermark_position: WatermarkPosition::Top,
        }
    }

    fn stages_called(log: &CallLog) -> Vec<Stage> {
        log.lock().unwrap().iter().map(|(stage, _)| *stage).collect()
    }

    /// Create a record and fill in the first `done` stages directly.
    async fn seeded_record<S: RecordStore>(store: &S, done: usize) -> PipelineRecord {
        let record = store.create(&video(1)).await.unwrap();
        for (stage, value) in Stage::ALL.iter().zip(OUTPUTS).take(done) {
            store.update_field(&record.id, *stage, value).await.unwrap();
        }
        store.get(&record.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_success_in_one_pass() {
        let (engine, log) = engine(None).await;

        let report = engine.run_new(&video(1)).await.unwrap();
        assert_eq!(report.start_state, PipelineState::NotAcquired);
        assert!(report.is_done());
        assert!(report.stopped.is_none());
        assert_eq!(stages_called(&log), Stage::ALL.to_vec());

        let stored = engine.store().get(&report.record_id).await.unwrap();
        assert_eq!(stored.acquired_artifact.as_deref(), Some(OUTPUTS[0]));
        assert_eq!(stored.transformed_artifact.as_deref(), Some(OUTPUTS[1]));
        assert_eq!(stored.primary_publish_status.as_deref(), Some(OUTPUTS[2]));
        assert_eq!(stored.secondary_publish_status.as_deref(), Some(OUTPUTS[3]));
    }

    #[tokio::test]
    async fn test_collaborators_receive_previous_results() {
        let (engine, log) = engine(None).await;
        engine.run_new(&video(7)).await.unwrap();

        let inputs: Vec<String> = log.lock().unwrap().iter().map(|(_, i)| i.clone()).collect();
        assert_eq!(
            inputs,
            vec![
                "https://www.tiktok.com/@user/video/7".to_string(),
                "downloads/1.mp4@top".to_string(),
                "edited/1.mp4|Top bins".to_string(),
                "edited/1.mp4|Top bins|Top bins".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_acquire_failure_stops_before_other_stages() {
        let (engine, log) = engine(Some(Stage::Acquire)).await;

        let report = engine.run_new(&video(1)).await.unwrap();
        assert_eq!(report.end_state, PipelineState::NotAcquired);
        assert_eq!(report.stopped.as_ref().map(|e| e.stage), Some(Stage::Acquire));
        assert_eq!(stages_called(&log), vec![Stage::Acquire]);

        let stored = engine.store().get(&report.record_id).await.unwrap();
        assert!(stored.acquired_artifact.is_none());
        assert_eq!(engine.store().list_incomplete().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_from_acquired_runs_remaining_stages() {
        let (engine, log) = engine(None).await;
        let record = seeded_record(engine.store(), 1).await;
        assert_eq!(record.state(), PipelineState::Acquired);

        let summary = engine.resume_all().await.unwrap();
        assert_eq!(
            summary,
            ResumeSummary {
                examined: 1,
                completed: 1,
                parked: 0,
                store_failures: 0
            }
        );
        assert_eq!(
            stages_called(&log),
            vec![Stage::Transform, Stage::PublishPrimary, Stage::PublishSecondary]
        );
        assert!(engine.store().get(&record.id).await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_done_record_is_left_alone() {
        let (engine, log) = engine(None).await;
        let record = seeded_record(engine.store(), 4).await;

        let report = engine.advance(record.clone()).await.unwrap();
        assert!(report.is_done());
        assert!(!report.advanced());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(engine.store().get(&record.id).await.unwrap(), record);

        assert_eq!(engine.resume_all().await.unwrap().examined, 0);
    }

    #[tokio::test]
    async fn test_stage_order_holds_for_every_start_and_failure() {
        let failure_points = [
            None,
            Some(Stage::Acquire),
            Some(Stage::Transform),
            Some(Stage::PublishPrimary),
            Some(Stage::PublishSecondary),
        ];

        for done in 0..=4 {
            for failing in failure_points {
                let (engine, log) = engine(failing).await;
                let record = seeded_record(engine.store(), done).await;
                let start = record.state();

                let report = engine.advance(record).await.unwrap();
                let stored = engine.store().get(&report.record_id).await.unwrap();

                assert!(stored.is_well_ordered(), "done={} failing={:?}", done, failing);
                assert_eq!(stored.state(), report.end_state);
                assert!(report.end_state >= start);

                let remaining: Vec<Stage> = Stage::ALL[done..].to_vec();
                let expected_end = match failing {
                    Some(stage) if remaining.contains(&stage) => {
                        assert_eq!(report.stopped.as_ref().map(|e| e.stage), Some(stage));
                        let pos = Stage::ALL.iter().position(|s| *s == stage).unwrap();
                        assert_eq!(stages_called(&log), Stage::ALL[done..=pos].to_vec());
                        match pos {
                            0 => PipelineState::NotAcquired,
                            p => Stage::ALL[p - 1].completes_to(),
                        }
                    }
                    _ => {
                        assert!(report.stopped.is_none());
                        assert_eq!(stages_called(&log), remaining);
                        PipelineState::Done
                    }
                };
                assert_eq!(report.end_state, expected_end, "done={} failing={:?}", done, failing);
            }
        }
    }

    #[tokio::test]
    async fn test_parked_record_resumes_on_next_pass() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let log = CallLog::default();

        let first = ResumeEngine::new(
            SqliteRecordStore::new(pool.clone()),
            collaborators(Some(Stage::PublishPrimary), &log),
        );
        let report = first.run_new(&video(1)).await.unwrap();
        assert_eq!(report.end_state, PipelineState::Transformed);

        log.lock().unwrap().clear();
        let second = ResumeEngine::new(SqliteRecordStore::new(pool), collaborators(None, &log));
        let summary = second.resume_all().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(
            stages_called(&log),
            vec![Stage::PublishPrimary, Stage::PublishSecondary]
        );
    }

    /// Store that refuses writes for one record id.
    struct BrokenForOne {
        inner: SqliteRecordStore,
        broken_id: Mutex<Option<String>>,
    }

    #[async_trait]
    impl RecordStore for BrokenForOne {
        async fn create(&self, video: &NewVideo) -> StoreResult<PipelineRecord> {
            self.inner.create(video).await
        }

        async fn update_field(&self, id: &str, stage: Stage, value: &str) -> StoreResult<()> {
            if self.broken_id.lock().unwrap().as_deref() == Some(id) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.update_field(id, stage, value).await
        }

        async fn list_incomplete(&self) -> StoreResult<Vec<PipelineRecord>> {
            self.inner.list_incomplete().await
        }

        async fn get(&self, id: &str) -> StoreResult<PipelineRecord> {
            self.inner.get(id).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_on_one_record_does_not_abort_batch() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let store = BrokenForOne {
            inner: SqliteRecordStore::new(pool),
            broken_id: Mutex::new(None),
        };
        let first = store.create(&video(1)).await.unwrap();
        let second = store.create(&video(2)).await.unwrap();
        *store.broken_id.lock().unwrap() = Some(first.id.clone());

        let log = CallLog::default();
        let engine = ResumeEngine::new(store, collaborators(None, &log));

        assert!(matches!(
            engine.advance(first.clone()).await,
            Err(StoreError::Database(_))
        ));

        let summary = engine.resume_all().await.unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.store_failures, 1);
        assert_eq!(summary.completed, 1);

        assert!(engine.store().get(&second.id).await.unwrap().is_complete());
        assert!(engine.store().get(&first.id).await.unwrap().acquired_artifact.is_none());
    }
}
