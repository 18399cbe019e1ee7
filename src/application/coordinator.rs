//! Batch coordinator: fetches pending records and fans the pipeline out over
//! them chunk by chunk, writing one report per chunk.

use crate::config::BatchConfig;
use crate::domain::moderation::ModerationResult;
use crate::domain::records::{BatchOutcome, PendingRecord, VideoRecord};
use crate::domain::report::{write_chunk_report, write_error_report};
use crate::error::{ModerationError, StoreError};
use crate::ports::moderator::VideoModerator;
use crate::ports::repository::RecordStore;
use crate::ports::transport::VideoTransport;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

pub const FETCH_FAILED: &str = "Record Fetch Failed";
pub const UNEXPECTED_FETCH_ERROR: &str = "Unexpected Fetch Error";
pub const CRITICAL_ERROR: &str = "Critical Processing Error";

#[derive(Clone, Debug)]
pub struct BatchSettings {
    pub chunk_size: usize,
    pub fetch_attempts: usize,
    pub fetch_retry_delay: Duration,
    pub reports_dir: PathBuf,
    pub download_dir: PathBuf,
}

impl From<&BatchConfig> for BatchSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            fetch_attempts: 3,
            fetch_retry_delay: Duration::from_secs(5),
            reports_dir: config.reports_dir.clone(),
            download_dir: config.download_dir.clone(),
        }
    }
}

/// What a batch run did. Aborted runs still report the chunks they finished.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchSummary {
    pub fetched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub reports: Vec<PathBuf>,
    pub aborted: Option<String>,
}

impl BatchSummary {
    fn record(&mut self, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Success { .. } => self.succeeded += 1,
            BatchOutcome::Failed { .. } => self.failed += 1,
            BatchOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ChunkError {
    #[error("worker task failed: {0}")]
    Worker(#[from] JoinError),
    #[error("failed to write chunk report: {0}")]
    Report(#[from] io::Error),
}

pub struct BatchCoordinator<S, T, M> {
    store: Arc<S>,
    transport: Arc<T>,
    moderator: Arc<M>,
    settings: BatchSettings,
}

impl<S, T, M> BatchCoordinator<S, T, M>
where
    S: RecordStore + 'static,
    T: VideoTransport + 'static,
    M: VideoModerator + 'static,
{
    pub fn new(store: Arc<S>, transport: Arc<T>, moderator: Arc<M>, settings: BatchSettings) -> Self {
        Self {
            store,
            transport,
            moderator,
            settings,
        }
    }

    /// Processes every pending record. Never fails: fetch and critical errors
    /// end up in an error report and in `BatchSummary::aborted`.
    pub async fn run_batch(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();

        let records = match self.fetch_with_retry().await {
            Ok(records) => records,
            Err(e) => {
                let error_type = if e.is_transient() {
                    FETCH_FAILED
                } else {
                    UNEXPECTED_FETCH_ERROR
                };
                self.abort(&mut summary, error_type, &e.to_string());
                return summary;
            }
        };
        summary.fetched = records.len();

        if let Err(e) = tokio::fs::create_dir_all(&self.settings.download_dir).await {
            self.abort(&mut summary, CRITICAL_ERROR, &e.to_string());
            return summary;
        }

        let chunk_size = self.settings.chunk_size.max(1);
        for (index, chunk) in records.chunks(chunk_size).enumerate() {
            let chunk_number = index + 1;
            info!(
                "Processing chunk #{} ({} records)",
                chunk_number,
                chunk.len()
            );

            match self.process_chunk(chunk_number, chunk).await {
                Ok((outcomes, report)) => {
                    outcomes.iter().for_each(|outcome| summary.record(outcome));
                    info!(
                        "Chunk #{} completed, report saved to {}",
                        chunk_number,
                        report.display()
                    );
                    summary.reports.push(report);
                }
                Err(e) => {
                    self.abort(&mut summary, CRITICAL_ERROR, &e.to_string());
                    break;
                }
            }
        }

        summary
    }

    async fn fetch_with_retry(&self) -> Result<Vec<PendingRecord>, StoreError> {
        let attempts = self.settings.fetch_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!("Fetching pending records (attempt {}/{})", attempt, attempts);
            match self.store.fetch_pending().await {
                Ok(records) => {
                    info!("Fetched {} pending records", records.len());
                    return Ok(records);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        "Fetch attempt {} failed: {}, retrying in {:?}",
                        attempt, e, self.settings.fetch_retry_delay
                    );
                    tokio::time::sleep(self.settings.fetch_retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs one chunk to completion and writes its report. Documents that did
    /// not decode are reported first, then outcomes in completion order.
    async fn process_chunk(
        &self,
        chunk_number: usize,
        chunk: &[PendingRecord],
    ) -> Result<(Vec<BatchOutcome>, PathBuf), ChunkError> {
        let mut outcomes = Vec::with_capacity(chunk.len());
        let mut workers = JoinSet::new();
        for pending in chunk {
            match pending {
                Ok(record) => {
                    workers.spawn(process_record(
                        record.clone(),
                        Arc::clone(&self.store),
                        Arc::clone(&self.transport),
                        Arc::clone(&self.moderator),
                        self.settings.download_dir.clone(),
                    ));
                }
                Err(malformed) => outcomes.push(BatchOutcome::malformed(malformed.clone())),
            }
        }

        while let Some(joined) = workers.join_next().await {
            outcomes.push(joined?);
        }

        let report = write_chunk_report(&self.settings.reports_dir, chunk_number, &outcomes)?;
        Ok((outcomes, report))
    }

    fn abort(&self, summary: &mut BatchSummary, error_type: &str, message: &str) {
        error!("{}: {}", error_type, message);
        match write_error_report(&self.settings.reports_dir, error_type, message) {
            Ok(path) => info!("Error report saved to {}", path.display()),
            Err(e) => error!("Failed to write error report: {}", e),
        }
        summary.aborted = Some(format!("{}: {}", error_type, message));
    }
}

/// Eligibility check, download, moderation and store write for one record.
/// The downloaded file is removed whatever happens.
async fn process_record<S, T, M>(
    record: VideoRecord,
    store: Arc<S>,
    transport: Arc<T>,
    moderator: Arc<M>,
    download_dir: PathBuf,
) -> BatchOutcome
where
    S: RecordStore,
    T: VideoTransport,
    M: VideoModerator,
{
    let url = match record.eligibility() {
        Ok(url) => url.to_string(),
        Err(why) => {
            debug!("Record {} not dispatched: {}", record.id, why.message());
            return BatchOutcome::ineligible(&record.id, why);
        }
    };

    let local_path = download_dir.join(format!("{}.mp4", record.id));
    let result = moderate_and_save(
        &record.id,
        &url,
        &local_path,
        store.as_ref(),
        transport.as_ref(),
        moderator.as_ref(),
    )
    .await;

    if let Err(e) = tokio::fs::remove_file(&local_path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", local_path.display(), e);
        }
    }

    match result {
        Ok(moderation) => {
            info!(
                "Record {} moderated: {}",
                record.id, moderation.moderation_status
            );
            BatchOutcome::Success {
                id: record.id,
                moderation,
            }
        }
        Err(e) => {
            warn!("Record {} failed: {}", record.id, e);
            BatchOutcome::failed(record.id, &e)
        }
    }
}

async fn moderate_and_save(
    id: &str,
    url: &str,
    local_path: &Path,
    store: &impl RecordStore,
    transport: &impl VideoTransport,
    moderator: &impl VideoModerator,
) -> Result<ModerationResult, ModerationError> {
    transport.download(url, local_path).await?;
    let moderation = moderator.moderate(local_path).await?;
    store.save_moderation(id, &moderation).await?;
    Ok(moderation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::JsonFileStore;
    use crate::domain::moderation::ModerationStatus;
    use crate::error::FailureKind;
    use crate::ports::moderator::MockVideoModerator;
    use crate::ports::repository::MockRecordStore;
    use crate::ports::transport::MockVideoTransport;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Instant;
    use tempfile::{tempdir, TempDir};

    fn pending(id: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            video_url: Some(format!("https://cdn.example.com/{}.mp4", id)),
            moderation_status: Some(ModerationStatus::Failed),
            initial_size: Some(4096.0),
            is_deleted: Some(false),
        }
    }

    fn approved() -> ModerationResult {
        ModerationResult {
            moderation_status: ModerationStatus::Approved,
            reason: String::new(),
            explicit_content: Some(false),
            stem_content: Some(true),
            pii_detected: Some(false),
            copyright_risk: Some(false),
            detected_objects: vec!["telescope".into()],
            detected_keywords: vec!["orbit".into()],
            total_tokens: 700,
        }
    }

    fn settings(dir: &TempDir, chunk_size: usize) -> BatchSettings {
        BatchSettings {
            chunk_size,
            fetch_attempts: 3,
            fetch_retry_delay: Duration::from_millis(1),
            reports_dir: dir.path().join("reports"),
            download_dir: dir.path().join("downloads"),
        }
    }

    fn reports_named(dir: &Path, prefix: &str) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|entry| entry.unwrap().path())
                    .filter(|path| {
                        path.file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| name.starts_with(prefix))
                    })
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }

    fn downloading_transport() -> MockVideoTransport {
        let mut transport = MockVideoTransport::new();
        transport
            .expect_download()
            .returning(|_, path| Ok(std::fs::write(path, b"mp4")?));
        transport
    }

    #[tokio::test]
    async fn test_chunks_are_reported_separately() {
        let dir = tempdir().unwrap();
        let records: Vec<PendingRecord> =
            (0..17).map(|i| Ok(pending(&format!("v{:02}", i)))).collect();

        let mut store = MockRecordStore::new();
        store
            .expect_fetch_pending()
            .times(1)
            .returning(move || Ok(records.clone()));
        store
            .expect_save_moderation()
            .times(17)
            .returning(|_, _| Ok(()));
        let mut moderator = MockVideoModerator::new();
        moderator.expect_moderate().returning(|_| Ok(approved()));

        let coordinator = BatchCoordinator::new(
            Arc::new(store),
            Arc::new(downloading_transport()),
            Arc::new(moderator),
            settings(&dir, 8),
        );
        let summary = coordinator.run_batch().await;

        assert_eq!(summary.fetched, 17);
        assert_eq!(summary.succeeded, 17);
        assert_eq!(summary.reports.len(), 3);
        assert!(summary.aborted.is_none());
        let reports = reports_named(&dir.path().join("reports"), "batch_report_part_");
        let rows: Vec<usize> = reports
            .iter()
            .map(|path| csv::Reader::from_path(path).unwrap().records().count())
            .collect();
        assert_eq!(rows, vec![8, 8, 1]);

        // Every downloaded file is gone.
        assert!(reports_named(&dir.path().join("downloads"), "v").is_empty());
    }

    #[tokio::test]
    async fn test_ineligible_records_are_not_dispatched() {
        let dir = tempdir().unwrap();
        let deleted = VideoRecord {
            is_deleted: Some(true),
            ..pending("gone")
        };
        let empty = VideoRecord {
            initial_size: Some(0.0),
            ..pending("empty")
        };

        let mut transport = MockVideoTransport::new();
        transport.expect_download().times(0);
        let mut store = MockRecordStore::new();
        store.expect_save_moderation().times(0);
        let store = Arc::new(store);
        let transport = Arc::new(transport);
        let moderator = Arc::new(MockVideoModerator::new());

        let outcome = process_record(
            deleted,
            store.clone(),
            transport.clone(),
            moderator.clone(),
            dir.path().to_path_buf(),
        )
        .await;
        assert_eq!(
            outcome,
            BatchOutcome::Failed {
                id: "gone".into(),
                kind: FailureKind::Ineligible,
                error: "deleted".into(),
            }
        );

        let outcome =
            process_record(empty, store, transport, moderator, dir.path().to_path_buf()).await;
        assert_eq!(outcome.status(), "failed");
        assert!(matches!(outcome, BatchOutcome::Failed { error, .. } if error == "initial size is 0"));
    }

    #[tokio::test]
    async fn test_download_failure_skips_pipeline() {
        let dir = tempdir().unwrap();
        let mut transport = MockVideoTransport::new();
        transport
            .expect_download()
            .times(1)
            .returning(|_, _| Err(ModerationError::Download("404 Not Found".into())));
        let mut moderator = MockVideoModerator::new();
        moderator.expect_moderate().times(0);
        let mut store = MockRecordStore::new();
        store.expect_save_moderation().times(0);

        let outcome = process_record(
            pending("v1"),
            Arc::new(store),
            Arc::new(transport),
            Arc::new(moderator),
            dir.path().to_path_buf(),
        )
        .await;

        assert!(matches!(
            outcome,
            BatchOutcome::Failed { kind: FailureKind::Download, .. }
        ));
    }

    #[tokio::test]
    async fn test_pipeline_error_removes_download() {
        let dir = tempdir().unwrap();
        let mut moderator = MockVideoModerator::new();
        moderator
            .expect_moderate()
            .withf(|path| path.ends_with("v7.mp4") && path.exists())
            .returning(|_| Err(ModerationError::Schema("missing field `reason`".into())));
        let mut store = MockRecordStore::new();
        store.expect_save_moderation().times(0);

        let outcome = process_record(
            pending("v7"),
            Arc::new(store),
            Arc::new(downloading_transport()),
            Arc::new(moderator),
            dir.path().to_path_buf(),
        )
        .await;

        assert!(matches!(
            outcome,
            BatchOutcome::Failed { kind: FailureKind::Schema, .. }
        ));
        assert!(!dir.path().join("v7.mp4").exists());
    }

    #[tokio::test]
    async fn test_store_write_failure_is_a_failed_outcome() {
        let dir = tempdir().unwrap();
        let mut moderator = MockVideoModerator::new();
        moderator.expect_moderate().returning(|_| Ok(approved()));
        let mut store = MockRecordStore::new();
        store
            .expect_save_moderation()
            .returning(|_, _| Err(StoreError::Backend("permission denied".into())));

        let outcome = process_record(
            pending("v8"),
            Arc::new(store),
            Arc::new(downloading_transport()),
            Arc::new(moderator),
            dir.path().to_path_buf(),
        )
        .await;

        assert!(matches!(
            outcome,
            BatchOutcome::Failed { kind: FailureKind::Store, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_retries_then_aborts() {
        let dir = tempdir().unwrap();
        let mut store = MockRecordStore::new();
        store
            .expect_fetch_pending()
            .times(3)
            .returning(|| Err(StoreError::DeadlineExceeded("504 Gateway Timeout".into())));
        store.expect_save_moderation().times(0);
        let mut transport = MockVideoTransport::new();
        transport.expect_download().times(0);

        let coordinator = BatchCoordinator::new(
            Arc::new(store),
            Arc::new(transport),
            Arc::new(MockVideoModerator::new()),
            settings(&dir, 8),
        );
        let summary = coordinator.run_batch().await;

        assert!(summary.aborted.unwrap().starts_with(FETCH_FAILED));
        assert!(summary.reports.is_empty());
        let errors = reports_named(&dir.path().join("reports"), "error_report_");
        assert_eq!(errors.len(), 1);
        let contents = std::fs::read_to_string(&errors[0]).unwrap();
        assert!(contents.starts_with("error_type,message,timestamp"));
        assert!(contents.contains("Record Fetch Failed"));
    }

    #[tokio::test]
    async fn test_non_transient_fetch_error_is_not_retried() {
        let dir = tempdir().unwrap();
        let mut store = MockRecordStore::new();
        store
            .expect_fetch_pending()
            .times(1)
            .returning(|| Err(StoreError::Auth("invalid_grant".into())));

        let coordinator = BatchCoordinator::new(
            Arc::new(store),
            Arc::new(MockVideoTransport::new()),
            Arc::new(MockVideoModerator::new()),
            settings(&dir, 8),
        );
        let summary = coordinator.run_batch().await;

        assert!(summary.aborted.unwrap().starts_with(UNEXPECTED_FETCH_ERROR));
    }

    #[tokio::test]
    async fn test_report_failure_aborts_remaining_chunks() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir, 1);
        // A plain file where the reports directory should be.
        std::fs::write(&settings.reports_dir, b"").unwrap();

        let mut store = MockRecordStore::new();
        store
            .expect_fetch_pending()
            .returning(|| Ok(vec![Ok(pending("a")), Ok(pending("b"))]));
        store
            .expect_save_moderation()
            .times(1)
            .returning(|_, _| Ok(()));
        let mut moderator = MockVideoModerator::new();
        moderator.expect_moderate().times(1).returning(|_| Ok(approved()));

        let coordinator = BatchCoordinator::new(
            Arc::new(store),
            Arc::new(downloading_transport()),
            Arc::new(moderator),
            settings,
        );
        let summary = coordinator.run_batch().await;

        assert!(summary.aborted.unwrap().starts_with(CRITICAL_ERROR));
        assert!(summary.reports.is_empty());
        assert_eq!(summary.succeeded, 0);
    }

    #[tokio::test]
    async fn test_second_run_finds_nothing_pending() {
        let dir = tempdir().unwrap();
        let records_path = dir.path().join("records.json");
        std::fs::write(
            &records_path,
            serde_json::to_vec(&json!([
                {"id": "r1", "videoUrl": "https://cdn.example.com/r1.mp4",
                 "aiVideoModerationStatus": "failed", "initialSize": 10, "isDeleted": false},
                {"id": "r2", "videoUrl": "https://cdn.example.com/r2.mp4",
                 "aiVideoModerationStatus": "failed", "initialSize": 10, "isDeleted": false}
            ]))
            .unwrap(),
        )
        .unwrap();
        let store = Arc::new(JsonFileStore::new(
            &records_path,
            "aiVideoModeration",
            "batchVideoModeration",
        ));
        let mut moderator = MockVideoModerator::new();
        moderator.expect_moderate().times(2).returning(|_| Ok(approved()));

        let coordinator = BatchCoordinator::new(
            store,
            Arc::new(downloading_transport()),
            Arc::new(moderator),
            settings(&dir, 8),
        );

        let first = coordinator.run_batch().await;
        assert_eq!(first.succeeded, 2);

        let second = coordinator.run_batch().await;
        assert_eq!(second.fetched, 0);
        assert!(second.reports.is_empty());
        assert!(second.aborted.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_documents_become_failed_rows() {
        let dir = tempdir().unwrap();
        let records_path = dir.path().join("records.json");
        std::fs::write(
            &records_path,
            serde_json::to_vec(&json!([
                {"id": "x1", "aiVideoModerationStatus": "failed", "isDeleted": false,
                 "initialSize": 10, "videoUrl": "https://cdn.example.com/x1.mp4",
                 "aiVideoModerationOutput": {"moderationStatus": "failed", "reason": "ffmpeg crashed"}},
                {"id": "x2", "aiVideoModerationStatus": "failed", "isDeleted": false,
                 "initialSize": 10.0, "videoUrl": "https://cdn.example.com/x2.mp4"},
                {"id": "x3", "aiVideoModerationStatus": "failed", "isDeleted": "no",
                 "videoUrl": "https://cdn.example.com/x3.mp4"}
            ]))
            .unwrap(),
        )
        .unwrap();
        let store = Arc::new(JsonFileStore::new(
            &records_path,
            "aiVideoModeration",
            "batchVideoModeration",
        ));
        let mut moderator = MockVideoModerator::new();
        moderator.expect_moderate().times(2).returning(|_| Ok(approved()));

        let coordinator = BatchCoordinator::new(
            store,
            Arc::new(downloading_transport()),
            Arc::new(moderator),
            settings(&dir, 8),
        );
        let summary = coordinator.run_batch().await;

        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let mut reader = csv::Reader::from_path(&summary.reports[0]).unwrap();
        let headers = reader.headers().unwrap().clone();
        let kind_column = headers.iter().position(|h| h == "errorKind").unwrap();
        let x3 = reader
            .records()
            .map(|row| row.unwrap())
            .find(|row| &row[0] == "x3")
            .unwrap();
        assert_eq!(&x3[1], "failed");
        assert_eq!(&x3[kind_column], "store");
        assert!(x3[2].starts_with("store document malformed"));
    }

    struct SlowModerator(Duration);

    #[async_trait]
    impl VideoModerator for SlowModerator {
        async fn moderate(&self, _video_path: &Path) -> Result<ModerationResult, ModerationError> {
            tokio::time::sleep(self.0).await;
            Ok(approved())
        }
    }

    #[tokio::test]
    async fn test_workers_overlap_within_a_chunk_only() {
        let dir = tempdir().unwrap();
        let nap = Duration::from_millis(200);
        let mut store = MockRecordStore::new();
        store.expect_fetch_pending().returning(|| {
            Ok(["a", "b", "c", "d"].iter().map(|id| Ok(pending(id))).collect())
        });
        store
            .expect_save_moderation()
            .times(4)
            .returning(|_, _| Ok(()));

        let coordinator = BatchCoordinator::new(
            Arc::new(store),
            Arc::new(downloading_transport()),
            Arc::new(SlowModerator(nap)),
            settings(&dir, 2),
        );
        let started = Instant::now();
        let summary = coordinator.run_batch().await;
        let elapsed = started.elapsed();

        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.reports.len(), 2);
        // Two chunks run back to back; the two workers of each chunk overlap.
        assert!(elapsed >= nap * 2, "chunks overlapped: {:?}", elapsed);
        assert!(elapsed < nap * 4, "workers ran serially: {:?}", elapsed);
    }
}
