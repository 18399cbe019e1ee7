use crate::domain::moderation::{ModerationResult, ModerationStatus};
use crate::domain::records::{PendingRecord, VideoRecord};
use crate::error::StoreError;
use crate::ports::repository::RecordStore;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;

/// Record store backed by a JSON file holding an array of video documents.
///
/// Every document needs an `id`. Updates rewrite the whole file; the mutex
/// serializes concurrent workers.
pub struct JsonFileStore {
    path: PathBuf,
    update_source: String,
    update_source_cf: String,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, update_source: &str, update_source_cf: &str) -> Self {
        Self {
            path: path.into(),
            update_source: update_source.to_string(),
            update_source_cf: update_source_cf.to_string(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<Map<String, Value>>, StoreError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_slice(&data).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn persist(&self, documents: &[Map<String, Value>]) -> Result<(), StoreError> {
        let data =
            serde_json::to_vec_pretty(documents).map_err(|e| StoreError::Decode(e.to_string()))?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn fetch_pending(&self) -> Result<Vec<PendingRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let documents = self.load().await?;

        let failed = json!(ModerationStatus::Failed.as_str());
        Ok(documents
            .into_iter()
            .filter(|doc| doc.get("aiVideoModerationStatus") == Some(&failed))
            .map(|doc| {
                let record = VideoRecord::from_document(doc);
                if let Err(malformed) = &record {
                    warn!("Document {} does not decode: {}", malformed.id, malformed.error);
                }
                record
            })
            .collect())
    }

    async fn save_moderation(
        &self,
        record_id: &str,
        result: &ModerationResult,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut documents = self.load().await?;

        let doc = documents
            .iter_mut()
            .find(|doc| doc.get("id").and_then(Value::as_str) == Some(record_id))
            .ok_or_else(|| StoreError::Backend(format!("no document with id {}", record_id)))?;

        let output = serde_json::to_value(result).map_err(|e| StoreError::Decode(e.to_string()))?;
        let version = doc.get("version").and_then(Value::as_i64).unwrap_or(0) + 1;

        doc.insert("aiVideoModerationOutput".into(), output);
        doc.insert(
            "aiVideoModerationStatus".into(),
            json!(result.moderation_status.as_str()),
        );
        doc.insert(
            "updatedAt".into(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        doc.insert("updateSource".into(), json!(self.update_source));
        doc.insert("updateSourceCF".into(), json!(self.update_source_cf));
        doc.insert("version".into(), json!(version));

        self.persist(&documents).await
    }
}
