use crate::domain::moderation::ModerationResult;
use crate::domain::records::PendingRecord;
use crate::error::StoreError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records whose moderation status is `failed`. Documents that match
    /// but do not decode come back as `Err` entries rather than being dropped.
    async fn fetch_pending(&self) -> Result<Vec<PendingRecord>, StoreError>;

    /// Merges the result into the record: output, mirrored status, update
    /// timestamp, provenance fields and a version bump.
    async fn save_moderation(
        &self,
        record_id: &str,
        result: &ModerationResult,
    ) -> Result<(), StoreError>;
}
