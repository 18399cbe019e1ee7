//! Video records as stored in the record store, and per-record batch outcomes.

use super::moderation::{ModerationResult, ModerationStatus};
use crate::error::{FailureKind, ModerationError, StoreError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// The subset of a stored video document this crate reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, rename = "aiVideoModerationStatus")]
    pub moderation_status: Option<ModerationStatus>,
    /// Upload size in bytes. Any JSON number is accepted; other types read as unknown.
    #[serde(default, deserialize_with = "lenient_number")]
    pub initial_size: Option<f64>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|value| value.as_f64()))
}

/// A matched document that could not be turned into a [`VideoRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub id: String,
    pub error: String,
}

/// One entry of a pending-records fetch.
pub type PendingRecord = Result<VideoRecord, MalformedRecord>;

impl VideoRecord {
    /// Decodes a flattened store document; the id is kept even when decoding fails.
    pub fn from_document(document: Map<String, Value>) -> PendingRecord {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        serde_json::from_value(Value::Object(document)).map_err(|e| MalformedRecord {
            id,
            error: e.to_string(),
        })
    }
}

/// Why a record was not dispatched to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    /// Already carries a terminal status; nothing to do.
    AlreadyProcessed,
    Deleted,
    EmptyUpload,
    MissingUrl,
}

impl Ineligible {
    pub fn message(&self) -> &'static str {
        match self {
            Ineligible::AlreadyProcessed => "Already Processed",
            Ineligible::Deleted => "deleted",
            Ineligible::EmptyUpload => "initial size is 0",
            Ineligible::MissingUrl => "video Url not present",
        }
    }
}

impl VideoRecord {
    /// Returns the source URL when the record may be (re)processed.
    ///
    /// Checks run in order and the first failing one wins. A missing
    /// `isDeleted` flag counts as deleted.
    pub fn eligibility(&self) -> Result<&str, Ineligible> {
        match self.moderation_status {
            None | Some(ModerationStatus::Failed) => {}
            Some(_) => return Err(Ineligible::AlreadyProcessed),
        }
        if self.is_deleted != Some(false) {
            return Err(Ineligible::Deleted);
        }
        if self.initial_size == Some(0.0) {
            return Err(Ineligible::EmptyUpload);
        }
        self.video_url.as_deref().ok_or(Ineligible::MissingUrl)
    }
}

/// Result of running one record through the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Success {
        id: String,
        moderation: ModerationResult,
    },
    Failed {
        id: String,
        kind: FailureKind,
        error: String,
    },
    Skipped {
        id: String,
        reason: String,
    },
}

impl BatchOutcome {
    pub fn failed(id: impl Into<String>, err: &ModerationError) -> Self {
        BatchOutcome::Failed {
            id: id.into(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }

    /// Maps an eligibility rejection onto an outcome. No store write follows.
    pub fn ineligible(id: impl Into<String>, why: Ineligible) -> Self {
        match why {
            Ineligible::AlreadyProcessed => BatchOutcome::Skipped {
                id: id.into(),
                reason: why.message().to_string(),
            },
            _ => BatchOutcome::Failed {
                id: id.into(),
                kind: FailureKind::Ineligible,
                error: why.message().to_string(),
            },
        }
    }

    /// A fetched document that never reached eligibility checks.
    pub fn malformed(record: MalformedRecord) -> Self {
        BatchOutcome::Failed {
            id: record.id,
            kind: FailureKind::Store,
            error: StoreError::Decode(record.error).to_string(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BatchOutcome::Success { id, .. }
            | BatchOutcome::Failed { id, .. }
            | BatchOutcome::Skipped { id, .. } => id,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            BatchOutcome::Success { .. } => "success",
            BatchOutcome::Failed { .. } => "failed",
            BatchOutcome::Skipped { .. } => "skipped",
        }
    }
}
