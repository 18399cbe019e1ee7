//! Moderation result model and the validator that turns classifier text into it.

use crate::error::ModerationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Upper bound on `detectedObjects`.
pub const MAX_DETECTED_OBJECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModerationStatus {
    Approved,
    Rejected,
    NeedsManualReview,
    Failed,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
            ModerationStatus::NeedsManualReview => "needsManualReview",
            ModerationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of moderating one video. Every field is always present; the
/// boolean flags are only `None` when the run failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    pub moderation_status: ModerationStatus,
    pub reason: String,
    pub explicit_content: Option<bool>,
    pub stem_content: Option<bool>,
    pub pii_detected: Option<bool>,
    pub copyright_risk: Option<bool>,
    pub detected_objects: Vec<String>,
    pub detected_keywords: Vec<String>,
    pub total_tokens: u64,
}

impl ModerationResult {
    /// Terminal result for a run that did not finish before its deadline.
    pub fn timed_out() -> Self {
        Self {
            moderation_status: ModerationStatus::Failed,
            reason: "Timeout".to_string(),
            explicit_content: None,
            stem_content: None,
            pii_detected: None,
            copyright_risk: None,
            detected_objects: Vec::new(),
            detected_keywords: Vec::new(),
            total_tokens: 0,
        }
    }
}

/// Shape the classifier is asked to return. `totalTokens` is never read from
/// the classifier; it comes from the usage counter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassifierOutput {
    moderation_status: ModerationStatus,
    reason: String,
    #[serde(default)]
    explicit_content: Option<bool>,
    #[serde(default)]
    stem_content: Option<bool>,
    #[serde(default)]
    pii_detected: Option<bool>,
    #[serde(default)]
    copyright_risk: Option<bool>,
    detected_objects: Vec<String>,
    detected_keywords: Vec<String>,
}

fn fence_markers() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json)?").expect("fence pattern is valid"))
}

/// Removes surrounding whitespace and any markdown code fence markers.
pub fn strip_code_fences(raw: &str) -> String {
    fence_markers().replace_all(raw.trim(), "").trim().to_string()
}

/// Parses classifier text into a [`ModerationResult`].
///
/// Fails with [`ModerationError::Parse`] when the text is not JSON and with
/// [`ModerationError::Schema`] when required fields are missing or mistyped.
/// The classifier's decision itself is not second-guessed.
pub fn validate(raw_text: &str, total_tokens: u64) -> Result<ModerationResult, ModerationError> {
    let value: serde_json::Value =
        serde_json::from_str(&strip_code_fences(raw_text)).map_err(ModerationError::Parse)?;

    if !value.is_object() {
        return Err(ModerationError::Schema(format!(
            "expected a JSON object, got {}",
            value
        )));
    }

    let mut output: ClassifierOutput =
        serde_json::from_value(value).map_err(|e| ModerationError::Schema(e.to_string()))?;
    output.detected_objects.truncate(MAX_DETECTED_OBJECTS);

    Ok(ModerationResult {
        moderation_status: output.moderation_status,
        reason: output.reason,
        explicit_content: output.explicit_content,
        stem_content: output.stem_content,
        pii_detected: output.pii_detected,
        copyright_risk: output.copyright_risk,
        detected_objects: output.detected_objects,
        detected_keywords: output.detected_keywords,
        total_tokens,
    })
}
