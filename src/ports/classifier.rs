use crate::error::ModerationError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Raw answer from the classification engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Free-form text, expected to hold one JSON object (possibly fenced).
    pub raw_text: String,
    /// Tokens consumed by the request, 0 when the engine reports none.
    pub total_tokens: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClassificationEngine: Send + Sync {
    /// Sends the ordered frames and the policy prompt in a single request.
    /// Does not retry and does not interpret the response.
    async fn classify(
        &self,
        frames: &[PathBuf],
        policy_prompt: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<Classification, ModerationError>;
}
