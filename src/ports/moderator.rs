use crate::domain::moderation::ModerationResult;
use crate::error::ModerationError;
use async_trait::async_trait;
use std::path::Path;

/// Anything that can turn a local video file into a moderation decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoModerator: Send + Sync {
    async fn moderate(&self, video_path: &Path) -> Result<ModerationResult, ModerationError>;
}
