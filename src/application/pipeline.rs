//! Sampler, classifier and validator under one end-to-end deadline.

use crate::config::ModerationConfig;
use crate::domain::frames::cmd::FrameExtractor;
use crate::domain::frames::extract_frames;
use crate::domain::moderation::{validate, ModerationResult};
use crate::error::ModerationError;
use crate::ports::classifier::ClassificationEngine;
use crate::ports::moderator::VideoModerator;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub frame_rate: f64,
    pub max_frames: usize,
    pub timeout: Duration,
    pub model: String,
    pub max_output_tokens: u32,
    pub policy_prompt: String,
    /// Parent for per-run scratch directories; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
}

impl From<&ModerationConfig> for PipelineSettings {
    fn from(config: &ModerationConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            max_frames: config.max_frames,
            timeout: config.timeout,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            policy_prompt: config.policy_prompt.clone(),
            scratch_root: None,
        }
    }
}

pub struct ModerationPipeline<F, C> {
    extractor: F,
    classifier: C,
    settings: PipelineSettings,
}

impl<F, C> ModerationPipeline<F, C>
where
    F: FrameExtractor,
    C: ClassificationEngine,
{
    pub fn new(extractor: F, classifier: C, settings: PipelineSettings) -> Self {
        Self {
            extractor,
            classifier,
            settings,
        }
    }

    fn scratch_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("frames-");
        match &self.settings.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    async fn run(&self, video_path: &Path, scratch: &Path) -> Result<ModerationResult, ModerationError> {
        let frames = extract_frames(
            &self.extractor,
            video_path,
            scratch,
            self.settings.frame_rate,
            self.settings.max_frames,
        )
        .await?;

        let classification = self
            .classifier
            .classify(
                &frames,
                &self.settings.policy_prompt,
                &self.settings.model,
                self.settings.max_output_tokens,
            )
            .await?;

        validate(&classification.raw_text, classification.total_tokens)
    }

    /// Runs the whole pipeline for one local video.
    ///
    /// Stage errors propagate. Running past the deadline is not an error: the
    /// in-flight work is dropped (the decoder is killed with it) and the
    /// canonical timeout result is returned. The scratch directory is removed
    /// on every path.
    pub async fn moderate(&self, video_path: &Path) -> Result<ModerationResult, ModerationError> {
        let scratch = self.scratch_dir()?;
        let outcome =
            tokio::time::timeout(self.settings.timeout, self.run(video_path, scratch.path())).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch dir {}: {}", scratch_path.display(), e);
        }

        match outcome {
            Ok(result) => result,
            Err(_) => {
                info!(
                    "Moderation of {} exceeded {}s, reporting timeout",
                    video_path.display(),
                    self.settings.timeout.as_secs()
                );
                Ok(ModerationResult::timed_out())
            }
        }
    }
}

#[async_trait]
impl<F, C> VideoModerator for ModerationPipeline<F, C>
where
    F: FrameExtractor,
    C: ClassificationEngine,
{
    async fn moderate(&self, video_path: &Path) -> Result<ModerationResult, ModerationError> {
        ModerationPipeline::moderate(self, video_path).await
    }
}
