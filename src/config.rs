//! Configuration loaded from the environment (and `.env`).

use crate::domain::policy::DEFAULT_POLICY_PROMPT;
use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings for classifying a single video.
#[derive(Clone, Debug)]
pub struct ModerationConfig {
    /// API key for the classification engine
    pub openai_api_key: String,
    /// Base URL of the chat-completions compatible engine
    pub openai_base_url: String,
    /// Engine model identifier
    pub model: String,
    /// Frames sampled per second of video
    pub frame_rate: f64,
    /// Upper bound on frames sent per video
    pub max_frames: usize,
    /// End-to-end deadline for one pipeline run
    pub timeout: Duration,
    /// Output size limit for the engine's answer
    pub max_output_tokens: u32,
    /// Policy prompt text
    pub policy_prompt: String,
}

/// Settings for the batch coordinator and the record store.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Records per chunk, also the worker count within a chunk
    pub chunk_size: usize,
    /// Service-account file for the record store
    pub credentials_path: Option<PathBuf>,
    /// Collection holding the video documents
    pub collection: String,
    /// Where chunk and error reports are written
    pub reports_dir: PathBuf,
    /// Where source videos are downloaded to
    pub download_dir: PathBuf,
    /// Provenance written with every update
    pub update_source: String,
    pub update_source_cf: String,
}

impl ModerationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let frame_rate: f64 = parse_or(&lookup, "FRAME_INTERVAL", 0.1)?;
        if !(frame_rate > 0.0 && frame_rate.is_finite()) {
            return Err(invalid("FRAME_INTERVAL", frame_rate, "must be greater than 0"));
        }
        let max_frames: usize = parse_or(&lookup, "MAX_FRAMES", 30)?;
        if max_frames == 0 {
            return Err(invalid("MAX_FRAMES", max_frames, "must be greater than 0"));
        }

        let policy_prompt = match lookup("POLICY_PROMPT_FILE") {
            Some(path) => std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Unreadable { path, source })?,
            None => DEFAULT_POLICY_PROMPT.to_string(),
        };

        Ok(Self {
            openai_api_key,
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| String::from("https://api.openai.com/v1")),
            model: lookup("OPENAI_MODEL").unwrap_or_else(|| String::from("gpt-4o-mini")),
            frame_rate,
            max_frames,
            timeout: Duration::from_secs(parse_or(&lookup, "TIMEOUT_SECONDS", 45)?),
            max_output_tokens: parse_or(&lookup, "MAX_OUTPUT_TOKENS", 500)?,
            policy_prompt,
        })
    }
}

impl BatchConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chunk_size: usize = parse_or(&lookup, "BATCH_SIZE", 8)?;
        if chunk_size == 0 {
            return Err(invalid("BATCH_SIZE", chunk_size, "must be greater than 0"));
        }

        Ok(Self {
            chunk_size,
            credentials_path: lookup("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            collection: lookup("FIRESTORE_COLLECTION").unwrap_or_else(|| String::from("UserVideos")),
            reports_dir: PathBuf::from(
                lookup("REPORTS_DIR").unwrap_or_else(|| String::from("batch_errors")),
            ),
            download_dir: PathBuf::from(
                lookup("DOWNLOAD_DIR").unwrap_or_else(|| String::from("downloaded_videos")),
            ),
            update_source: lookup("UPDATE_SOURCE")
                .unwrap_or_else(|| String::from("aiVideoModeration")),
            update_source_cf: lookup("UPDATE_SOURCE_CF")
                .unwrap_or_else(|| String::from("batchVideoModeration")),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
