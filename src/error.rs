//! Error types shared by the pipeline, the coordinator and the adapters.

use std::fmt;

/// Failure of a record store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store did not answer the query in time. Transient, safe to retry.
    #[error("query deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Credentials could not be loaded or exchanged for an access token.
    #[error("store authentication failed: {0}")]
    Auth(String),

    /// A document could not be turned into a record (or back).
    #[error("store document malformed: {0}")]
    Decode(String),

    /// Any other backend failure (connection, HTTP status, I/O).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::DeadlineExceeded(_))
    }
}

/// Failure while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can stop a single video from being moderated.
///
/// A pipeline timeout is not an error: it produces a `failed`
/// [`ModerationResult`](crate::domain::moderation::ModerationResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// A required tool or credential is missing.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to download video: {0}")]
    Download(String),

    /// The decoder exited non-zero; carries its diagnostic output verbatim.
    #[error("FFmpeg failed: {0}")]
    Extraction(String),

    #[error("classification request failed: {0}")]
    Classification(String),

    #[error("classifier output is not JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("classifier output does not match the moderation schema: {0}")]
    Schema(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ModerationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ModerationError::Config(_) => FailureKind::Config,
            ModerationError::Download(_) => FailureKind::Download,
            ModerationError::Extraction(_) => FailureKind::Extraction,
            ModerationError::Classification(_) => FailureKind::Classification,
            ModerationError::Parse(_) => FailureKind::Parse,
            ModerationError::Schema(_) => FailureKind::Schema,
            ModerationError::Store(_) => FailureKind::Store,
            ModerationError::Io(_) => FailureKind::Io,
        }
    }
}

/// Coarse failure category written to the audit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The record never reached the pipeline (deleted, empty upload, no URL).
    Ineligible,
    Config,
    Download,
    Extraction,
    Classification,
    Parse,
    Schema,
    Store,
    Io,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Ineligible => "ineligible",
            FailureKind::Config => "config",
            FailureKind::Download => "download",
            FailureKind::Extraction => "extraction",
            FailureKind::Classification => "classification",
            FailureKind::Parse => "parse",
            FailureKind::Schema => "schema",
            FailureKind::Store => "store",
            FailureKind::Io => "io",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
