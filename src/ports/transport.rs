use crate::error::ModerationError;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoTransport: Send + Sync {
    /// Streams `url` into `local_path`. On failure no partial file is left behind.
    async fn download(&self, url: &str, local_path: &Path) -> Result<(), ModerationError>;
}
