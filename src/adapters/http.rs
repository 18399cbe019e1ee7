//! HTTP video transport.

use crate::error::ModerationError;
use crate::ports::transport::VideoTransport;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::{fs::File, io::AsyncWriteExt, io::BufWriter};
use tokio_util::io::StreamReader;

/// Connect and read timeout for video downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ModerationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(DOWNLOAD_TIMEOUT)
            .read_timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| ModerationError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

// Save a `Stream` of byte chunks to a file
async fn stream_to_file<S, E>(path: &Path, stream: S) -> io::Result<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl VideoTransport for HttpTransport {
    async fn download(&self, url: &str, local_path: &Path) -> Result<(), ModerationError> {
        let result = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ModerationError::Download(e.to_string()))?;

            stream_to_file(local_path, response.bytes_stream())
                .await
                .map_err(|e| ModerationError::Download(e.to_string()))
        }
        .await;

        if result.is_err() {
            // No partial downloads.
            let _ = tokio::fs::remove_file(local_path).await;
        }
        result
    }
}
