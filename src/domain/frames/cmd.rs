use async_trait::async_trait;
use std::env;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command as TokioCommand;

pub const FFMPEG_BINARY: &str = "ffmpeg";

/// Seam around the external decoder so sampling can be tested without ffmpeg.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Cheap check that the decoder can be launched at all.
    fn decoder_available(&self) -> bool;

    /// Writes frames matching `output_pattern` (an ffmpeg `%04d` pattern).
    async fn run_ffmpeg_extract(
        &self,
        video_path: &Path,
        output_pattern: &Path,
        frame_rate: f64,
        max_frames: usize,
    ) -> io::Result<Output>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RealFfmpeg;

/// True when `binary` resolves to a file on `PATH`.
pub fn on_path(binary: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(binary);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

#[async_trait]
impl FrameExtractor for RealFfmpeg {
    fn decoder_available(&self) -> bool {
        on_path(FFMPEG_BINARY)
    }

    async fn run_ffmpeg_extract(
        &self,
        video_path: &Path,
        output_pattern: &Path,
        frame_rate: f64,
        max_frames: usize,
    ) -> io::Result<Output> {
        TokioCommand::new(FFMPEG_BINARY)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y"])
            .arg("-i")
            .arg(video_path)
            .args(["-an", "-sn"])
            .arg("-r")
            .arg(frame_rate.to_string())
            .arg("-frames:v")
            .arg(max_frames.to_string())
            .arg(output_pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // A fired pipeline deadline drops this future; take the child down with it.
            .kill_on_drop(true)
            .output()
            .await
    }
}
