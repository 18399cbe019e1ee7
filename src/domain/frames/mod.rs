//! Frame sampling: turns a video into an ordered list of still images.

pub mod cmd;

use crate::error::ModerationError;
use cmd::FrameExtractor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fixed-width numbering keeps lexicographic order equal to temporal order.
pub const FRAME_PATTERN: &str = "frame-%04d.jpg";

/// Extracts frames from `video_path` into `output_dir` at `frame_rate` frames
/// per second, at most `max_frames` of them.
///
/// No retries and no partial recovery: on failure, whatever the decoder wrote
/// is left for the caller's scratch cleanup.
pub async fn extract_frames(
    runner: &impl FrameExtractor,
    video_path: &Path,
    output_dir: &Path,
    frame_rate: f64,
    max_frames: usize,
) -> Result<Vec<PathBuf>, ModerationError> {
    if !runner.decoder_available() {
        return Err(ModerationError::Config(format!(
            "{} is not available on PATH",
            cmd::FFMPEG_BINARY
        )));
    }

    let output = runner
        .run_ffmpeg_extract(
            video_path,
            &output_dir.join(FRAME_PATTERN),
            frame_rate,
            max_frames,
        )
        .await
        .map_err(|e| ModerationError::Extraction(e.to_string()))?;

    if !output.status.success() {
        return Err(ModerationError::Extraction(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }

    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        frames.push(entry.path());
    }
    frames.sort();

    debug!(
        video = %video_path.display(),
        frames = frames.len(),
        "Extracted frames"
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::cmd::MockFrameExtractor;
    use super::*;
    use std::io;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use tempfile::tempdir;

    fn create_mock_output(stderr_str: &str, success: bool) -> io::Result<Output> {
        Ok(Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                ExitStatus::from_raw(1 << 8)
            },
            stdout: Vec::new(),
            stderr: stderr_str.as_bytes().to_vec(),
        })
    }

    #[tokio::test]
    async fn test_extract_returns_frames_in_order() {
        let dir = tempdir().unwrap();
        let out_dir = dir.path().to_path_buf();
        let mut mock_runner = MockFrameExtractor::new();

        mock_runner.expect_decoder_available().return_const(true);
        let expected_pattern = out_dir.join(FRAME_PATTERN);
        mock_runner
            .expect_run_ffmpeg_extract()
            .withf(move |video, pattern, rate, max| {
                video == Path::new("lesson.mp4")
                    && pattern == expected_pattern.as_path()
                    && *rate == 0.5
                    && *max == 30
            })
            .times(1)
            .returning(move |_, pattern, _, _| {
                let dir = pattern.parent().unwrap();
                for n in [3, 1, 2] {
                    std::fs::write(dir.join(format!("frame-{:04}.jpg", n)), b"jpg").unwrap();
                }
                create_mock_output("", true)
            });

        let frames = extract_frames(&mock_runner, Path::new("lesson.mp4"), &out_dir, 0.5, 30)
            .await
            .unwrap();

        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["frame-0001.jpg", "frame-0002.jpg", "frame-0003.jpg"]);
    }

    #[tokio::test]
    async fn test_missing_decoder_fails_before_running() {
        let dir = tempdir().unwrap();
        let mut mock_runner = MockFrameExtractor::new();
        mock_runner.expect_decoder_available().return_const(false);
        mock_runner.expect_run_ffmpeg_extract().times(0);

        let err = extract_frames(&mock_runner, Path::new("lesson.mp4"), dir.path(), 1.0, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Config(_)));
    }

    #[tokio::test]
    async fn test_decoder_failure_carries_stderr() {
        let dir = tempdir().unwrap();
        let mut mock_runner = MockFrameExtractor::new();
        mock_runner.expect_decoder_available().return_const(true);
        mock_runner
            .expect_run_ffmpeg_extract()
            .times(1)
            .returning(|_, _, _, _| create_mock_output("lesson.mp4: Invalid data found", false));

        let err = extract_frames(&mock_runner, Path::new("lesson.mp4"), dir.path(), 1.0, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Extraction(_)));
        assert!(err.to_string().contains("lesson.mp4: Invalid data found"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_extraction_error() {
        let dir = tempdir().unwrap();
        let mut mock_runner = MockFrameExtractor::new();
        mock_runner.expect_decoder_available().return_const(true);
        mock_runner
            .expect_run_ffmpeg_extract()
            .times(1)
            .returning(|_, _, _, _| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));

        let err = extract_frames(&mock_runner, Path::new("lesson.mp4"), dir.path(), 1.0, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Extraction(_)));
    }
}
