//! Single-video binary
//!
//! Runs the moderation pipeline on one local file and prints the result as
//! JSON, or writes it to `--output`. A `failed` moderation status is still a
//! successful run; configuration, I/O and pipeline errors exit non-zero.

use clap::Parser;
use lessonguard::adapters::openai::OpenAiClassifier;
use lessonguard::config::ModerationConfig;
use lessonguard::domain::frames::cmd::{FrameExtractor, RealFfmpeg, FFMPEG_BINARY};
use lessonguard::{telemetry, ModerationPipeline, PipelineSettings};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "moderate", about = "Moderate a single video file")]
struct Args {
    /// Local video file to moderate
    #[arg(long)]
    video: PathBuf,

    /// Write the JSON result here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    if !args.video.is_file() {
        return Err(format!("video file not found: {}", args.video.display()).into());
    }

    let config = ModerationConfig::from_env()?;
    let extractor = RealFfmpeg;
    if !extractor.decoder_available() {
        return Err(format!("{} is not available on PATH", FFMPEG_BINARY).into());
    }

    let classifier = OpenAiClassifier::new(
        reqwest::Client::new(),
        &config.openai_base_url,
        &config.openai_api_key,
    );
    let pipeline = ModerationPipeline::new(extractor, classifier, PipelineSettings::from(&config));

    info!("Moderating {}", args.video.display());
    let result = pipeline.moderate(&args.video).await?;
    let json = serde_json::to_string_pretty(&result)?;

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            info!("Result written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
