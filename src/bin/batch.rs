//! Batch binary
//!
//! Fetches every record whose moderation failed, re-runs the pipeline on
//! each in parallel chunks and writes one CSV report per chunk.
//!
//! Records come from Firestore by default, or from a local JSON file with
//! `--records`.

use clap::Parser;
use lessonguard::adapters::http::HttpTransport;
use lessonguard::adapters::local::JsonFileStore;
use lessonguard::adapters::openai::OpenAiClassifier;
use lessonguard::config::{BatchConfig, ModerationConfig};
use lessonguard::domain::frames::cmd::{FrameExtractor, RealFfmpeg, FFMPEG_BINARY};
use lessonguard::ports::repository::RecordStore;
use lessonguard::{
    telemetry, BatchCoordinator, BatchSettings, BatchSummary, ModerationPipeline, PipelineSettings,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "batch", about = "Re-moderate every pending video record")]
struct Args {
    /// Records per chunk, overrides BATCH_SIZE
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: Option<u64>,

    /// Read and update records in this JSON file instead of Firestore
    #[arg(long)]
    records: Option<PathBuf>,
}

type Pipeline = ModerationPipeline<RealFfmpeg, OpenAiClassifier>;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();
    let args = Args::parse();

    match start(args).await {
        Ok(summary) => {
            info!(
                "Batch finished: {} fetched, {} succeeded, {} failed, {} skipped, {} reports",
                summary.fetched,
                summary.succeeded,
                summary.failed,
                summary.skipped,
                summary.reports.len()
            );
            if let Some(reason) = summary.aborted {
                warn!("Batch aborted early: {}", reason);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn start(args: Args) -> Result<BatchSummary, Box<dyn Error + Send + Sync>> {
    let moderation_config = ModerationConfig::from_env()?;
    let mut batch_config = BatchConfig::from_env()?;
    if let Some(chunk_size) = args.chunk_size {
        batch_config.chunk_size = usize::try_from(chunk_size)?;
    }

    let extractor = RealFfmpeg;
    if !extractor.decoder_available() {
        return Err(format!("{} is not available on PATH", FFMPEG_BINARY).into());
    }

    let classifier = OpenAiClassifier::new(
        reqwest::Client::new(),
        &moderation_config.openai_base_url,
        &moderation_config.openai_api_key,
    );
    let pipeline = ModerationPipeline::new(
        extractor,
        classifier,
        PipelineSettings::from(&moderation_config),
    );
    let transport = HttpTransport::new()?;

    if let Some(path) = args.records {
        if !path.is_file() {
            return Err(format!("records file not found: {}", path.display()).into());
        }
        let store = JsonFileStore::new(
            path,
            &batch_config.update_source,
            &batch_config.update_source_cf,
        );
        return Ok(run(store, transport, pipeline, &batch_config).await);
    }

    firestore_run(transport, pipeline, &batch_config).await
}

#[cfg(feature = "firestore")]
async fn firestore_run(
    transport: HttpTransport,
    pipeline: Pipeline,
    config: &BatchConfig,
) -> Result<BatchSummary, Box<dyn Error + Send + Sync>> {
    use lessonguard::adapters::firestore::FirestoreStore;

    let credentials = config
        .credentials_path
        .as_ref()
        .ok_or("GOOGLE_APPLICATION_CREDENTIALS is not set")?;
    let store = FirestoreStore::from_credentials(
        credentials,
        &config.collection,
        &config.update_source,
        &config.update_source_cf,
    )
    .await?;
    Ok(run(store, transport, pipeline, config).await)
}

#[cfg(not(feature = "firestore"))]
async fn firestore_run(
    _transport: HttpTransport,
    _pipeline: Pipeline,
    _config: &BatchConfig,
) -> Result<BatchSummary, Box<dyn Error + Send + Sync>> {
    Err("built without the `firestore` feature, pass --records".into())
}

async fn run<S: RecordStore + 'static>(
    store: S,
    transport: HttpTransport,
    pipeline: Pipeline,
    config: &BatchConfig,
) -> BatchSummary {
    let coordinator = BatchCoordinator::new(
        Arc::new(store),
        Arc::new(transport),
        Arc::new(pipeline),
        BatchSettings::from(config),
    );
    coordinator.run_batch().await
}
