//! Command-line entry point: read-assist.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse arguments.
//! 3. Load [`AppConfig`] from disk (returns default on first run).
//! 4. Create [`tokio`] runtime.
//! 5. Load and validate the video upload.
//! 6. Submit the job and follow it until it completes, fails, or Ctrl-C
//!    cancels it.
//! 7. Print the result, or write it to `--output` / the results directory.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::mpsc;

use read_assist::{
    config::{AppConfig, AppPaths},
    jobs::{download_file_name, AsyncJobClient, JobEvent, JobKind, JobResult, Level},
    upload::Upload,
};

#[derive(Debug, Parser)]
#[command(name = "read-assist", version, about = "Transcribe, translate or summarize a video")]
struct Cli {
    /// transcription, translation or summarization
    kind: JobKind,

    /// Video file to upload
    file: PathBuf,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the settings file
    #[arg(long)]
    backend_url: Option<String>,

    /// Write the result text here instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the result text to the results directory as `<kind>_result.txt`
    #[arg(long, conflicts_with = "output")]
    save: bool,
}

// ---------------------------------------------------------------------------
// Event printer
// ---------------------------------------------------------------------------

/// Log every notice; progress goes to the debug log only.
async fn print_events(mut rx: mpsc::Receiver<JobEvent>) {
    while let Some(event) = rx.recv().await {
        if let JobEvent::Progress {
            progress, status, ..
        } = &event
        {
            log::debug!("{status}: {progress}%");
        }
        match event.notice() {
            Some((Level::Error, text)) => log::error!("{text}"),
            Some((_, text)) => log::info!("{text}"),
            None => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Job run
// ---------------------------------------------------------------------------

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    // 5. Upload
    let upload = Upload::from_path_limited(&cli.file, config.upload.max_bytes).await?;
    upload.validate_video(config.upload.max_bytes)?;

    // 6. Submit + poll
    let (event_tx, event_rx) = mpsc::channel::<JobEvent>(32);
    let printer = tokio::spawn(print_events(event_rx));
    let client = AsyncJobClient::from_config(&config).with_events(event_tx);

    // Ctrl-C drops this future: an unfinished upload is abandoned, and the
    // handle's Drop cancels polling.
    let follow = async {
        let mut handle = client.submit_and_start(upload, cli.kind).await?;
        log::info!("task id: {}", handle.id());
        Ok::<_, anyhow::Error>(handle.wait().await)
    };

    let finished = tokio::select! {
        job = follow => Some(job),
        _ = tokio::signal::ctrl_c() => None,
    };

    drop(client);
    let _ = printer.await;

    let Some(job) = finished else {
        bail!("{} cancelled", cli.kind);
    };
    let job = job?;

    // 7. Result
    let payload = match job.outcome() {
        Some(Ok(payload)) => payload,
        Some(Err(e)) => return Err(e.into()),
        None => bail!("polling stopped before {} finished", cli.kind),
    };
    let result = JobResult::from_value(payload);

    if let Some(lang) = &result.language {
        log::info!("detected language: {lang}");
    }
    if let Some(pct) = result.confidence_percent() {
        log::info!("confidence: {pct}%");
    }
    if result.segment_count() > 0 {
        log::info!("{} segments processed", result.segment_count());
    }

    let output = match cli.output {
        Some(path) => Some(path),
        None if cli.save => Some(AppPaths::new().results_dir.join(download_file_name(cli.kind))),
        None => None,
    };

    match output {
        Some(path) => {
            result
                .save_to(&path)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            log::info!("result written to {}", path.display());
        }
        None => {
            if let Some(transcript) = &result.transcript {
                println!("{transcript}\n");
            }
            match cli.kind {
                JobKind::Transcription => println!("{}", result.download_text()),
                _ => println!("{}", result.headline()),
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Arguments
    let cli = Cli::parse();

    // 3. Configuration
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.apply_backend_url_override(cli.backend_url.clone());
    log::debug!("backend: {}", config.backend.base_url);

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(cli, config))
}
