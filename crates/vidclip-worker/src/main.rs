//! Clip extraction CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidclip_models::PipelineResult;
use vidclip_worker::{PipelineConfig, PipelineOrchestrator};

/// Extract short vertical clips from a YouTube video.
#[derive(Debug, Parser)]
#[command(name = "vidclip", version, about)]
struct Cli {
    /// YouTube video URL
    url: String,

    /// Directory for rendered clips
    #[arg(short, long, env = "VIDCLIP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for transient downloads
    #[arg(long, env = "VIDCLIP_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Skip external scoring and use heuristic segments
    #[arg(long)]
    no_ai: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vidclip=info,vidclip_worker=info,vidclip_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env();
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &cli.work_dir {
        config.work_dir = dir.clone();
    }
    if cli.no_ai {
        config.scoring.api_key = None;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn print_summary(result: &PipelineResult) {
    println!("{} ({}s)", result.metadata.title, result.metadata.duration_seconds);
    println!(
        "Segments: {} from {} selection, {} rendered",
        result.requested_segment_count,
        result.selection_source.as_str(),
        result.succeeded_segment_count
    );
    for clip in &result.clips {
        println!(
            "  {} [{:.1}s-{:.1}s] {:.2} MB  {}",
            clip.file_path.display(),
            clip.segment.start_seconds,
            clip.segment.end_seconds,
            clip.size_mb(),
            clip.segment.title
        );
    }
    for skipped in &result.skipped {
        println!("  skipped #{} {}: {}", skipped.index + 1, skipped.title, skipped.reason);
    }
    println!("Total: {:.2} MB", result.total_output_mb());
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(2);
        }
    };
    info!("Pipeline config: {:?}", config);

    let orchestrator = match PipelineOrchestrator::from_config(config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling job");
            let _ = cancel_tx.send(true);
        }
    });

    match orchestrator.run_with_cancel(&cli.url, cancel_rx).await {
        Ok(result) => {
            if result.all_segments_failed() {
                warn!(video_id = %result.video_id, "No clip could be rendered");
            }
            if cli.json {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("error: failed to serialize result: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_summary(&result);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
