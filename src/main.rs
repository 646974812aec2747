mod annotation;
mod core;
mod decoder;
mod engine;
mod error;
mod renderer;
mod shared;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::annotation::FaceDataset;
use crate::core::{CancellationToken, ChunkOrchestrator, DirectorySink, RunConfig, RunOutcome};
use crate::decoder::{FrameSource, VideoDecoder};
use crate::engine::{CollectorState, ExtractionEngine, Factory};
use crate::error::ChunkError;
use crate::renderer::TerminalProgress;
use crate::shared::constants;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Extract fixed-duration chunks from a video with precomputed face tracking",
    long_about = None
)]
struct Cli {
    /// Path of video file to process
    video_path: PathBuf,
    /// Path of face tracking data
    face_path: PathBuf,
    /// Path of study file
    study_path: PathBuf,
    /// Folder to save chunks
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Nominal chunk length in seconds
    #[arg(long, default_value_t = constants::DEFAULT_CHUNK_DURATION_S)]
    chunk_duration: f64,
    /// Report progress every N frames (0 disables it)
    #[arg(long, default_value_t = constants::DEFAULT_PROGRESS_INTERVAL)]
    progress_every: u64,
    /// Do not draw the progress line
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
    /// Attach a marker to a frame, as FRAME=TEXT (repeatable)
    #[arg(long = "marker", value_parser = crate::core::config::parse_marker)]
    markers: Vec<(u64, String)>,
}

fn main() -> Result<ExitCode> {
    crate::utils::logger::init(&std::env::current_dir()?);

    let cli = Cli::parse();
    let mut config = RunConfig {
        chunk_duration_s: cli.chunk_duration,
        progress_interval: cli.progress_every,
        output_dir: cli.output.clone(),
        ..RunConfig::default()
    };
    for (frame, text) in &cli.markers {
        config.add_marker(*frame, text.clone());
    }

    match run(&cli, config) {
        Ok(outcome) if outcome.is_success() => {
            println!("Collection finished completely");
            Ok(ExitCode::SUCCESS)
        }
        Ok(_) => {
            println!("Collection interrupted or failed");
            Ok(ExitCode::SUCCESS)
        }
        Err(
            e @ (ChunkError::EngineInitializationFailed(_)
            | ChunkError::CollectorCreationFailed(_)),
        ) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("{}", e);
            println!("Collection interrupted or failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run(cli: &Cli, config: RunConfig) -> Result<RunOutcome, ChunkError> {
    println!("{} engine {}", constants::APP_NAME, Factory::version());

    let factory = Factory::initialize_study_from_file(&cli.study_path)?;
    println!("Created study from {}", cli.study_path.display());

    let collector = factory.create_collector();
    if collector.state() == CollectorState::Error {
        let reason = collector.last_error().unwrap_or("collector entered ERROR");
        return Err(ChunkError::CollectorCreationFailed(reason.to_string()));
    }
    println!("Created collector");
    println!("    mode: {}", factory.mode());
    for constraint in collector.enabled_constraints() {
        println!("    enabled constraint: {}", constraint);
    }

    let faces = FaceDataset::load(&cli.face_path)?;

    let sink = match &config.output_dir {
        Some(dir) => Some(DirectorySink::create(dir).map_err(|source| {
            ChunkError::OutputUnavailable { path: dir.clone(), source }
        })?),
        None => None,
    };

    let source = VideoDecoder::open(&cli.video_path.to_string_lossy())?;
    let info = source.info().clone();
    println!(
        "Opened {}: {} frames at {:.3} fps, chunks of {}s",
        info.name, info.total_frames, info.target_fps, config.chunk_duration_s
    );

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        crate::utils::logger::warn(&format!("Ctrl-C handler not installed: {}", e));
    }

    let mut progress = TerminalProgress::stdout();
    if cli.quiet || config.progress_interval == 0 {
        progress = progress.without_status_line();
    }
    let mut orchestrator = ChunkOrchestrator::new(collector, sink, config)
        .with_cancellation(cancel)
        .with_observer(Box::new(progress));

    let report = orchestrator.run(source, &faces)?;
    println!(
        "{} frames, {} chunk(s) forwarded, {} empty{}",
        report.frames_submitted,
        report.chunks_forwarded,
        report.empty_chunks,
        if report.flushed { ", final chunk flushed" } else { "" }
    );
    if let Some(dir) = orchestrator.sink().as_ref().map(DirectorySink::dir) {
        println!("Chunks saved to {}", dir.display());
    }
    Ok(report.outcome)
}
