//! `sitegen`: submit a page description and watch the build stream.

mod cli;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser as _;
use sitegen_stream::{
    AbortHandle, AbortSignal, AssemblerOptions, BuildClient, BuildClientConfig, BuildError,
    ConsumeReport, HttpImageLoader, StreamAssembler, init_observability,
};
use tracing::info;

use crate::cli::{BuildArgs, Cli, Command, OutputArgs, ReplayArgs};
use crate::terminal::{FilePreview, TerminalLog, TerminalOverlay};

#[tokio::main]
async fn main() -> ExitCode {
    load_env();
    let cli = Cli::parse();
    init_observability(cli.log_level());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Loads `.env` from the crate directory, then from the working directory.
fn load_env() {
    let _ = dotenvy::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    dotenvy::dotenv().ok();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build(args) => build(args).await,
        Command::Replay(args) => replay(args).await,
    }
}

struct Session {
    assembler: StreamAssembler,
    log: Arc<TerminalLog>,
    preview: Arc<FilePreview>,
}

fn session(output: &OutputArgs, base_url: &str) -> Result<Session, BuildError> {
    let image_timeout = Duration::from_secs(output.image_timeout_secs);
    let loader = HttpImageLoader::new(base_url, image_timeout)?;
    let log = Arc::new(TerminalLog::new(Arc::new(loader), output.quiet));
    let preview = Arc::new(FilePreview::new(&output.out));
    let assembler = StreamAssembler::with_options(
        preview.clone(),
        log.clone(),
        AssemblerOptions::default().image_timeout(image_timeout),
    );
    Ok(Session {
        assembler,
        log,
        preview,
    })
}

/// Aborts the build on Ctrl-C.
fn abort_on_ctrl_c() -> AbortSignal {
    let (handle, signal) = AbortHandle::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling build");
            handle.abort();
        }
    });
    signal
}

async fn build(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = BuildClientConfig::from_env()?;
    if let Some(base_url) = args.base_url {
        config = config.base_url(base_url);
    }
    if let Some(endpoint) = args.endpoint {
        config = config.endpoint(endpoint);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.timeout(Duration::from_secs(secs));
    }
    let client = BuildClient::new(config)?;
    let session = session(&args.output, &client.config().base_url)?;
    let overlay = TerminalOverlay::new(args.output.quiet);

    let outcome = client
        .build_page(
            &session.assembler,
            &overlay,
            &args.description,
            abort_on_ctrl_c(),
        )
        .await;
    finish(&session, outcome)
}

async fn replay(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read(&args.input)?;
    let session = session(&args.output, &args.base_url)?;
    let overlay = TerminalOverlay::new(args.output.quiet);

    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = raw
        .chunks(args.chunk_size.max(1))
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();
    let outcome = {
        let _overlay = sitegen_stream::OverlayGuard::acquire(&overlay);
        session.assembler.reset_group()?;
        session
            .assembler
            .consume(futures::stream::iter(chunks), abort_on_ctrl_c())
            .await
    };
    finish(&session, outcome)
}

/// Summarizes a finished build. A build that failed after streaming began
/// may still have left a partial preview behind, so that is reported too.
fn finish(
    session: &Session,
    outcome: Result<ConsumeReport, BuildError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        Ok(report) => {
            summarize(session, &report);
            Ok(())
        }
        Err(err) => {
            if !err.is_before_stream() {
                announce_preview(session);
            }
            Err(err.into())
        }
    }
}

fn summarize(session: &Session, report: &ConsumeReport) {
    let entries = session
        .log
        .log()
        .current_group()
        .map(|g| g.entries.len())
        .unwrap_or(0);
    info!(
        events = report.events,
        entries,
        frame_errors = report.frame_errors.len(),
        image_failures = report.image_failures.len(),
        "build finished"
    );
    if !report.frame_errors.is_empty() {
        eprintln!(
            "warning: {} malformed frame(s) were skipped",
            report.frame_errors.len()
        );
    }
    announce_preview(session);
}

fn announce_preview(session: &Session) {
    if session.preview.snapshots_written() > 0 {
        eprintln!("preview saved to {}", session.preview.path().display());
    }
}
