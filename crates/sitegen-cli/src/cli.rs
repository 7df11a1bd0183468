use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "sitegen",
    version,
    about = "Generate a web page from a description and watch it build"
)]
pub struct Cli {
    /// Log at debug level instead of info (overridden by SITEGEN_LOG_LEVEL / RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Default tracing filter when neither SITEGEN_LOG_LEVEL nor RUST_LOG is set.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a description to the backend and stream the result.
    Build(BuildArgs),
    /// Feed a recorded event stream through the assembler, without a backend.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// File the live preview is written to; it is rewritten on every snapshot.
    #[arg(short, long, default_value = "website-description.html")]
    pub out: PathBuf,

    /// Seconds to wait for a single image before moving on.
    #[arg(long, default_value_t = 30)]
    pub image_timeout_secs: u64,

    /// Do not print progress lines.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Natural-language description of the page.
    pub description: String,

    /// Backend origin (defaults to SITEGEN_BASE_URL or http://localhost:8000).
    #[arg(long)]
    pub base_url: Option<String>,

    /// Build endpoint path (defaults to SITEGEN_ENDPOINT or /page_builder).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Whole-request timeout in seconds (defaults to SITEGEN_TIMEOUT_SECS or 600).
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// File holding raw `data: ...` frames as the backend sent them.
    pub input: PathBuf,

    /// Origin used to resolve relative image URLs.
    #[arg(long, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Read the file in chunks of this many bytes.
    #[arg(long, default_value_t = 4096)]
    pub chunk_size: usize,

    #[command(flatten)]
    pub output: OutputArgs,
}
