//! # prism-cli
//!
//! Command line front end for the Prism catalog manifest and the cached
//! inference service.
//!
//! This is the main entry point for the `prism` binary. It parses commands,
//! sets up logging and error handling, and dispatches to the command handlers.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use prism_core::error::{PrismError, PrismResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Catalog manifest and content-addressed inference cache over R2/S3
#[derive(Parser)]
#[command(name = "prism", version, about = "Catalog manifest and inference cache for R2/S3")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of prism.toml discovery
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Override a setting, e.g. --set store.bucket=filters
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Where inference results go
#[derive(Args, Debug, Clone, Default)]
pub struct DeliveryArgs {
    /// Cache partition for this result (e.g. a client or preset name)
    #[arg(long)]
    pub variant: Option<String>,

    /// File to write the image to when it could not be stored
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Print the response as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List catalog packs
    Manifest {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        page_size: Option<i64>,
        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a temporary download URL for a catalog file
    Presign { pack_id: String, key: String },
    /// Upscale and restore faces
    Restore {
        image: Utf8PathBuf,
        #[arg(long, default_value = "upscale+face_restore")]
        task: String,
        #[arg(long, default_value_t = 4)]
        upscale: u32,
        #[arg(long, default_value_t = 0)]
        tile: i64,
        #[arg(long, default_value_t = 0.5)]
        fidelity: f64,
        #[arg(long)]
        no_background_enhance: bool,
        #[arg(long)]
        no_face_upsample: bool,
        #[command(flatten)]
        delivery: DeliveryArgs,
    },
    /// Remove the background, producing a transparent PNG
    RemoveBg {
        image: Utf8PathBuf,
        #[command(flatten)]
        delivery: DeliveryArgs,
    },
    /// Edit an image from a text instruction
    Edit {
        image: Utf8PathBuf,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = 20)]
        steps: u32,
        #[arg(long, default_value_t = 1.5)]
        image_guidance: f64,
        #[arg(long, default_value_t = 7.0)]
        guidance: f64,
        #[command(flatten)]
        delivery: DeliveryArgs,
    },
    /// Edit using up to three images and a prompt
    QwenEdit {
        #[arg(required = true, num_args = 1..)]
        images: Vec<Utf8PathBuf>,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = 20)]
        steps: u32,
        #[arg(long, default_value_t = 7.0)]
        guidance: f64,
        #[command(flatten)]
        delivery: DeliveryArgs,
    },
    /// Show the cache key a request would use, without calling anything
    Key {
        operation: String,
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,
        /// Key parameter; the value is read as JSON when it parses
        #[arg(long = "param", value_name = "K=V")]
        params: Vec<String>,
        #[arg(long)]
        variant: Option<String>,
    },
    /// Check configuration
    Check,
}

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    info!("Starting Prism CLI v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_cli(cli) {
        eprintln!("{}", ErrorFormatter::new().format_error(&e));
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> PrismResult<()> {
    // Create Tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| PrismError::io("Failed to create async runtime", e))?;

    rt.block_on(async {
        let ctx = CommandContext::new(cli.config.as_deref(), &cli.overrides).await?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    // `prism` also matches every `prism_*` crate target
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prism={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Prism encountered an unexpected error: {}", panic_info);
        eprintln!("Prism crashed! This is a bug.");
        eprintln!("Error: {}", panic_info);
    }));
}
