use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "pickture")]
#[command(about = "Pickture - cull photos with automatic white balance previews")]
struct Cli {
    /// Engine config file (TOML); missing file means defaults
    #[arg(short, long, global = true, default_value = "pickture.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported images in a folder
    Scan {
        /// Folder to scan (not recursive)
        dir: PathBuf,
    },
    /// Produce one variant of an image
    Process {
        /// Source image
        file: PathBuf,

        /// Which variant to produce
        #[arg(short, long, value_enum, default_value_t = Mode::WbValue)]
        mode: Mode,

        /// Custom mode: low clamp (0-255)
        #[arg(long, default_value_t = 0.0)]
        low: f64,

        /// Custom mode: high clamp (0-255)
        #[arg(long, default_value_t = 255.0)]
        high: f64,

        /// Custom mode: gamma
        #[arg(long, default_value_t = 1.0)]
        gamma: f64,

        /// Rotate mode: angle in degrees, positive is clockwise
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        angle: f64,

        /// Rotate mode: keep the full rotated canvas instead of cropping
        #[arg(long)]
        no_crop: bool,

        /// Write here instead of the selection folder
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the brightness histogram of an image
    Histogram {
        /// Source image
        file: PathBuf,

        /// Number of rows to fold the 256 bins into
        #[arg(long, default_value_t = 32)]
        rows: usize,
    },
    /// Walk a folder the way the viewer does, precomputing as it goes
    Preview {
        /// Folder to walk
        dir: PathBuf,

        /// Save both white balance variants of every image
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Original,
    WbValue,
    WbRgb,
    Custom,
    Rotate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "pickture=debug"
    } else {
        "pickture=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = pickture_core::EngineConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Scan { dir } => commands::run_scan(&dir),
        Commands::Process {
            file,
            mode,
            low,
            high,
            gamma,
            angle,
            no_crop,
            output,
        } => {
            let kind = commands::transform_kind(mode, low, high, gamma, angle, no_crop)?;
            commands::run_process(&config, &file, kind, output.as_deref())
        }
        Commands::Histogram { file, rows } => commands::run_histogram(&file, rows),
        Commands::Preview { dir, save } => commands::run_preview(&config, &dir, save),
    }
}
