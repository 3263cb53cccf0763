//! greenroute: recommend a low-carbon cloud region for a workload.
//!
//! # Usage
//!
//! ```text
//! greenroute recommend --lat 51.5074 --lon -0.1278 -c compute -c "rds aurora"
//! greenroute nearby --lat 51.5074 --lon -0.1278 --max-distance 1500
//! greenroute regions --format json
//! ```
//!
//! Results go to stdout; logs go to stderr (`RUST_LOG` overrides the
//! default `greenroute=info` filter).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod report;
mod setup;

#[derive(Parser)]
#[command(
    name = "greenroute",
    about = "Recommend a cloud region by proximity, capabilities and carbon intensity",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to greenroute.toml (default: ./greenroute.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank regions for a workload.
    ///
    /// Regions farther than --max-distance are dropped, then regions
    /// missing any --capability, then regions without an intensity
    /// reading. The rest are ranked by weighted carbon intensity.
    Recommend {
        /// User latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// User longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Maximum distance in km (default from [engine] config)
        #[arg(long)]
        max_distance: Option<f64>,
        /// Required capability; repeatable
        #[arg(short, long = "capability")]
        capabilities: Vec<String>,
        /// Restrict to this region code; repeatable
        #[arg(short, long = "region")]
        regions: Vec<String>,
        /// Market-based weight in [0, 1] (default from [scoring] config)
        #[arg(long)]
        weight_market: Option<f64>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List catalog regions near a location, nearest first.
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Maximum distance in km (default from [engine] config)
        #[arg(long)]
        max_distance: Option<f64>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List every region in the catalog.
    Regions {
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("greenroute=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = setup::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Recommend {
            lat,
            lon,
            max_distance,
            capabilities,
            regions,
            weight_market,
            format,
        } => {
            let args = commands::recommend::RecommendArgs {
                lat,
                lon,
                max_distance,
                capabilities,
                regions,
                weight_market,
            };
            commands::recommend::run(&config, args, format).await
        }
        Commands::Nearby {
            lat,
            lon,
            max_distance,
            format,
        } => commands::nearby::run(&config, lat, lon, max_distance, format).await,
        Commands::Regions { format } => commands::regions::run(&config, format).await,
    }
}
