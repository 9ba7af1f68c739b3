//! CLI entry point for the ZIP-level commute dataset pipeline.
//!
//! Provides one subcommand per pipeline stage plus `run`, which executes
//! them all in order: crosswalk, ACS commute and income fetches, station
//! geolocation, assembly, cleaning and analysis.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use zcta_commute::config::{API_KEY_ENV, ApiKey, PipelineConfig};
use zcta_commute::crosswalk::write_zip_universe;
use zcta_commute::fetch::{BasicClient, auth::UrlParam};
use zcta_commute::output::print_json;
use zcta_commute::pipeline;

#[derive(Parser)]
#[command(name = "zcta_commute")]
#[command(
    about = "Builds a ZIP-level dataset of commute time, income and transit access",
    long_about = None
)]
struct Cli {
    /// TOML file overriding the built-in configuration
    #[arg(short, long, global = true, env = "ZCTA_COMMUTE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the ZIP codes of the target county from the crosswalk
    Zips {
        /// Optional CSV to write the ZIP universe to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch mean commute time per ZIP from the ACS
    Commute,
    /// Fetch median household income per ZIP from the ACS
    Income,
    /// Locate transit stations in ZIP polygons and export the station list
    Stations,
    /// Merge the ZIP universe, station counts and ACS tables
    Build,
    /// Clean the merged dataset into a new file
    Clean,
    /// Describe the cleaned dataset and fit the regression
    Analyze,
    /// Run every stage in order
    Run,
}

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/zcta_commute.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"))
        .to_path_buf();
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("zcta_commute.log"))
        .to_os_string();

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _log_guard = init_tracing();

    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    let api_key = ApiKey::from_env();
    if api_key.is_none() {
        warn!(var = API_KEY_ENV, "No Census API key set, requests are rate limited");
    }
    // Only ACS queries carry the key; the crosswalk host does not need it.
    let download = BasicClient::new();
    let acs = UrlParam::census(BasicClient::new(), api_key);

    match cli.command {
        Commands::Zips { output } => {
            let zips = pipeline::zip_universe(&download, &config)
                .await
                .context("failed to load ZIP universe")?;
            if let Some(path) = output {
                write_zip_universe(&path, &zips)?;
                info!(path = %path.display(), "ZIP universe written");
            }
        }
        Commands::Commute => {
            let zips = pipeline::zip_universe(&download, &config)
                .await
                .context("failed to load ZIP universe")?;
            pipeline::fetch_and_write(
                &acs,
                &config,
                &pipeline::commute_source(&config),
                &zips,
                &config.commute_csv,
            )
            .await
            .context("failed to write commute data")?;
        }
        Commands::Income => {
            let zips = pipeline::zip_universe(&download, &config)
                .await
                .context("failed to load ZIP universe")?;
            pipeline::fetch_and_write(
                &acs,
                &config,
                &pipeline::income_source(&config),
                &zips,
                &config.income_csv,
            )
            .await
            .context("failed to write income data")?;
        }
        Commands::Stations => {
            let located =
                pipeline::locate_stations(&config).context("failed to geolocate stations")?;
            for (zip, count) in &located.counts {
                info!(zip = %zip, count, "Stations in ZIP");
            }
        }
        Commands::Build => {
            let zips = pipeline::zip_universe(&download, &config)
                .await
                .context("failed to load ZIP universe")?;
            let located =
                pipeline::locate_stations(&config).context("failed to geolocate stations")?;
            pipeline::build(&config, &zips, &located.counts)
                .context("failed to build final dataset")?;
        }
        Commands::Clean => {
            pipeline::clean(&config).context("failed to clean final dataset")?;
        }
        Commands::Analyze => {
            let summary =
                pipeline::analyze(&config).context("failed to analyze cleaned dataset")?;
            print_json(&summary)?;
        }
        Commands::Run => {
            info!("Starting full pipeline");
            pipeline::run_all(&download, &acs, &config)
                .await
                .context("pipeline run failed")?;
            info!(summary = %config.summary_json.display(), "Pipeline finished");
        }
    }

    Ok(())
}
