//! Ecodata Fetch - dataset acquisition tool

use anyhow::Result;
use clap::Parser;
use ecodata_common::logging::{init_logging, LogConfig, LogLevel};
use ecodata_fetch::pipeline::{Pipeline, PipelineConfig};
use ecodata_fetch::source;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ecodata-fetch")]
#[command(author, version, about = "Fetches the knowledge-graph input datasets")]
struct Cli {
    /// Sources to fetch, by name (default: the whole catalog)
    sources: Vec<String>,

    /// Destination root directory (one subdirectory per source)
    #[arg(short, long, default_value = "./data", env = "ECODATA_DATA_DIR")]
    data_dir: PathBuf,

    /// Maximum number of sources processed concurrently
    #[arg(short, long, default_value_t = 2)]
    jobs: usize,

    /// Network timeout in seconds
    #[arg(long, default_value_t = 600)]
    timeout: u64,

    /// Download attempts per source
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// List known sources and exit
    #[arg(long)]
    list: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Environment variables configure logging unless --verbose overrides
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .log_file_prefix("ecodata-fetch".to_string())
            .build()
    } else {
        LogConfig::from_env()?
    };
    init_logging(&log_config)?;

    if cli.list {
        for descriptor in source::catalog() {
            println!(
                "{:<20} {:<20} {}",
                descriptor.name,
                descriptor.archive.to_string(),
                descriptor.url
            );
        }
        return Ok(());
    }

    let sources = source::select(&cli.sources)?;
    info!("Acquiring {} source(s) into {}", sources.len(), cli.data_dir.display());

    let config = PipelineConfig::new(cli.data_dir)
        .jobs(cli.jobs)
        .timeout(Duration::from_secs(cli.timeout))
        .max_retries(cli.retries);

    let report = Pipeline::new(config)?.run(sources).await;
    report.log_summary();

    std::process::exit(report.exit_code());
}
