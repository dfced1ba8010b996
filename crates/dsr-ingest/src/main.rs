//! dsr-refresh - run one metadata refresh and exit

use anyhow::Result;
use clap::Parser;
use dsr_common::logging::{init_logging, LogConfig, LogLevel};
use dsr_ingest::{bootstrap, config::Config};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "dsr-refresh")]
#[command(author, version, about = "Rebuild the data source metadata table from the bucket")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Maximum documents fetched at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-document fetch deadline in seconds (0 disables it)
    #[arg(long)]
    fetch_timeout_secs: Option<u64>,

    /// Whole-run deadline in seconds (0 disables it)
    #[arg(long)]
    run_timeout_secs: Option<u64>,

    /// Only treat keys under this prefix as metadata documents
    #[arg(long)]
    prefix: Option<String>,
}

impl Cli {
    /// Flags win over the environment
    fn apply(&self, config: &mut Config) {
        if let Some(concurrency) = self.concurrency {
            config.pipeline.fetch_concurrency = concurrency;
        }
        if let Some(secs) = self.fetch_timeout_secs {
            config.pipeline.fetch_timeout_secs = secs;
        }
        if let Some(secs) = self.run_timeout_secs {
            config.pipeline.run_timeout_secs = secs;
        }
        if let Some(prefix) = &self.prefix {
            config.storage.prefix = Some(prefix.clone());
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("dsr-refresh")
        .build();

    let _guard = match log_config
        .with_env_overrides()
        .and_then(|config| init_logging(&config))
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "dsr-refresh failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> Result<()> {
    dotenvy::dotenv().ok();
    let mut config = Config::from_env();
    cli.apply(&mut config);
    config.validate()?;

    info!(bucket = %config.storage.bucket, "Starting metadata refresh");

    let pipeline = bootstrap::build_pipeline(&config).await?;
    let report = pipeline.run().await?;

    info!(
        run_id = %report.run_id,
        loaded = report.loaded,
        "Metadata refresh complete"
    );
    Ok(())
}
