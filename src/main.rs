//! CLI entry point for vidgrab.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::parser::ValueSource;
use clap::{CommandFactory, FromArgMatches};
use tracing::{debug, info};
use vidgrab_core::{CdpConnector, FileConfig, Identifier, Pipeline, PipelineConfig};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let control_url_from_cli = matches.value_source("control_url") == Some(ValueSource::CommandLine);

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let mut config = PipelineConfig::default();
    if let Some(file_config) = FileConfig::load_optional(args.config.as_deref())
        .context("Failed to load configuration")?
    {
        file_config.apply_to(&mut config);
    }
    args.apply_to(&mut config, control_url_from_cli);

    let Some(identifier) = Identifier::parse(&args.identifier) else {
        bail!("identifier must not be empty");
    };

    info!(
        identifier = %identifier,
        mode = ?args.mode,
        output_dir = %config.output_dir.display(),
        "vidgrab starting"
    );

    let connector = Arc::new(CdpConnector::default());
    let pipeline = Pipeline::new(config, connector)?;
    let summary = pipeline.run(args.mode.into(), &identifier).await?;

    debug!(
        completed = summary.completed,
        failed = summary.failed,
        abandoned = summary.abandoned,
        "run finished"
    );

    Ok(())
}
