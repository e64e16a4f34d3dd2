//! CLI entry point for the site mirror.

use anyhow::{Context, Result};
use clap::Parser;
use site_mirror::{Mirror, MirrorConfig};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

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

    let base = match &args.config {
        Some(path) => MirrorConfig::load(path)?,
        None => MirrorConfig::default(),
    };
    let mirror = Mirror::with_http(base.apply_overrides(args.overrides()))?;

    let config = mirror.config();
    info!(
        site = %config.site_url,
        output = %config.save_dir.display(),
        concurrency = config.concurrency,
        "Site mirror starting"
    );

    let summary = mirror.run().await.context("mirror aborted")?;
    debug!(total = summary.total(), "exiting");

    Ok(())
}
