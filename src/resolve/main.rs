//! One-shot address resolution from the command line.
//!
//! Resolves the addresses given as arguments, or one address per line of
//! stdin, against a CSV of address ranges.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cypress_geoip::geoip::{GeoIpService, NoMetrics};
use cypress_geoip::loader::Config;

#[derive(Parser, Debug)]
#[command(name = "resolve")]
#[command(about = "Resolve IPv4 addresses to coordinates")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSV file of address ranges (overrides config)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Addresses to resolve; read from stdin when empty
    addresses: Vec<String>,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    let path = args
        .file
        .clone()
        .or_else(|| config.source.path.clone())
        .context("No range file given (use --file or [source].path)")?;

    let service = GeoIpService::new(config.loader_config()?, Arc::new(NoMetrics));
    service
        .load_path(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let addresses: Vec<String> = if args.addresses.is_empty() {
        io::stdin()
            .lock()
            .lines()
            .map(|line| line.map(|l| l.trim().to_string()))
            .filter(|line| !matches!(line, Ok(l) if l.is_empty()))
            .collect::<io::Result<_>>()
            .context("Failed to read addresses from stdin")?
    } else {
        args.addresses
    };

    let mut failed = 0;
    for address in &addresses {
        match service.lookup(address) {
            Ok(coord) => println!("{}\t{}\t{}", address, coord.latitude, coord.longitude),
            Err(e) => {
                eprintln!("{}\t{}", address, e);
                failed += 1;
            }
        }
    }

    info!("Resolved {} of {} addresses", addresses.len() - failed, addresses.len());

    if failed > 0 {
        anyhow::bail!("{} of {} lookups failed", failed, addresses.len());
    }

    Ok(())
}
