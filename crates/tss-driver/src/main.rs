//! tss-driver: concurrent workers against one shared stack.
//!
//! # Usage
//!
//! ```bash
//! tss-driver --workers 200 --iterations 500 --log-path output.txt
//! TSS_WORKERS=8 RUST_LOG=debug tss-driver --json
//! ```
//!
//! Exits 0 on completion and 1 if the configuration is invalid, the log
//! file cannot be opened or no worker could be spawned.

use std::process;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tss_driver::{Cli, DriverConfig};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not failures.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = DriverConfig::from(cli);
    let summary = tss_driver::run(&config)
        .with_context(|| format!("run with {} workers failed", config.workers))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("failed to encode summary")?;
        println!("{}", json);
    } else {
        println!("{}", summary);
    }
    Ok(())
}
