//! Driver configuration: flags with environment fallbacks.

use std::path::PathBuf;

use clap::Parser;

/// Default number of worker threads.
pub const WORKERS_DEFAULT: u32 = 200;

/// Default number of script iterations per worker.
pub const ITERATIONS_DEFAULT: u32 = 500;

/// Default audit log path.
pub const LOG_PATH_DEFAULT: &str = "output.txt";

/// Exercise the thread-safe stack with concurrent workers.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "tss-driver")]
#[command(about = "Concurrent workers pushing and popping one shared stack")]
#[command(version)]
pub struct Cli {
    /// Number of worker threads.
    #[arg(
        long,
        env = "TSS_WORKERS",
        default_value_t = WORKERS_DEFAULT,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub workers: u32,

    /// Script iterations per worker (push, push, pop, push, pop).
    #[arg(
        long,
        env = "TSS_ITERATIONS",
        default_value_t = ITERATIONS_DEFAULT,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub iterations: u32,

    /// Audit log file. Truncated at the start of the run.
    #[arg(long, env = "TSS_LOG_PATH", default_value = LOG_PATH_DEFAULT)]
    pub log_path: PathBuf,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub workers: u32,
    pub iterations: u32,
    pub log_path: PathBuf,
}

impl From<&Cli> for DriverConfig {
    fn from(cli: &Cli) -> Self {
        debug_assert!(cli.workers >= 1 && cli.iterations >= 1);
        Self {
            workers: cli.workers,
            iterations: cli.iterations,
            log_path: cli.log_path.clone(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: WORKERS_DEFAULT,
            iterations: ITERATIONS_DEFAULT,
            log_path: PathBuf::from(LOG_PATH_DEFAULT),
        }
    }
}

impl DriverConfig {
    /// Pushes a full run performs when every worker spawns.
    pub fn expected_pushes(&self) -> u64 {
        3 * u64::from(self.workers) * u64::from(self.iterations)
    }

    /// Pops a full run performs when every worker spawns.
    pub fn expected_pops(&self) -> u64 {
        2 * u64::from(self.workers) * u64::from(self.iterations)
    }
}
