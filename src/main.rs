use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use order_dispatch::sim::{self, BenchParams};
use order_dispatch::{DispatchConfig, logging};

/// Simulate priority order dispatch to a pool of workers.
#[derive(Parser, Debug)]
#[command(name = "order_dispatch", about = "Priority order dispatch simulator")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Default worker processing time in milliseconds (overrides the config file)
    #[arg(long, global = true)]
    processing_ms: Option<u64>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scripted scenario in virtual time (default)
    Demo,
    /// Single benchmark run, CSV output
    Bench {
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long, default_value_t = 100)]
        items: usize,
        #[arg(long, default_value_t = 20)]
        vip_percent: u8,
        /// Remove a busy worker mid-run and replace it
        #[arg(long)]
        churn: bool,
        /// Enable extra safety checks
        #[arg(long)]
        validate: bool,
    },
    /// Sweep of benchmark runs, CSV output
    Stress {
        #[arg(long, value_delimiter = ',', default_values_t = vec![1, 2, 4, 8, 12])]
        worker_sets: Vec<usize>,
        #[arg(long, value_delimiter = ',', default_values_t = vec![10, 100, 1000])]
        item_sets: Vec<usize>,
        #[arg(long, default_value_t = 20)]
        vip_percent: u8,
        #[arg(long)]
        churn: bool,
        #[arg(long)]
        validate: bool,
    },
    /// Run the threaded dispatcher against the wall clock
    Live {
        #[arg(long, default_value_t = 2)]
        workers: usize,
        #[arg(long, default_value_t = 6)]
        items: usize,
        #[arg(long, default_value_t = 30)]
        vip_percent: u8,
        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,
        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<DispatchConfig> {
    let mut config = match &cli.config {
        Some(path) => DispatchConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DispatchConfig::default(),
    };
    if let Some(processing_ms) = cli.processing_ms {
        config.processing_ms = processing_ms;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Demo) {
        Command::Demo => sim::run_demo(&config)?,
        Command::Bench {
            workers,
            items,
            vip_percent,
            churn,
            validate,
        } => {
            let params = BenchParams {
                workers,
                items,
                vip_percent,
                churn,
                validate,
            };
            sim::run_benchmark(&config, &params)?;
        }
        Command::Stress {
            worker_sets,
            item_sets,
            vip_percent,
            churn,
            validate,
        } => sim::run_stress(&config, &worker_sets, &item_sets, vip_percent, churn, validate)?,
        Command::Live {
            workers,
            items,
            vip_percent,
            seconds,
            json,
        } => sim::run_live(
            &config,
            workers,
            items,
            vip_percent,
            Duration::from_secs(seconds),
            json,
        )?,
    }
    Ok(())
}
