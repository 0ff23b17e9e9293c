//! # Encore Bench CLI
//!
//! Load-testing and correctness-verification harness for the ticket
//! reservation service.
//!
//! ```bash
//! # Full run against one target
//! encore-bench --data ./data --remotes 10.0.0.10:8080 --duration 60
//!
//! # Deployment smoke test (preflight only)
//! encore-bench --remotes 10.0.0.10:8080 --test
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use encore_bench::{RunOptions, Runner, World};
use encore_core::{dataset, store::Store};

#[derive(Parser)]
#[command(name = "encore-bench")]
#[command(version)]
#[command(about = "Load-testing and verification harness for the ticket reservation service", long_about = None)]
struct Cli {
    /// Path to the fixture data directory
    #[arg(long, default_value = "./data")]
    data: PathBuf,

    /// Comma-separated target hosts to benchmark
    #[arg(long, default_value = "localhost:8080")]
    remotes: String,

    /// Benchmark duration in seconds
    #[arg(short, long, default_value = "60")]
    duration: u64,

    /// Write the result JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Job id copied into the result
    #[arg(long)]
    jobid: Option<String>,

    /// Run the pre-load validation only
    #[arg(long)]
    test: bool,

    /// Keep the load level flat
    #[arg(long)]
    nolevelup: bool,

    /// Attach shadow-identity debug headers to every request
    #[arg(long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let targets: Vec<String> = cli
        .remotes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if targets.is_empty() {
        eprintln!("error: --remotes must name at least one host");
        std::process::exit(2);
    }
    info!(?targets, "targets");

    let dataset = match dataset::load(&cli.data) {
        Ok(dataset) => dataset,
        Err(e) => {
            eprintln!("error: failed to load the fixture dataset: {e}");
            std::process::exit(2);
        }
    };
    let store = Store::new(dataset);
    let world = World::new(store, targets, cli.debug);

    let runner = Runner::new(
        world,
        RunOptions {
            duration: Duration::from_secs(cli.duration),
            pretest_only: cli.test,
            no_level_up: cli.nolevelup,
        },
    );

    let mut result = runner.run().await;
    result.job_id = cli.jobid;
    result.ip_addrs = Some(cli.remotes);

    let json = serde_json::to_string_pretty(&result).expect("the result serializes");
    println!("{json}");

    if let Some(path) = cli.output {
        if let Err(e) = std::fs::write(&path, &json) {
            eprintln!("error: failed to write {}: {e}", path.display());
            std::process::exit(2);
        }
        info!(path = %path.display(), "result saved");
    }

    std::process::exit(if result.pass { 0 } else { 1 });
}
