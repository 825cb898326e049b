use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use tsdb_loadgen::{
    config::{Cli, Command},
    ingest, logging, query,
    report::{self, ReportMode},
    stats::WorkloadStats,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging();

    // Never cancelled in normal operation; the workload runs until the
    // process is killed.
    let shutdown = CancellationToken::new();

    let result = match cli.cmd {
        Command::Load(args) => match args.resolve() {
            Ok(cfg) => {
                let stats = Arc::new(WorkloadStats::new());
                tokio::spawn(report::run_reporter(
                    stats.clone(),
                    ReportMode::Ingest,
                    shutdown.clone(),
                ));
                ingest::run(cfg, stats, shutdown).await
            }
            Err(err) => Err(err),
        },
        Command::Query(args) => match args.resolve() {
            Ok(cfg) => {
                let stats = Arc::new(WorkloadStats::with_latency());
                tokio::spawn(report::run_reporter(
                    stats.clone(),
                    ReportMode::Query,
                    shutdown.clone(),
                ));
                query::run(cfg, stats, shutdown).await
            }
            Err(err) => Err(err),
        },
    };

    if let Err(err) = result {
        error!("fatal: {err}");
        std::process::exit(1);
    }
}
