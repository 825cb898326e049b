use std::sync::Arc;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::stats::WorkloadStats;

const REPORT_PERIOD: Duration = Duration::from_secs(5);

/// What the periodic report line describes.
#[derive(Debug, Clone, Copy)]
pub enum ReportMode {
    Ingest,
    Query,
}

/// Delta-based rate in operations per second. The elapsed denominator is
/// clamped to one millisecond so a fast tick can never divide by zero.
pub fn throughput(delta: u64, elapsed: Duration) -> f64 {
    delta as f64 / elapsed.as_secs_f64().max(0.001)
}

/// Percentiles and mean in milliseconds from a histogram recorded in
/// microseconds.
pub fn latency_millis(hist: &Histogram<u64>) -> (f64, f64, f64) {
    (
        hist.value_at_quantile(0.5) as f64 / 1000.0,
        hist.value_at_quantile(0.99) as f64 / 1000.0,
        hist.mean() / 1000.0,
    )
}

/// Background loop logging throughput every five seconds until cancelled.
/// Query mode additionally reports per-window latency percentiles from the
/// exported-and-reset histogram. Window boundaries advance even when nothing
/// completed, so an idle window reports a rate of zero.
pub async fn run_reporter(stats: Arc<WorkloadStats>, mode: ReportMode, shutdown: CancellationToken) {
    let mut prev_count = stats.completed();
    let mut prev_at = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(REPORT_PERIOD) => {}
            _ = shutdown.cancelled() => return,
        }

        let count = stats.completed();
        let now = Instant::now();
        let rate = throughput(count - prev_count, now - prev_at);
        prev_count = count;
        prev_at = now;

        match mode {
            ReportMode::Ingest => info!("Load rate: {rate:.0} records/s"),
            ReportMode::Query => match stats.take_latency() {
                Some(hist) => {
                    // The lock was released inside take_latency; percentile
                    // math happens on the exported snapshot.
                    let (p50, p99, mean) = latency_millis(&hist);
                    info!(
                        "Query rate: {rate:.0} queries/s, p50 {p50:.2}ms, p99 {p99:.2}ms, mean {mean:.2}ms"
                    );
                }
                None => info!("Query rate: {rate:.0} queries/s"),
            },
        }
    }
}
