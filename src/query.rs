use std::sync::Arc;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::QueryConfig;
use crate::error::{LoadGenError, Result};
use crate::stats::WorkloadStats;

/// Immutable query-shape parameters shared by every worker.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub freshness_secs: i64,
    pub time_range_secs: i64,
    pub sum_window_secs: i64,
    /// Human-readable sum window (e.g. `1m`) spliced into the PromQL template.
    pub sum_window_label: String,
    pub instances: Vec<u32>,
}

/// One sampled aggregation query: a random instance over a random window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub instance: u32,
    pub start: i64,
    pub end: i64,
    pub step: i64,
}

impl QueryPlan {
    /// Draws the next query. The end boundary falls within the freshness
    /// horizon of `now_secs` and is floored to a sum-window multiple; the
    /// step equals the sum window.
    pub fn sample(&self, now_secs: i64, rng: &mut impl Rng) -> QueryDescriptor {
        let mut end = now_secs - rng.gen_range(0..self.freshness_secs);
        end -= end % self.sum_window_secs;
        let instance = self.instances[rng.gen_range(0..self.instances.len())];
        QueryDescriptor {
            instance,
            start: end - self.time_range_secs,
            end,
            step: self.sum_window_secs,
        }
    }

    /// Renders the fixed aggregation template for one instance: top-5 cpu
    /// time summed per window, joined back to the digest's SQL text.
    pub fn promql(&self, instance: u32) -> String {
        format!(
            "sum(label_replace(topk(5, sum_over_time(cpu_time{{instance=\"tikv-{instance}\"}}[{window}])), \
             \"digest\", \"$1\", \"tag\", \"(.*)\") * on(digest) group_left(sql) sql_digest{{}}) by (instance, sql)",
            window = self.sum_window_label,
        )
    }
}

/// Spawns the configured number of independent query workers and waits on
/// them. One failing worker is fatal for the whole run; absent failures and
/// cancellation the workers never terminate.
pub async fn run(
    cfg: QueryConfig,
    stats: Arc<WorkloadStats>,
    shutdown: CancellationToken,
) -> Result<()> {
    let client = reqwest::Client::new();
    let plan = Arc::new(cfg.plan);

    info!(
        workers = cfg.worker_count,
        instances = plan.instances.len(),
        "starting query workload against {}",
        cfg.url
    );

    let base_seed: u64 = rand::random();
    let mut workers = JoinSet::new();
    for worker_id in 0..cfg.worker_count {
        // Mix the base seed with the worker id for independent per-worker RNGs.
        let seed = base_seed ^ (worker_id as u64).wrapping_mul(0x9e3779b97f4a7c15);
        workers.spawn(run_worker(
            client.clone(),
            cfg.url.clone(),
            plan.clone(),
            stats.clone(),
            shutdown.clone(),
            seed,
        ));
    }

    while let Some(joined) = workers.join_next().await {
        joined.map_err(|err| LoadGenError::Transport(format!("query worker panicked: {err}")))??;
    }
    Ok(())
}

async fn run_worker(
    client: reqwest::Client,
    url: String,
    plan: Arc<QueryPlan>,
    stats: Arc<WorkloadStats>,
    shutdown: CancellationToken,
    seed: u64,
) -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(seed);

    while !shutdown.is_cancelled() {
        let now = chrono::Utc::now().timestamp();
        let query = plan.sample(now, &mut rng);
        let promql = plan.promql(query.instance);
        let start = query.start.to_string();
        let end = query.end.to_string();
        let step = query.step.to_string();

        let started = Instant::now();
        let response = client
            .get(&url)
            .query(&[
                ("query", promql.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("step", step.as_str()),
            ])
            .send()
            .await?;
        // Read and discard the full body; the request only exists to load the
        // backend. Dropping the bytes releases the connection.
        response.bytes().await?;

        stats.record_latency(started.elapsed());
        stats.add_completed(1);
    }

    Ok(())
}
