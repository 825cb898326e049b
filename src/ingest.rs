use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::batch::build_batch;
use crate::config::LoadConfig;
use crate::error::Result;
use crate::stats::WorkloadStats;
use crate::tags::TagSet;

/// Emits reporting timestamps strictly increasing by one simulated minute,
/// anchored at the configured begin timestamp.
#[derive(Debug)]
pub struct MinutePacer {
    report_ts: i64,
}

impl MinutePacer {
    pub fn new(begin_ts: i64) -> Self {
        Self {
            report_ts: begin_ts,
        }
    }

    /// The minute boundary the next batch covers.
    pub fn current(&self) -> i64 {
        self.report_ts
    }

    /// Advances to the next minute. Boundaries are never skipped or repeated,
    /// however long the previous send took.
    pub fn advance(&mut self) {
        self.report_ts += 60;
    }
}

/// Runs the generation/ingestion loop until the token is cancelled, which in
/// normal operation never happens. Any transport or encoding failure is
/// returned to the caller, which treats it as fatal.
pub async fn run(
    cfg: LoadConfig,
    stats: Arc<WorkloadStats>,
    shutdown: CancellationToken,
) -> Result<()> {
    let client = reqwest::Client::new();
    let mut tags = TagSet::new(cfg.tag_count, cfg.refresh_interval_secs);
    let mut pacer = MinutePacer::new(cfg.begin_ts);
    let mut rng = SmallRng::from_entropy();

    info!(
        begin_ts = cfg.begin_ts,
        tag_count = cfg.tag_count,
        instance_count = cfg.instance_count,
        gzip = cfg.gzip,
        "starting ingestion against {}",
        cfg.url
    );

    while !shutdown.is_cancelled() {
        let report_ts = pacer.current();
        let now = chrono::Utc::now().timestamp();
        if report_ts > now {
            // Running ahead of real time: wait for the minute boundary. A slow
            // send is deliberately not compensated for; the pacer falls behind
            // real time rather than skip a batch.
            sleep(Duration::from_secs((report_ts - now) as u64)).await;
        }

        tags.refresh(report_ts);
        let body = build_batch(
            report_ts,
            &tags,
            cfg.instance_count,
            cfg.gzip,
            &stats,
            &mut rng,
        )?;

        let mut request = client.post(&cfg.url).header(CONTENT_TYPE, "application/json");
        if cfg.gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        let response = request.body(body).send().await?;
        debug!(report_ts, status = %response.status(), "batch sent");
        // The response content is unused; dropping it releases the connection.
        drop(response);

        pacer.advance();
    }

    Ok(())
}
