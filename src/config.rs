use clap::{Args, Parser, Subcommand};

use crate::error::{LoadGenError, Result};
use crate::query::QueryPlan;

#[derive(Parser, Debug)]
#[command(
    name = "tsdb-loadgen",
    about = "Synthetic load generator for a time-series metrics backend"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate and ingest synthetic metric batches, one per simulated minute
    Load(LoadArgs),
    /// Run concurrent aggregation queries and report latency statistics
    Query(QueryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Begin unix timestamp in seconds. An early value backfills historical
    /// minutes as fast as the backend accepts them; a recent value paces one
    /// batch per wall-clock minute. Defaults to process start.
    #[arg(long)]
    pub begin_ts: Option<i64>,

    /// Number of tags (distinct series) per batch
    #[arg(long, default_value_t = 200)]
    pub tag_count: usize,

    /// Number of instances each tag reports cpu time for
    #[arg(long, default_value_t = 1000)]
    pub instance_count: u32,

    /// Interval between tag-set refreshes; zero regenerates tags every batch
    #[arg(long, default_value = "0s")]
    pub update_tag_interval: humantime::Duration,

    /// Import endpoint of the target backend
    #[arg(long, default_value = "http://localhost:8428/api/v1/import")]
    pub url: String,

    /// Compress import request bodies with gzip
    #[arg(long)]
    pub gzip: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Number of concurrent query workers
    #[arg(long, default_value_t = 1)]
    pub worker_count: usize,

    /// Freshness horizon: maximum age between now and a query's end time
    #[arg(long, default_value = "1h")]
    pub freshness: humantime::Duration,

    /// Time range covered by each query
    #[arg(long, default_value = "5m")]
    pub time_range: humantime::Duration,

    /// Window to sum datapoints over; also the query step
    #[arg(long, default_value = "1m")]
    pub sum_window: String,

    /// Explicit instance indices as inclusive ranges, e.g. `0-2,4-5`
    #[arg(long, conflicts_with = "instance_count")]
    pub instance_set: Option<String>,

    /// Pick instances uniformly from `[0, n)` instead of an explicit set
    #[arg(long)]
    pub instance_count: Option<u32>,

    /// Query endpoint of the target backend
    #[arg(long, default_value = "http://localhost:8428/api/v1/query_range")]
    pub url: String,
}

/// Resolved ingestion-mode configuration.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub begin_ts: i64,
    pub tag_count: usize,
    pub instance_count: u32,
    pub refresh_interval_secs: i64,
    pub url: String,
    pub gzip: bool,
}

/// Resolved query-mode configuration.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub worker_count: usize,
    pub url: String,
    pub plan: QueryPlan,
}

impl LoadArgs {
    /// Validates and resolves the arguments once at startup.
    pub fn resolve(&self) -> Result<LoadConfig> {
        if self.tag_count == 0 {
            return Err(LoadGenError::Config("--tag-count must be > 0".to_string()));
        }
        Ok(LoadConfig {
            begin_ts: self
                .begin_ts
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            tag_count: self.tag_count,
            instance_count: self.instance_count,
            refresh_interval_secs: duration_secs(self.update_tag_interval),
            url: self.url.clone(),
            gzip: self.gzip,
        })
    }
}

impl QueryArgs {
    /// Validates and resolves the arguments once at startup.
    pub fn resolve(&self) -> Result<QueryConfig> {
        if self.worker_count == 0 {
            return Err(LoadGenError::Config(
                "--worker-count must be > 0".to_string(),
            ));
        }
        let freshness_secs = duration_secs(self.freshness);
        if freshness_secs == 0 {
            return Err(LoadGenError::Config("--freshness must be > 0".to_string()));
        }
        let sum_window_secs = parse_duration_secs(&self.sum_window)?;
        if sum_window_secs == 0 {
            return Err(LoadGenError::Config("--sum-window must be > 0".to_string()));
        }

        let instances = match (&self.instance_set, self.instance_count) {
            (Some(expr), _) => parse_instance_set(expr)?,
            (None, Some(count)) if count > 0 => (0..count).collect(),
            (None, Some(_)) => {
                return Err(LoadGenError::Config(
                    "--instance-count must be > 0".to_string(),
                ))
            }
            (None, None) => {
                return Err(LoadGenError::Config(
                    "one of --instance-set or --instance-count is required".to_string(),
                ))
            }
        };

        Ok(QueryConfig {
            worker_count: self.worker_count,
            url: self.url.clone(),
            plan: QueryPlan {
                freshness_secs,
                time_range_secs: duration_secs(self.time_range),
                sum_window_secs,
                // The duration string goes into the PromQL range selector as
                // the user wrote it; a re-render through humantime would
                // insert spaces for compound durations ("1m 30s") and corrupt
                // the selector. Whitespace is stripped for the quoted case.
                sum_window_label: self.sum_window.replace(' ', ""),
                instances,
            },
        })
    }
}

/// Converts a parsed human-readable duration to whole seconds.
pub fn duration_secs(d: humantime::Duration) -> i64 {
    d.as_secs() as i64
}

/// Resolves a human-readable duration string to whole seconds.
pub fn parse_duration_secs(s: &str) -> Result<i64> {
    let d = humantime::parse_duration(s)
        .map_err(|err| LoadGenError::Config(format!("invalid duration {s:?}: {err}")))?;
    Ok(d.as_secs() as i64)
}

/// Resolves a range expression such as `0-2,4-5` into an explicit ordered
/// index list. A token is either a bare index or an inclusive `low-high`
/// range with `low < high`; duplicates are not removed.
pub fn parse_instance_set(expr: &str) -> Result<Vec<u32>> {
    if expr.trim().is_empty() {
        return Err(LoadGenError::Config(
            "instance set expression is empty".to_string(),
        ));
    }

    let mut indices = Vec::new();
    for token in expr.split(',') {
        let token = token.trim();
        match token.split_once('-') {
            None => {
                let index: u32 = token.parse().map_err(|_| {
                    LoadGenError::Config(format!("invalid instance index {token:?}"))
                })?;
                indices.push(index);
            }
            Some((low, high)) => {
                let low: u32 = low.parse().map_err(|_| {
                    LoadGenError::Config(format!("invalid instance range {token:?}"))
                })?;
                let high: u32 = high.parse().map_err(|_| {
                    LoadGenError::Config(format!("invalid instance range {token:?}"))
                })?;
                if low >= high {
                    return Err(LoadGenError::Config(format!(
                        "invalid instance range {token:?}: bounds must satisfy low < high"
                    )));
                }
                indices.extend(low..=high);
            }
        }
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> humantime::Duration {
        s.parse().expect("valid duration")
    }

    #[test]
    fn test_duration_resolution() {
        assert_eq!(duration_secs(parse("1m")), 60);
        assert_eq!(duration_secs(parse("5m")), 300);
        assert_eq!(duration_secs(parse("1h")), 3600);
        assert_eq!(parse_duration_secs("1m").unwrap(), 60);
        assert_eq!(parse_duration_secs("90s").unwrap(), 90);
        assert_eq!(parse_duration_secs("1m 30s").unwrap(), 90);
        assert!(parse_duration_secs("1x").is_err());
        assert!("1x".parse::<humantime::Duration>().is_err());
    }

    #[test]
    fn test_instance_set_resolution() {
        assert_eq!(parse_instance_set("0-2,4-5").unwrap(), vec![0, 1, 2, 4, 5]);
        assert_eq!(parse_instance_set("0-1").unwrap(), vec![0, 1]);
        assert_eq!(parse_instance_set("7").unwrap(), vec![7]);
        assert_eq!(parse_instance_set("1,2").unwrap(), vec![1, 2]);
        assert_eq!(parse_instance_set("0-2,4").unwrap(), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_instance_set_rejects_bad_input() {
        assert!(parse_instance_set("").is_err());
        assert!(parse_instance_set("3-3").is_err());
        assert!(parse_instance_set("5-2").is_err());
        assert!(parse_instance_set("a-b").is_err());
        assert!(parse_instance_set("x").is_err());
    }

    #[test]
    fn test_query_resolve_requires_instance_mode() {
        let args = QueryArgs {
            worker_count: 1,
            freshness: parse("1h"),
            time_range: parse("5m"),
            sum_window: "1m".to_string(),
            instance_set: None,
            instance_count: None,
            url: String::new(),
        };
        assert!(args.resolve().is_err());

        let args = QueryArgs {
            instance_count: Some(3),
            ..args
        };
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.plan.instances, vec![0, 1, 2]);
        assert_eq!(cfg.plan.sum_window_secs, 60);
        assert_eq!(cfg.plan.sum_window_label, "1m");
    }

    #[test]
    fn test_compound_sum_window_keeps_user_spelling() {
        let args = QueryArgs {
            worker_count: 1,
            freshness: parse("1h"),
            time_range: parse("5m"),
            sum_window: "90s".to_string(),
            instance_set: None,
            instance_count: Some(1),
            url: String::new(),
        };
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.plan.sum_window_secs, 90);
        // The label is spliced into the range selector verbatim, never
        // re-rendered into a spaced form like "1m 30s".
        assert_eq!(cfg.plan.sum_window_label, "90s");

        let args = QueryArgs {
            sum_window: "1m 30s".to_string(),
            ..args
        };
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.plan.sum_window_secs, 90);
        assert_eq!(cfg.plan.sum_window_label, "1m30s");
    }

    #[test]
    fn test_cli_load_defaults() {
        let cli = Cli::try_parse_from(["tsdb-loadgen", "load"]).unwrap();
        match cli.cmd {
            Command::Load(args) => {
                let cfg = args.resolve().unwrap();
                assert_eq!(cfg.tag_count, 200);
                assert_eq!(cfg.instance_count, 1000);
                assert_eq!(cfg.refresh_interval_secs, 0);
                assert!(!cfg.gzip);
            }
            Command::Query(_) => panic!("expected load subcommand"),
        }
    }
}
