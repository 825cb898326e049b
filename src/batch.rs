use std::collections::HashMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LoadGenError, Result};
use crate::stats::WorkloadStats;
use crate::tags::{SeriesTag, TagSet};

/// One time-series record in the backend's import format: a label set plus
/// parallel value/timestamp arrays (timestamps in milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub metric: HashMap<String, String>,
    pub values: Vec<i64>,
    pub timestamps: Vec<i64>,
}

/// Streams newline-delimited JSON records into an HTTP body, optionally
/// through a gzip encoder.
pub struct BatchEncoder {
    sink: Sink,
}

enum Sink {
    Plain(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
}

impl BatchEncoder {
    pub fn new(gzip: bool) -> Self {
        let sink = if gzip {
            Sink::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
        } else {
            Sink::Plain(Vec::new())
        };
        Self { sink }
    }

    pub fn write_record(&mut self, record: &MetricRecord) -> Result<()> {
        let writer: &mut dyn Write = match &mut self.sink {
            Sink::Plain(buf) => buf,
            Sink::Gzip(encoder) => encoder,
        };
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        match self.sink {
            Sink::Plain(buf) => Ok(buf),
            Sink::Gzip(encoder) => encoder
                .finish()
                .map_err(|err| LoadGenError::Encode(err.to_string())),
        }
    }
}

/// Builds the full import body for one reporting minute: for each tag, one
/// digest record followed by one cpu-time record per instance. Bumps the
/// completed-operation counter once per record.
pub fn build_batch(
    report_secs: i64,
    tags: &TagSet,
    instance_count: u32,
    gzip: bool,
    stats: &WorkloadStats,
    rng: &mut impl Rng,
) -> Result<Vec<u8>> {
    let mut encoder = BatchEncoder::new(gzip);
    for tag in tags.tags() {
        encoder.write_record(&digest_record(report_secs, tag))?;
        stats.add_completed(1);

        for instance in 0..instance_count {
            encoder.write_record(&cpu_time_record(report_secs, tag, instance, rng))?;
            stats.add_completed(1);
        }
    }
    encoder.finish()
}

/// A single point marking the tag's SQL digest as seen at `report_secs`.
fn digest_record(report_secs: i64, tag: &SeriesTag) -> MetricRecord {
    let metric = HashMap::from([
        ("__name__".to_string(), "sql_digest".to_string()),
        ("digest".to_string(), tag.id.clone()),
        ("sql".to_string(), tag.sql_text.clone()),
    ]);
    MetricRecord {
        metric,
        values: vec![1],
        timestamps: vec![report_secs * 1000],
    }
}

/// Sixty per-second cpu-time samples covering the trailing minute for one
/// tag/instance pair, values uniform in `[0, 100)`.
fn cpu_time_record(
    report_secs: i64,
    tag: &SeriesTag,
    instance: u32,
    rng: &mut impl Rng,
) -> MetricRecord {
    let metric = HashMap::from([
        ("__name__".to_string(), "cpu_time".to_string()),
        ("tag".to_string(), tag.id.clone()),
        ("instance".to_string(), format!("tikv-{instance}")),
    ]);
    let mut values = Vec::with_capacity(60);
    let mut timestamps = Vec::with_capacity(60);
    for ts in report_secs - 60..report_secs {
        timestamps.push(ts * 1000);
        values.push(rng.gen_range(0..100));
    }
    MetricRecord {
        metric,
        values,
        timestamps,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn decode(body: &[u8]) -> Vec<MetricRecord> {
        std::str::from_utf8(body)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn tag_set(count: usize) -> TagSet {
        let mut tags = TagSet::new(count, 0);
        tags.refresh(600);
        tags
    }

    #[test]
    fn test_batch_record_mix() {
        let tags = tag_set(3);
        let stats = WorkloadStats::new();
        let mut rng = StdRng::seed_from_u64(42);
        let body = build_batch(600, &tags, 2, false, &stats, &mut rng).unwrap();

        let records = decode(&body);
        let digests: Vec<_> = records
            .iter()
            .filter(|r| r.metric["__name__"] == "sql_digest")
            .collect();
        let cpu: Vec<_> = records
            .iter()
            .filter(|r| r.metric["__name__"] == "cpu_time")
            .collect();

        // T digest records and T*I cpu-time records, counter bumped per record.
        assert_eq!(digests.len(), 3);
        assert_eq!(cpu.len(), 6);
        assert_eq!(records.len(), 9);
        assert_eq!(stats.completed(), 9);

        for record in &digests {
            assert_eq!(record.values, vec![1]);
            assert_eq!(record.timestamps, vec![600_000]);
            assert!(record.metric.contains_key("digest"));
            assert!(record.metric.contains_key("sql"));
        }
    }

    #[test]
    fn test_cpu_time_samples() {
        let tags = tag_set(1);
        let stats = WorkloadStats::new();
        let mut rng = StdRng::seed_from_u64(7);
        let body = build_batch(600, &tags, 1, false, &stats, &mut rng).unwrap();

        let records = decode(&body);
        let record = records
            .iter()
            .find(|r| r.metric["__name__"] == "cpu_time")
            .unwrap();

        assert_eq!(record.timestamps.len(), 60);
        assert_eq!(record.values.len(), 60);
        assert_eq!(record.timestamps[0], (600 - 60) * 1000);
        assert_eq!(*record.timestamps.last().unwrap(), (600 - 1) * 1000);
        for pair in record.timestamps.windows(2) {
            assert_eq!(pair[1] - pair[0], 1000);
        }
        assert!(record.values.iter().all(|v| (0..100).contains(v)));
        assert_eq!(record.metric["instance"], "tikv-0");
    }

    #[test]
    fn test_gzip_round_trip_matches_plain() {
        let tags = tag_set(2);
        let stats = WorkloadStats::new();

        let mut rng = StdRng::seed_from_u64(99);
        let plain = build_batch(600, &tags, 2, false, &stats, &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let compressed = build_batch(600, &tags, 2, true, &stats, &mut rng).unwrap();

        assert!(compressed != plain);
        let mut decompressed = Vec::new();
        flate2::read::GzDecoder::new(&compressed[..])
            .read_to_end(&mut decompressed)
            .unwrap();
        assert_eq!(decode(&decompressed), decode(&plain));
    }
}
