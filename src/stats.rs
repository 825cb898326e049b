use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::Mutex;

/// Shared workload context constructed once at startup and handed to every
/// worker task and the reporter. The completed-operation counter is lock-free;
/// the latency histogram (query mode only) sits behind one exclusive lock.
pub struct WorkloadStats {
    completed: AtomicU64,
    latency: Option<Mutex<Histogram<u64>>>,
}

impl WorkloadStats {
    /// Context with the operation counter only (ingestion mode).
    pub fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            latency: None,
        }
    }

    /// Context that additionally tracks per-operation latency (query mode).
    pub fn with_latency() -> Self {
        Self {
            completed: AtomicU64::new(0),
            latency: Some(Mutex::new(
                Histogram::new(3).expect("three significant figures is a valid precision"),
            )),
        }
    }

    pub fn add_completed(&self, n: u64) {
        self.completed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Records one operation latency in microseconds. The lock covers the
    /// record call only, never any I/O.
    pub fn record_latency(&self, elapsed: Duration) {
        if let Some(hist) = &self.latency {
            hist.lock().saturating_record(elapsed.as_micros() as u64);
        }
    }

    /// Exports the histogram for one reporting window and resets the live one,
    /// so consecutive windows never see the same recorded value twice.
    pub fn take_latency(&self) -> Option<Histogram<u64>> {
        self.latency.as_ref().map(|hist| {
            let mut live = hist.lock();
            let snapshot = live.clone();
            live.clear();
            snapshot
        })
    }
}

impl Default for WorkloadStats {
    fn default() -> Self {
        Self::new()
    }
}
