//! Latency aggregation shared by workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SampleWindow {
    micros: Vec<u64>,
    first: Option<Instant>,
    last: Option<Instant>,
}

/// Thread-safe latency recorder for one load run.
///
/// Workers push per-call latencies while the run is live; percentiles and
/// throughput are read once the run has been joined. Each run gets a fresh
/// recorder, so samples never leak between steps of a sweep.
#[derive(Debug, Default)]
pub struct LatencyRecorder {
    samples: Mutex<SampleWindow>,
    failures: AtomicU64,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successful call latency in microseconds.
    pub fn record(&self, latency_micros: u64) {
        if let Ok(mut window) = self.samples.lock() {
            let now = Instant::now();
            if window.first.is_none() {
                window.first = Some(now);
            }
            window.last = Some(now);
            window.micros.push(latency_micros);
        }
    }

    /// Counts a failed call without polluting the latency distribution.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of successful samples recorded so far.
    pub fn count(&self) -> u64 {
        if let Ok(window) = self.samples.lock() {
            window.micros.len() as u64
        } else {
            0
        }
    }

    /// Number of failed calls recorded so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Nearest-rank percentile of recorded latencies, in microseconds.
    ///
    /// `p` is a fraction in `(0, 1]`; out-of-range values are clamped.
    /// Returns 0 when nothing has been recorded.
    pub fn percentile(&self, p: f64) -> u64 {
        let mut sorted = if let Ok(window) = self.samples.lock() {
            window.micros.clone()
        } else {
            return 0;
        };
        if sorted.is_empty() {
            return 0;
        }
        sorted.sort_unstable();
        let rank = (p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    /// Successful calls per second over the observed sample span.
    ///
    /// The span runs from the first to the last recorded sample. With fewer
    /// than two samples there is no span, so `fallback` (normally the
    /// configured run duration) stands in. Returns 0.0 with no samples.
    pub fn qps(&self, fallback: Duration) -> f64 {
        let (count, span) = if let Ok(window) = self.samples.lock() {
            let span = match (window.first, window.last) {
                (Some(first), Some(last)) => last.duration_since(first),
                _ => Duration::ZERO,
            };
            (window.micros.len() as u64, span)
        } else {
            (0, Duration::ZERO)
        };
        if count == 0 {
            return 0.0;
        }
        let secs = if count < 2 || span.is_zero() {
            fallback.as_secs_f64()
        } else {
            span.as_secs_f64()
        };
        if secs == 0.0 {
            return 0.0;
        }
        count as f64 / secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn percentile_hits_the_expected_rank() {
        let recorder = LatencyRecorder::new();
        // 10ms, 20ms, ... 1000ms as microseconds.
        for step in 1..=100u64 {
            recorder.record(step * 10_000);
        }
        let p50 = recorder.percentile(0.50);
        let p99 = recorder.percentile(0.99);
        assert!((490_000..=510_000).contains(&p50), "p50 was {p50}");
        assert!((980_000..=1_000_000).contains(&p99), "p99 was {p99}");
        assert_eq!(recorder.percentile(1.0), 1_000_000);
    }

    #[test]
    fn empty_recorder_reads_zero() {
        let recorder = LatencyRecorder::new();
        assert_eq!(recorder.count(), 0);
        assert_eq!(recorder.percentile(0.99), 0);
        assert_eq!(recorder.qps(Duration::from_secs(1)), 0.0);
    }

    #[test]
    fn concurrent_records_are_all_kept() {
        let recorder = Arc::new(LatencyRecorder::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let recorder = Arc::clone(&recorder);
            handles.push(thread::spawn(move || {
                for _ in 0..250 {
                    recorder.record(1_000);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(recorder.count(), 8 * 250);
    }

    #[test]
    fn single_sample_falls_back_to_run_duration() {
        let recorder = LatencyRecorder::new();
        recorder.record(5_000);
        let qps = recorder.qps(Duration::from_secs(2));
        assert!((qps - 0.5).abs() < 1e-9, "qps was {qps}");
    }

    #[test]
    fn qps_uses_the_observed_span() {
        let recorder = LatencyRecorder::new();
        for _ in 0..5 {
            recorder.record(100);
            thread::sleep(Duration::from_millis(10));
        }
        let qps = recorder.qps(Duration::from_secs(60));
        // Five samples over roughly 40-50ms of span.
        assert!(qps > 50.0 && qps < 200.0, "qps was {qps}");
    }

    #[test]
    fn failures_count_separately() {
        let recorder = LatencyRecorder::new();
        recorder.record(1_000);
        recorder.record_failure();
        recorder.record_failure();
        assert_eq!(recorder.count(), 1);
        assert_eq!(recorder.failure_count(), 2);
    }
}
