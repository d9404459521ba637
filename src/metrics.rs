//! Counters and latency statistics for the consumer loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::MessageError;
use crate::scorer::Decision;

/// Keep at most this many latency samples
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the pipeline
pub struct PipelineMetrics {
    received: AtomicU64,
    decode_failures: AtomicU64,
    rejected: AtomicU64,
    score_failures: AtomicU64,
    normal: AtomicU64,
    anomalies: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            score_failures: AtomicU64::new(0),
            normal: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record that a message arrived from the transport
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed decision and how long the message took
    pub fn record_decision(&self, decision: Decision, processing_time: Duration) {
        match decision {
            Decision::Normal => self.normal.fetch_add(1, Ordering::Relaxed),
            Decision::Anomaly => self.anomalies.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Record a message that was skipped
    pub fn record_failure(&self, error: &MessageError) {
        let counter = match error {
            MessageError::Decode(_) => &self.decode_failures,
            MessageError::Rejected(_) => &self.rejected,
            MessageError::Score(_) => &self.score_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            score_failures: self.score_failures.load(Ordering::Relaxed),
            normal: self.normal.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Messages received per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.received.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let processing = self.get_processing_stats();

        info!(
            received = snapshot.received,
            normal = snapshot.normal,
            anomalies = snapshot.anomalies,
            anomaly_rate = format!("{:.2}%", snapshot.anomaly_rate() * 100.0),
            throughput = format!("{:.1} msg/s", self.get_throughput()),
            "Pipeline summary"
        );
        info!(
            decode_failures = snapshot.decode_failures,
            rejected = snapshot.rejected,
            score_failures = snapshot.score_failures,
            "Skipped messages"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Processing time"
        );
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub decode_failures: u64,
    pub rejected: u64,
    pub score_failures: u64,
    pub normal: u64,
    pub anomalies: u64,
}

impl MetricsSnapshot {
    pub fn decisions(&self) -> u64 {
        self.normal + self.anomalies
    }

    pub fn skipped(&self) -> u64 {
        self.decode_failures + self.rejected + self.score_failures
    }

    /// Share of decisions that were anomalies
    pub fn anomaly_rate(&self) -> f64 {
        match self.decisions() {
            0 => 0.0,
            n => self.anomalies as f64 / n as f64,
        }
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        for _ in 0..4 {
            metrics.record_received();
        }
        metrics.record_decision(Decision::Normal, Duration::from_micros(100));
        metrics.record_decision(Decision::Anomaly, Duration::from_micros(300));
        metrics.record_failure(&MessageError::Rejected(Rejection::MissingAmount));
        metrics.record_failure(&MessageError::Decode(
            serde_json::from_slice::<serde_json::Value>(b"nope").unwrap_err(),
        ));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received, 4);
        assert_eq!(snapshot.decisions(), 2);
        assert_eq!(snapshot.skipped(), 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.anomaly_rate(), 0.5);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in [10, 20, 30, 40] {
            metrics.record_decision(Decision::Normal, Duration::from_micros(us));
        }
        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 25);
        assert_eq!(stats.p50_us, 30);
        assert_eq!(stats.max_us, 40);
    }
}
