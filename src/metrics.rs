//! Serving metrics
//!
//! Counters for the prediction endpoints:
//! - requests, split into successes, processing failures and rejected input
//! - rows scored and how many came back `null`
//! - cumulative prediction latency
//!
//! Exposed in Prometheus text format on `GET /metrics`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared request counters; clones observe the same values
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    total_requests: Arc<AtomicUsize>,
    successful_requests: Arc<AtomicUsize>,
    /// Transform or predict failures (5xx)
    failed_requests: Arc<AtomicUsize>,
    /// Malformed request bodies (4xx)
    rejected_requests: Arc<AtomicUsize>,
    rows_predicted: Arc<AtomicUsize>,
    null_predictions: Arc<AtomicUsize>,
    total_predict_time_us: Arc<AtomicU64>,
    start_time: Instant,
}

impl MetricsCollector {
    /// Create a collector with all counters at zero
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_requests: Arc::new(AtomicUsize::new(0)),
            successful_requests: Arc::new(AtomicUsize::new(0)),
            failed_requests: Arc::new(AtomicUsize::new(0)),
            rejected_requests: Arc::new(AtomicUsize::new(0)),
            rows_predicted: Arc::new(AtomicUsize::new(0)),
            null_predictions: Arc::new(AtomicUsize::new(0)),
            total_predict_time_us: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a batch that was scored
    #[allow(clippy::cast_possible_truncation)]
    pub fn record_success(&self, predictions: &[Option<f64>], duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.rows_predicted
            .fetch_add(predictions.len(), Ordering::Relaxed);
        self.null_predictions.fetch_add(
            predictions.iter().filter(|p| p.is_none()).count(),
            Ordering::Relaxed,
        );
        self.total_predict_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a processing failure
    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected before prediction
    pub fn record_rejected(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_time_us = self.total_predict_time_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests,
            successful_requests: successful,
            failed_requests: failed,
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            rows_predicted: self.rows_predicted.load(Ordering::Relaxed),
            null_predictions: self.null_predictions.load(Ordering::Relaxed),
            total_predict_time_us: total_time_us,
            uptime_secs: self.start_time.elapsed().as_secs(),
            avg_latency_ms: if successful > 0 {
                (total_time_us as f64 / 1000.0) / successful as f64
            } else {
                0.0
            },
            error_rate: if total_requests > 0 {
                failed as f64 / total_requests as f64
            } else {
                0.0
            },
        }
    }

    /// Prometheus text exposition
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();
        let mut metric = |name: &str, kind: &str, help: &str, value: String| {
            out.push_str(&format!(
                "# HELP cupscore_{name} {help}\n# TYPE cupscore_{name} {kind}\ncupscore_{name} {value}\n"
            ));
        };
        metric(
            "requests_total",
            "counter",
            "Prediction requests received",
            s.total_requests.to_string(),
        );
        metric(
            "requests_successful",
            "counter",
            "Requests scored",
            s.successful_requests.to_string(),
        );
        metric(
            "requests_failed",
            "counter",
            "Requests that failed in transform or predict",
            s.failed_requests.to_string(),
        );
        metric(
            "requests_rejected",
            "counter",
            "Requests rejected as malformed",
            s.rejected_requests.to_string(),
        );
        metric("rows_predicted_total", "counter", "Rows scored", s.rows_predicted.to_string());
        metric(
            "null_predictions_total",
            "counter",
            "Rows whose prediction was null",
            s.null_predictions.to_string(),
        );
        metric(
            "predict_time_seconds",
            "counter",
            "Total prediction time",
            format!("{:.6}", s.total_predict_time_us as f64 / 1_000_000.0),
        );
        metric(
            "avg_latency_ms",
            "gauge",
            "Average prediction latency in milliseconds",
            format!("{:.2}", s.avg_latency_ms),
        );
        metric(
            "error_rate",
            "gauge",
            "Failed fraction of requests (0.0-1.0)",
            format!("{:.4}", s.error_rate),
        );
        metric("uptime_seconds", "counter", "Uptime in seconds", s.uptime_secs.to_string());
        out
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Requests received
    pub total_requests: usize,
    /// Requests scored
    pub successful_requests: usize,
    /// Processing failures
    pub failed_requests: usize,
    /// Malformed requests
    pub rejected_requests: usize,
    /// Rows scored
    pub rows_predicted: usize,
    /// Rows whose prediction was `null`
    pub null_predictions: usize,
    /// Total prediction time in microseconds
    pub total_predict_time_us: u64,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Mean latency of successful requests in milliseconds
    pub avg_latency_ms: f64,
    /// Failed fraction (0.0 to 1.0)
    pub error_rate: f64,
}
