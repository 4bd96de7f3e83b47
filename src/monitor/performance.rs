use super::heartbeat::LoopHeartbeat;
use super::metrics::MetricsCollector;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const RESPONSE_TIME_MS: &str = "response_time_ms";
pub const THROUGHPUT: &str = "throughput";
pub const ERROR_RATE: &str = "error_rate";
pub const CONCURRENT_OPERATIONS: &str = "concurrent_operations";
pub const EVENT_QUEUE_DEPTH: &str = "event_queue_depth";
pub const FEEDBACK_QUEUE_DEPTH: &str = "feedback_queue_depth";

/// Cumulative counters read from the running pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformanceCounters {
    pub completed: u64,
    pub failed: u64,
    pub processing_ms: u64,
    pub concurrent_operations: u64,
    pub event_queue_depth: usize,
    pub feedback_queue_depth: usize,
}

pub trait PerformanceSource: Send + Sync {
    fn counters(&self) -> PerformanceCounters;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub response_time_ms: f64,
    /// Completed operations per second over the sampling window.
    pub throughput: f64,
    pub error_rate: f64,
    pub concurrent_operations: f64,
    pub event_queue_depth: f64,
    pub feedback_queue_depth: f64,
}

#[allow(clippy::cast_precision_loss)]
pub fn compute_sample(
    previous: PerformanceCounters,
    current: PerformanceCounters,
    window_secs: f64,
) -> PerformanceSample {
    let completed = current.completed.saturating_sub(previous.completed);
    let failed = current.failed.saturating_sub(previous.failed);
    let processing = current.processing_ms.saturating_sub(previous.processing_ms);
    let attempted = completed + failed;

    PerformanceSample {
        response_time_ms: if completed == 0 {
            0.0
        } else {
            processing as f64 / completed as f64
        },
        throughput: if window_secs > 0.0 {
            completed as f64 / window_secs
        } else {
            0.0
        },
        error_rate: if attempted == 0 {
            0.0
        } else {
            failed as f64 / attempted as f64
        },
        concurrent_operations: current.concurrent_operations as f64,
        event_queue_depth: current.event_queue_depth as f64,
        feedback_queue_depth: current.feedback_queue_depth as f64,
    }
}

/// Periodically turns pipeline counters into metric samples.
pub struct PerformanceMonitor {
    metrics: Arc<MetricsCollector>,
    source: Arc<dyn PerformanceSource>,
    interval: Duration,
    enabled: bool,
    last: Mutex<Option<(PerformanceCounters, Instant)>>,
    heartbeat: Arc<LoopHeartbeat>,
    shutdown: CancellationToken,
}

impl PerformanceMonitor {
    pub fn new(
        metrics: Arc<MetricsCollector>,
        source: Arc<dyn PerformanceSource>,
        interval: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            metrics,
            source,
            interval,
            enabled,
            last: Mutex::new(None),
            heartbeat: Arc::new(LoopHeartbeat::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn heartbeat(&self) -> Arc<LoopHeartbeat> {
        Arc::clone(&self.heartbeat)
    }

    /// Take one sample now and record it.
    pub fn sample_now(&self) -> PerformanceSample {
        let current = self.source.counters();
        let now = Instant::now();
        let previous = self
            .last
            .lock()
            .ok()
            .and_then(|mut last| last.replace((current, now)));

        let (base, window) = previous.map_or((current, self.interval), |(counters, at)| {
            (counters, now.saturating_duration_since(at))
        });
        let sample = compute_sample(base, current, window.as_secs_f64());

        self.metrics.record(RESPONSE_TIME_MS, sample.response_time_ms);
        self.metrics.record(THROUGHPUT, sample.throughput);
        self.metrics.record(ERROR_RATE, sample.error_rate);
        self.metrics
            .record(CONCURRENT_OPERATIONS, sample.concurrent_operations);
        self.metrics.record(EVENT_QUEUE_DEPTH, sample.event_queue_depth);
        self.metrics
            .record(FEEDBACK_QUEUE_DEPTH, sample.feedback_queue_depth);
        sample
    }

    pub async fn run(&self) {
        if !self.enabled {
            tracing::debug!("performance monitoring disabled");
            return;
        }
        self.heartbeat.mark_started();
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let sample = self.sample_now();
                    tracing::trace!(
                        throughput = sample.throughput,
                        error_rate = sample.error_rate,
                        "performance sample"
                    );
                    self.heartbeat.beat();
                }
            }
        }
        self.heartbeat.mark_stopped();
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
