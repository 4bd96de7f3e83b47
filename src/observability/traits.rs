use std::time::Duration;

/// Events the observer can record
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    EventDispatched {
        event_type: String,
        listeners: usize,
        duration: Duration,
    },
    ListenerFailed {
        event_type: String,
        message: String,
    },
    AnalysisCompleted {
        analysis_type: String,
        duration: Duration,
        confidence: f64,
        findings: usize,
    },
    AnalysisFailed {
        analysis_type: String,
        message: String,
    },
    IntervalAdjusted {
        analysis_type: String,
        from_ms: u64,
        to_ms: u64,
    },
    DeepAnalysis {
        document_id: String,
        ran: usize,
    },
    FeedbackDelivered {
        strategy: String,
        feedback_type: String,
    },
    FeedbackRequeued {
        feedback_id: String,
        attempts: u32,
    },
    FeedbackArchived {
        feedback_id: String,
        reason: String,
    },
    Error {
        component: String,
        message: String,
    },
}

/// Numeric metrics
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    QueueDepth { queue: String, depth: u64 },
    ProcessingLatency(Duration),
    ListenerLatency(Duration),
    InFlightTasks(u64),
}

/// Sink for pipeline events and metrics.
pub trait Observer: Send + Sync {
    /// Record a discrete event
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered data (no-op for most backends)
    fn flush(&self) {}

    /// Human-readable name of this observer
    fn name(&self) -> &str;
}
