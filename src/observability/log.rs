use super::traits::{Observer, ObserverEvent, ObserverMetric};
use crate::util::duration_ms;
use tracing::{info, warn};

/// Observer that forwards events and metrics to `tracing`.
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::EventDispatched {
                event_type,
                listeners,
                duration,
            } => {
                let ms = duration_ms(*duration);
                info!(event_type = %event_type, listeners = listeners, duration_ms = ms, "event.dispatched");
            }
            ObserverEvent::ListenerFailed {
                event_type,
                message,
            } => {
                warn!(event_type = %event_type, error = %message, "event.listener_failed");
            }
            ObserverEvent::AnalysisCompleted {
                analysis_type,
                duration,
                confidence,
                findings,
            } => {
                let ms = duration_ms(*duration);
                info!(
                    analysis_type = %analysis_type,
                    duration_ms = ms,
                    confidence = confidence,
                    findings = findings,
                    "analysis.completed"
                );
            }
            ObserverEvent::AnalysisFailed {
                analysis_type,
                message,
            } => {
                warn!(analysis_type = %analysis_type, error = %message, "analysis.failed");
            }
            ObserverEvent::IntervalAdjusted {
                analysis_type,
                from_ms,
                to_ms,
            } => {
                info!(analysis_type = %analysis_type, from_ms = from_ms, to_ms = to_ms, "analysis.interval_adjusted");
            }
            ObserverEvent::DeepAnalysis { document_id, ran } => {
                info!(document_id = %document_id, ran = ran, "analysis.deep");
            }
            ObserverEvent::FeedbackDelivered {
                strategy,
                feedback_type,
            } => {
                info!(strategy = %strategy, feedback_type = %feedback_type, "feedback.delivered");
            }
            ObserverEvent::FeedbackRequeued {
                feedback_id,
                attempts,
            } => {
                info!(feedback_id = %feedback_id, attempts = attempts, "feedback.requeued");
            }
            ObserverEvent::FeedbackArchived {
                feedback_id,
                reason,
            } => {
                info!(feedback_id = %feedback_id, reason = %reason, "feedback.archived");
            }
            ObserverEvent::Error { component, message } => {
                warn!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::QueueDepth { queue, depth } => {
                info!(queue = %queue, depth = depth, "metric.queue_depth");
            }
            ObserverMetric::ProcessingLatency(d) => {
                info!(latency_ms = duration_ms(*d), "metric.processing_latency");
            }
            ObserverMetric::ListenerLatency(d) => {
                info!(latency_ms = duration_ms(*d), "metric.listener_latency");
            }
            ObserverMetric::InFlightTasks(n) => {
                info!(in_flight = n, "metric.in_flight_tasks");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn log_observer_name() {
        assert_eq!(LogObserver::new().name(), "log");
    }

    #[test]
    fn log_observer_all_events_no_panic() {
        let obs = LogObserver::new();
        obs.record_event(&ObserverEvent::EventDispatched {
            event_type: "content_change".into(),
            listeners: 2,
            duration: Duration::from_millis(12),
        });
        obs.record_event(&ObserverEvent::ListenerFailed {
            event_type: "plot_point".into(),
            message: "boom".into(),
        });
        obs.record_event(&ObserverEvent::AnalysisCompleted {
            analysis_type: "dialogue".into(),
            duration: Duration::ZERO,
            confidence: 0.9,
            findings: 0,
        });
        obs.record_event(&ObserverEvent::AnalysisFailed {
            analysis_type: "theme".into(),
            message: "timeout".into(),
        });
        obs.record_event(&ObserverEvent::IntervalAdjusted {
            analysis_type: "writing_style".into(),
            from_ms: 60_000,
            to_ms: 72_000,
        });
        obs.record_event(&ObserverEvent::DeepAnalysis {
            document_id: "doc-1".into(),
            ran: 3,
        });
        obs.record_event(&ObserverEvent::FeedbackDelivered {
            strategy: "status_bar".into(),
            feedback_type: "style_suggestion".into(),
        });
        obs.record_event(&ObserverEvent::FeedbackRequeued {
            feedback_id: "fb".into(),
            attempts: 1,
        });
        obs.record_event(&ObserverEvent::FeedbackArchived {
            feedback_id: "fb".into(),
            reason: "stale".into(),
        });
        obs.record_event(&ObserverEvent::Error {
            component: "engine".into(),
            message: "oops".into(),
        });
    }

    #[test]
    fn log_observer_all_metrics_no_panic() {
        let obs = LogObserver::new();
        obs.record_metric(&ObserverMetric::QueueDepth {
            queue: "events".into(),
            depth: 999,
        });
        obs.record_metric(&ObserverMetric::ProcessingLatency(Duration::from_secs(2)));
        obs.record_metric(&ObserverMetric::ListenerLatency(Duration::MAX));
        obs.record_metric(&ObserverMetric::InFlightTasks(u64::MAX));
    }
}
