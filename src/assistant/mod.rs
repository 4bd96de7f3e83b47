//! Composition root: builds every pipeline component from a [`Config`],
//! wires them together and owns their background tasks.

use crate::analysis::{AnalysisEngine, SchedulerIngest, analysis_types_for, reference_processors};
use crate::config::Config;
use crate::events::{ChangeAggregator, ContentChange, EventDispatcher, WatchSignal, WritingEventType};
use crate::feedback::{
    Feedback, FeedbackController, FeedbackResponse, FeedbackSink, FeedbackSurface,
    reference_strategies,
};
use crate::monitor::{
    HealthMonitor, HealthSnapshot, LoopProbe, MetricsCollector, PerformanceCounters,
    PerformanceMonitor, PerformanceSource,
};
use crate::observability::{Observer, create_observer};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use strum::IntoEnumIterator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Reads pipeline counters for the performance sampler.
struct PipelineCounters {
    dispatcher: EventDispatcher,
    engine: AnalysisEngine,
    controller: FeedbackController,
}

impl PerformanceSource for PipelineCounters {
    fn counters(&self) -> PerformanceCounters {
        let engine = self.engine.stats();
        PerformanceCounters {
            completed: engine.completed,
            failed: engine.failed,
            processing_ms: engine.processing_ms,
            concurrent_operations: engine.scheduler.in_flight as u64,
            event_queue_depth: self.dispatcher.queue_depth(),
            feedback_queue_depth: self.controller.queue_depth(),
        }
    }
}

pub struct Assistant {
    config: Arc<Config>,
    observer: Arc<dyn Observer>,
    dispatcher: EventDispatcher,
    engine: AnalysisEngine,
    controller: FeedbackController,
    health: Arc<HealthMonitor>,
    metrics: Arc<MetricsCollector>,
    performance: Arc<PerformanceMonitor>,
    edits: mpsc::Sender<ContentChange>,
    pending_edits: Mutex<Option<mpsc::Receiver<ContentChange>>>,
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Assistant {
    /// Construct and wire every component. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(config: Config, surface: Arc<dyn FeedbackSurface>) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let config = Arc::new(config);
        let observer: Arc<dyn Observer> = Arc::from(create_observer(&config.observability));

        let dispatcher = EventDispatcher::new(&config.dispatcher, Arc::clone(&observer));
        let controller = FeedbackController::new(&config.feedback, Arc::clone(&observer));
        for strategy in reference_strategies(&surface) {
            controller.add_strategy(strategy);
        }

        let sink = FeedbackSink::new(controller.clone()).with_dispatcher(dispatcher.clone());
        let engine = AnalysisEngine::new(
            &config.engine,
            &config.scheduler,
            Arc::new(sink),
            Arc::clone(&observer),
        );
        for processor in reference_processors() {
            engine.register_processor(processor);
        }

        let ingest = Arc::new(SchedulerIngest::new(engine.clone()));
        for event_type in WritingEventType::iter() {
            if !analysis_types_for(event_type).is_empty() {
                dispatcher.add_listener(event_type, ingest.clone());
            }
        }

        let health = Arc::new(HealthMonitor::new());
        register_probes(&health, &config, &dispatcher, &engine, &controller);

        let metrics = Arc::new(MetricsCollector::new(config.monitor.history_capacity));
        let performance = Arc::new(PerformanceMonitor::new(
            Arc::clone(&metrics),
            Arc::new(PipelineCounters {
                dispatcher: dispatcher.clone(),
                engine: engine.clone(),
                controller: controller.clone(),
            }),
            Duration::from_secs(config.monitor.sample_interval_secs.max(1)),
            config.monitor.performance_enabled,
        ));

        let (edits, pending_edits) = mpsc::channel(config.aggregator.channel_capacity);

        Ok(Self {
            config,
            observer,
            dispatcher,
            engine,
            controller,
            health,
            metrics,
            performance,
            edits,
            pending_edits: Mutex::new(Some(pending_edits)),
            shutdown: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Spawn every background loop onto the current runtime.
    pub fn start(&self) -> Result<()> {
        let receiver = self
            .pending_edits
            .lock()
            .ok()
            .and_then(|mut pending| pending.take())
            .context("assistant already started")?;

        let (signal_tx, signal_rx) = mpsc::channel(self.config.aggregator.channel_capacity);
        let mut handles = vec![
            tokio::spawn(ChangeAggregator::new(&self.config.aggregator).run(
                receiver,
                signal_tx,
                self.shutdown.child_token(),
            )),
            self.spawn_router(signal_rx),
        ];

        let dispatcher = self.dispatcher.clone();
        handles.push(tokio::spawn(async move { dispatcher.run().await }));
        let engine = self.engine.clone();
        handles.push(tokio::spawn(async move { engine.run().await }));
        let controller = self.controller.clone();
        handles.push(tokio::spawn(async move { controller.run().await }));
        let performance = Arc::clone(&self.performance);
        handles.push(tokio::spawn(async move { performance.run().await }));
        handles.push(self.spawn_health_poll());

        if let Ok(mut slot) = self.handles.lock() {
            slot.extend(handles);
        }
        self.health.mark_component_ok("assistant");
        tracing::info!(
            observer = self.observer.name(),
            performance = self.performance.is_enabled(),
            "assistant started"
        );
        Ok(())
    }

    fn spawn_router(&self, mut signals: mpsc::Receiver<WatchSignal>) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let engine = self.engine.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match signal {
                    WatchSignal::Batch(batch) => {
                        let event_id = dispatcher.publish_change(&batch);
                        tracing::debug!(
                            document_id = %batch.change.document_id,
                            edits = batch.edits,
                            event_id = %event_id,
                            "change batch published"
                        );
                    }
                    WatchSignal::Idle(signal) => engine.on_idle(signal),
                }
            }
        })
    }

    fn spawn_health_poll(&self) -> JoinHandle<()> {
        let health = Arc::clone(&self.health);
        let shutdown = self.shutdown.child_token();
        let every = Duration::from_secs(self.config.monitor.health_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let snapshot = health.check_all().await;
                for component in snapshot.unhealthy_components() {
                    let message = snapshot
                        .components
                        .get(component)
                        .and_then(|c| c.message.clone())
                        .unwrap_or_default();
                    tracing::warn!(component, message = %message, "component unhealthy");
                }
            }
        })
    }

    /// Feed one editor change into the pipeline.
    pub async fn submit_edit(&self, change: ContentChange) -> Result<()> {
        self.controller.record_activity();
        self.edits
            .send(change)
            .await
            .map_err(|_| anyhow::anyhow!("edit channel closed"))
    }

    pub fn queue_feedback(&self, feedback: Feedback) {
        self.controller.queue_feedback(feedback);
    }

    pub fn record_response(&self, response: FeedbackResponse) {
        self.controller.record_response(response);
    }

    /// Probe every component and return the refreshed snapshot.
    pub async fn health(&self) -> HealthSnapshot {
        self.health.check_all().await
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    pub fn controller(&self) -> &FeedbackController {
        &self.controller
    }

    /// Stop every loop and wait for its task to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.dispatcher.stop();
        self.engine.stop();
        self.controller.stop();
        self.performance.stop();

        let handles = self
            .handles
            .lock()
            .map(|mut handles| std::mem::take(&mut *handles))
            .unwrap_or_default();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        self.health.mark_component_error("assistant", "shut down");
        tracing::info!("assistant stopped");
    }
}

fn register_probes(
    health: &HealthMonitor,
    config: &Config,
    dispatcher: &EventDispatcher,
    engine: &AnalysisEngine,
    controller: &FeedbackController,
) {
    let stale = config.monitor.stale_after_secs;
    let warn = config.monitor.queue_depth_warn;

    let events = dispatcher.clone();
    health.register_probe(Arc::new(
        LoopProbe::new("event_system", dispatcher.heartbeat(), stale)
            .with_queue_depth(move || events.queue_depth(), warn),
    ));

    let analysis = engine.clone();
    health.register_probe(Arc::new(
        LoopProbe::new("analysis_engine", engine.heartbeat(), stale)
            .with_queue_depth(move || analysis.stats().scheduler.scheduled, warn),
    ));

    let feedback = controller.clone();
    health.register_probe(Arc::new(
        LoopProbe::new("feedback_system", controller.heartbeat(), stale)
            .with_queue_depth(move || feedback.queue_depth(), warn),
    ));
}
