use super::scheduler::{AnalysisScheduler, SchedulerSnapshot};
use super::types::{
    AnalysisMetadata, AnalysisResult, AnalysisTask, AnalysisType, ContentProcessor,
    DEEP_ANALYSIS_TYPES,
};
use crate::config::{EngineConfig, SchedulerConfig};
use crate::error::AnalysisError;
use crate::events::IdleSignal;
use crate::monitor::LoopHeartbeat;
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::util::duration_ms;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Notify;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

/// Receives every analysis result the engine produces.
pub trait ResultSink: Send + Sync {
    fn accept<'a>(
        &'a self,
        result: &'a AnalysisResult,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Sink that only logs findings.
#[derive(Debug, Default)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn accept<'a>(
        &'a self,
        result: &'a AnalysisResult,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(
                analysis_type = %result.analysis_type,
                findings = result.findings.len(),
                confidence = result.metadata.confidence,
                "analysis result"
            );
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub completed: u64,
    pub failed: u64,
    pub released: u64,
    pub deep_runs: u64,
    /// Summed processing time of completed tasks.
    pub processing_ms: u64,
    pub scheduler: SchedulerSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    Released,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    released: AtomicU64,
    deep_runs: AtomicU64,
    processing_ms: AtomicU64,
}

struct EngineInner {
    scheduler: AnalysisScheduler,
    processors: Mutex<HashMap<AnalysisType, Arc<dyn ContentProcessor>>>,
    sink: Arc<dyn ResultSink>,
    observer: Arc<dyn Observer>,
    counters: Counters,
    pending_idle: Mutex<Option<IdleSignal>>,
    wake: Notify,
    max_sleep: Duration,
    deep_on_idle: bool,
    heartbeat: Arc<LoopHeartbeat>,
    shutdown: CancellationToken,
}

/// Owns the processor registry and the scheduler and runs due analyses.
#[derive(Clone)]
pub struct AnalysisEngine {
    inner: Arc<EngineInner>,
}

impl AnalysisEngine {
    pub fn new(
        engine: &EngineConfig,
        scheduler: &SchedulerConfig,
        sink: Arc<dyn ResultSink>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                scheduler: AnalysisScheduler::new(scheduler),
                processors: Mutex::new(HashMap::new()),
                sink,
                observer,
                counters: Counters::default(),
                pending_idle: Mutex::new(None),
                wake: Notify::new(),
                max_sleep: Duration::from_millis(engine.max_sleep_ms.max(1)),
                deep_on_idle: engine.deep_analysis_on_idle,
                heartbeat: Arc::new(LoopHeartbeat::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register a processor for its analysis type, returning the one it
    /// replaced.
    pub fn register_processor(
        &self,
        processor: Arc<dyn ContentProcessor>,
    ) -> Option<Arc<dyn ContentProcessor>> {
        let ty = processor.analysis_type();
        let replaced = self
            .inner
            .processors
            .lock()
            .ok()
            .and_then(|mut table| table.insert(ty, processor));
        if replaced.is_some() {
            tracing::info!(analysis_type = %ty, "content processor replaced");
        }
        replaced
    }

    pub fn has_processor(&self, analysis_type: AnalysisType) -> bool {
        self.inner
            .processors
            .lock()
            .is_ok_and(|table| table.contains_key(&analysis_type))
    }

    fn processor(&self, analysis_type: AnalysisType) -> Option<Arc<dyn ContentProcessor>> {
        self.inner
            .processors
            .lock()
            .ok()
            .and_then(|table| table.get(&analysis_type).cloned())
    }

    pub fn scheduler(&self) -> &AnalysisScheduler {
        &self.inner.scheduler
    }

    pub fn schedule_analysis(&self, task: AnalysisTask) -> bool {
        self.inner.scheduler.schedule_analysis(task)
    }

    pub fn stats(&self) -> EngineStats {
        let c = &self.inner.counters;
        EngineStats {
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            released: c.released.load(Ordering::Relaxed),
            deep_runs: c.deep_runs.load(Ordering::Relaxed),
            processing_ms: c.processing_ms.load(Ordering::Relaxed),
            scheduler: self.inner.scheduler.snapshot(),
        }
    }

    pub fn heartbeat(&self) -> Arc<LoopHeartbeat> {
        Arc::clone(&self.inner.heartbeat)
    }

    /// Run every due task once, in ascending priority order.
    pub async fn run_scheduled_analysis(&self) -> Vec<TaskOutcome> {
        let tasks = self.inner.scheduler.pending_tasks();
        self.inner
            .observer
            .record_metric(&ObserverMetric::InFlightTasks(tasks.len() as u64));

        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            outcomes.push(self.process_task(task).await);
        }
        outcomes
    }

    async fn process_task(&self, task: AnalysisTask) -> TaskOutcome {
        let inner = &self.inner;
        let ty = task.analysis_type;

        let Some(processor) = self.processor(ty) else {
            tracing::debug!(task_id = %task.id, "{}", AnalysisError::NoProcessor(ty.to_string()));
            inner.scheduler.release_task(&task.id);
            inner.counters.released.fetch_add(1, Ordering::Relaxed);
            return TaskOutcome::Released;
        };

        if !processor.can_process(&task.content) {
            tracing::debug!(task_id = %task.id, "{}", AnalysisError::Declined(ty.to_string()));
            inner.scheduler.release_task(&task.id);
            inner.counters.released.fetch_add(1, Ordering::Relaxed);
            return TaskOutcome::Released;
        }

        let started = Instant::now();
        match processor.process(&task.content).await {
            Ok(output) => {
                let elapsed = started.elapsed();
                let elapsed_ms = duration_ms(elapsed);
                let before = inner.scheduler.interval(ty);
                let after = inner
                    .scheduler
                    .adjust_interval(ty, elapsed_ms, output.confidence);
                if before != after {
                    inner.observer.record_event(&ObserverEvent::IntervalAdjusted {
                        analysis_type: ty.to_string(),
                        from_ms: before,
                        to_ms: after,
                    });
                }

                let result = AnalysisResult {
                    task_id: task.id.clone(),
                    analysis_type: ty,
                    document_id: task.context.document_id().map(str::to_string),
                    findings: output.findings,
                    metadata: AnalysisMetadata {
                        processing_time_ms: elapsed_ms,
                        confidence: output.confidence,
                        timestamp: Utc::now(),
                    },
                };
                inner.observer.record_event(&ObserverEvent::AnalysisCompleted {
                    analysis_type: ty.to_string(),
                    duration: elapsed,
                    confidence: result.metadata.confidence,
                    findings: result.findings.len(),
                });
                inner
                    .observer
                    .record_metric(&ObserverMetric::ProcessingLatency(elapsed));

                if let Err(error) = inner.sink.accept(&result).await {
                    tracing::warn!(task_id = %task.id, "result sink rejected analysis result: {error:#}");
                }

                inner.scheduler.mark_task_complete(&task.id, ty);
                inner.counters.completed.fetch_add(1, Ordering::Relaxed);
                inner
                    .counters
                    .processing_ms
                    .fetch_add(elapsed_ms, Ordering::Relaxed);
                TaskOutcome::Completed
            }
            Err(error) => {
                let error = AnalysisError::ProcessorFailed {
                    task_id: task.id.clone(),
                    analysis_type: ty.to_string(),
                    message: format!("{error:#}"),
                };
                tracing::error!("{error}");
                inner.observer.record_event(&ObserverEvent::AnalysisFailed {
                    analysis_type: ty.to_string(),
                    message: error.to_string(),
                });
                inner.scheduler.release_task(&task.id);
                inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                TaskOutcome::Failed
            }
        }
    }

    /// Run the deep-analysis types over the full document, bypassing the
    /// interval gate, lowest processor priority first. Returns how many
    /// processors produced a result.
    pub async fn deep_analysis(&self, document_id: &str, content: &str) -> usize {
        let inner = &self.inner;
        let mut ran = 0;

        let mut processors: Vec<Arc<dyn ContentProcessor>> = DEEP_ANALYSIS_TYPES
            .into_iter()
            .filter_map(|ty| self.processor(ty))
            .filter(|processor| processor.can_process(content))
            .collect();
        processors.sort_by_key(|processor| processor.priority());

        for processor in processors {
            let ty = processor.analysis_type();
            let started = Instant::now();
            match processor.process(content).await {
                Ok(output) => {
                    let result = AnalysisResult {
                        task_id: uuid::Uuid::new_v4().to_string(),
                        analysis_type: ty,
                        document_id: Some(document_id.to_string()),
                        findings: output.findings,
                        metadata: AnalysisMetadata {
                            processing_time_ms: duration_ms(started.elapsed()),
                            confidence: output.confidence,
                            timestamp: Utc::now(),
                        },
                    };
                    if let Err(error) = inner.sink.accept(&result).await {
                        tracing::warn!(analysis_type = %ty, "result sink rejected deep analysis result: {error:#}");
                    }
                    ran += 1;
                }
                Err(error) => {
                    tracing::error!(analysis_type = %ty, document_id, "deep analysis failed: {error:#}");
                    inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                    inner.observer.record_event(&ObserverEvent::AnalysisFailed {
                        analysis_type: ty.to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }

        inner.counters.deep_runs.fetch_add(1, Ordering::Relaxed);
        inner.observer.record_event(&ObserverEvent::DeepAnalysis {
            document_id: document_id.to_string(),
            ran,
        });
        ran
    }

    /// Hand an idle signal to the loop. Only the latest pending signal is
    /// kept.
    pub fn on_idle(&self, signal: IdleSignal) {
        if !self.inner.deep_on_idle {
            return;
        }
        if let Ok(mut pending) = self.inner.pending_idle.lock() {
            *pending = Some(signal);
        }
        self.inner.wake.notify_one();
    }

    fn take_idle(&self) -> Option<IdleSignal> {
        self.inner
            .pending_idle
            .lock()
            .ok()
            .and_then(|mut pending| pending.take())
    }

    fn next_sleep(&self) -> Duration {
        let optimal = Duration::from_millis(self.inner.scheduler.optimal_interval());
        optimal.min(self.inner.max_sleep)
    }

    pub async fn run(&self) {
        let inner = &self.inner;
        inner.heartbeat.mark_started();
        tracing::info!("analysis engine started");

        while !inner.shutdown.is_cancelled() {
            if let Some(signal) = self.take_idle() {
                self.deep_analysis(&signal.document_id, &signal.content)
                    .await;
            }
            self.run_scheduled_analysis().await;
            inner.heartbeat.beat();

            tokio::select! {
                () = inner.shutdown.cancelled() => break,
                () = inner.wake.notified() => {}
                () = time::sleep(self.next_sleep()) => {}
            }
        }

        inner.heartbeat.mark_stopped();
        tracing::info!("analysis engine stopped");
    }

    pub fn stop(&self) {
        self.inner.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{Finding, ProcessorOutput, Severity, TaskContext};
    use crate::observability::NoopObserver;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CollectingSink {
        results: Mutex<Vec<AnalysisResult>>,
    }

    impl ResultSink for CollectingSink {
        fn accept<'a>(
            &'a self,
            result: &'a AnalysisResult,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            self.results.lock().unwrap().push(result.clone());
            Box::pin(async { Ok(()) })
        }
    }

    struct StubProcessor {
        ty: AnalysisType,
        fail: bool,
        calls: AtomicUsize,
        confidence: f64,
        priority: Option<u32>,
    }

    impl StubProcessor {
        fn new(ty: AnalysisType) -> Self {
            Self {
                ty,
                fail: false,
                calls: AtomicUsize::new(0),
                confidence: 0.8,
                priority: None,
            }
        }

        fn failing(ty: AnalysisType) -> Self {
            Self {
                fail: true,
                ..Self::new(ty)
            }
        }
    }

    impl ContentProcessor for StubProcessor {
        fn analysis_type(&self) -> AnalysisType {
            self.ty
        }

        fn can_process(&self, content: &str) -> bool {
            !content.is_empty()
        }

        fn process<'a>(
            &'a self,
            content: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProcessorOutput>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    anyhow::bail!("processor crashed");
                }
                Ok(ProcessorOutput {
                    findings: vec![Finding::new("stub", Severity::Warning, content)],
                    confidence: self.confidence,
                })
            })
        }

        fn priority(&self) -> u32 {
            self.priority.unwrap_or_else(|| self.ty.base_priority())
        }
    }

    fn engine(sink: Arc<dyn ResultSink>) -> AnalysisEngine {
        let mut scheduler = SchedulerConfig::default();
        for ty in ["plot_consistency", "character_development", "writing_style"] {
            scheduler.intervals.insert(ty.into(), 30_000);
        }
        AnalysisEngine::new(
            &EngineConfig::default(),
            &scheduler,
            sink,
            Arc::new(NoopObserver),
        )
    }

    fn task_for(ty: AnalysisType, content: &str, priority: u32) -> AnalysisTask {
        AnalysisTask::new(ty, content, priority, TaskContext::Manual)
    }

    fn schedule_due(engine: &AnalysisEngine, task: AnalysisTask) {
        let past = Utc::now() - chrono::Duration::minutes(10);
        assert!(engine.scheduler().schedule_analysis_at(task, past));
    }

    #[tokio::test]
    async fn due_tasks_run_and_complete() {
        let sink = Arc::new(CollectingSink::default());
        let e = engine(sink.clone());
        e.register_processor(Arc::new(StubProcessor::new(AnalysisType::PlotConsistency)));

        schedule_due(&e, task_for(AnalysisType::PlotConsistency, "chapter", 0));
        let outcomes = e.run_scheduled_analysis().await;

        assert_eq!(outcomes, vec![TaskOutcome::Completed]);
        let results = sink.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].findings[0].message, "chapter");
        assert_eq!(e.stats().completed, 1);
        assert_eq!(e.stats().scheduler, SchedulerSnapshot::default());
    }

    #[tokio::test]
    async fn failure_releases_task_without_retry() {
        let sink = Arc::new(CollectingSink::default());
        let e = engine(sink.clone());
        let failing = Arc::new(StubProcessor::failing(AnalysisType::PlotConsistency));
        e.register_processor(failing.clone());

        let task = task_for(AnalysisType::PlotConsistency, "chapter", 0);
        schedule_due(&e, task.clone());
        assert_eq!(e.run_scheduled_analysis().await, vec![TaskOutcome::Failed]);
        assert!(!e.scheduler().is_in_flight(&task.id));

        assert!(e.run_scheduled_analysis().await.is_empty());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(e.stats().failed, 1);
        assert!(sink.results.lock().unwrap().is_empty());

        // A new schedule passes the gate since nothing completed.
        schedule_due(&e, task);
        assert_eq!(e.run_scheduled_analysis().await, vec![TaskOutcome::Failed]);
    }

    #[tokio::test]
    async fn missing_or_declining_processor_releases() {
        let e = engine(Arc::new(LogSink));
        e.register_processor(Arc::new(StubProcessor::new(AnalysisType::CharacterDevelopment)));

        schedule_due(&e, task_for(AnalysisType::WritingStyle, "text", 0));
        schedule_due(&e, task_for(AnalysisType::CharacterDevelopment, "", 1));

        let outcomes = e.run_scheduled_analysis().await;
        assert_eq!(outcomes, vec![TaskOutcome::Released, TaskOutcome::Released]);
        assert_eq!(e.stats().released, 2);
        assert_eq!(e.stats().scheduler.in_flight, 0);
    }

    #[tokio::test]
    async fn one_failing_type_does_not_block_others() {
        let sink = Arc::new(CollectingSink::default());
        let e = engine(sink.clone());
        e.register_processor(Arc::new(StubProcessor::failing(AnalysisType::PlotConsistency)));
        e.register_processor(Arc::new(StubProcessor::new(AnalysisType::WritingStyle)));

        schedule_due(&e, task_for(AnalysisType::PlotConsistency, "a", 0));
        schedule_due(&e, task_for(AnalysisType::WritingStyle, "b", 5));

        let outcomes = e.run_scheduled_analysis().await;
        assert_eq!(outcomes, vec![TaskOutcome::Failed, TaskOutcome::Completed]);
        assert_eq!(sink.results.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completion_adjusts_interval() {
        let e = engine(Arc::new(LogSink));
        let mut confident = StubProcessor::new(AnalysisType::WritingStyle);
        confident.confidence = 0.95;
        e.register_processor(Arc::new(confident));
        let before = e.scheduler().interval(AnalysisType::WritingStyle);

        schedule_due(&e, task_for(AnalysisType::WritingStyle, "x", 0));
        e.run_scheduled_analysis().await;

        // Already at the floor, so a fast confident run cannot go lower.
        assert_eq!(before, 30_000);
        assert_eq!(e.scheduler().interval(AnalysisType::WritingStyle), 30_000);

        let mut unsure = StubProcessor::new(AnalysisType::WritingStyle);
        unsure.confidence = 0.5;
        e.register_processor(Arc::new(unsure));
        let past = Utc::now() - chrono::Duration::minutes(30);
        e.scheduler().mark_task_complete_at("old", AnalysisType::WritingStyle, past);
        schedule_due(&e, task_for(AnalysisType::WritingStyle, "y", 0));
        e.run_scheduled_analysis().await;
        assert_eq!(e.scheduler().interval(AnalysisType::WritingStyle), 36_000);
    }

    #[tokio::test]
    async fn deep_analysis_bypasses_gate_for_deep_types_only() {
        let sink = Arc::new(CollectingSink::default());
        let e = engine(sink.clone());
        let plot = Arc::new(StubProcessor::new(AnalysisType::PlotConsistency));
        let style = Arc::new(StubProcessor::new(AnalysisType::WritingStyle));
        e.register_processor(plot.clone());
        e.register_processor(style.clone());

        let ran = e.deep_analysis("doc-1", "whole document").await;
        assert_eq!(ran, 1);
        assert_eq!(plot.calls.load(Ordering::SeqCst), 1);
        assert_eq!(style.calls.load(Ordering::SeqCst), 0);

        let results = sink.results.lock().unwrap();
        assert_eq!(results[0].document_id.as_deref(), Some("doc-1"));
        assert_eq!(e.stats().deep_runs, 1);
    }

    #[tokio::test]
    async fn deep_analysis_runs_processors_by_priority() {
        let sink = Arc::new(CollectingSink::default());
        let e = engine(sink.clone());
        e.register_processor(Arc::new(StubProcessor {
            priority: Some(10),
            ..StubProcessor::new(AnalysisType::PlotConsistency)
        }));
        e.register_processor(Arc::new(StubProcessor::new(AnalysisType::WorldBuilding)));
        e.register_processor(Arc::new(StubProcessor::new(AnalysisType::CharacterDevelopment)));

        assert_eq!(e.deep_analysis("doc", "whole document").await, 3);
        let order: Vec<AnalysisType> = sink
            .results
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.analysis_type)
            .collect();
        assert_eq!(
            order,
            vec![
                AnalysisType::CharacterDevelopment,
                AnalysisType::WorldBuilding,
                AnalysisType::PlotConsistency,
            ]
        );
    }

    #[tokio::test]
    async fn re_registering_a_type_replaces_processor() {
        let e = engine(Arc::new(LogSink));
        assert!(
            e.register_processor(Arc::new(StubProcessor::new(AnalysisType::Theme)))
                .is_none()
        );
        assert!(
            e.register_processor(Arc::new(StubProcessor::new(AnalysisType::Theme)))
                .is_some()
        );
        assert!(e.has_processor(AnalysisType::Theme));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_runs_deep_analysis_on_idle_and_stops() {
        let sink = Arc::new(CollectingSink::default());
        let e = engine(sink.clone());
        e.register_processor(Arc::new(StubProcessor::new(AnalysisType::CharacterDevelopment)));

        let runner = e.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        e.on_idle(IdleSignal {
            document_id: "doc".into(),
            content: "full text".into(),
            last_edit_at: Utc::now(),
        });
        for _ in 0..10 {
            if !sink.results.lock().unwrap().is_empty() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.results.lock().unwrap().len(), 1);

        e.stop();
        handle.await.unwrap();
        assert_eq!(e.stats().deep_runs, 1);
    }
}
