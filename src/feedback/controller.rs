use super::patterns::{UserActivityMonitor, UserPatternTracker};
use super::policy::{
    ArchiveReason, ArchivedFeedback, DeliveryRecovery, RecoveryAction, RequeueRecovery,
    RetryPolicy,
};
use super::types::{
    Feedback, FeedbackResponse, FeedbackStrategy, MAX_FEEDBACK_PRIORITY, StrategyKind,
};
use crate::config::FeedbackConfig;
use crate::error::DeliveryError;
use crate::monitor::LoopHeartbeat;
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::util::{PriorityQueue, elapsed_ms};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

const HIGH_ACCEPTANCE: f64 = 0.7;
const SLOWDOWN_FACTOR: f64 = 1.5;
const SPEEDUP_FACTOR: f64 = 0.75;

#[derive(Debug, Clone)]
struct QueuedFeedback {
    feedback: Feedback,
    attempts: u32,
    not_before: DateTime<Utc>,
}

/// Why an item was not handed to a strategy this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    BadTime,
    UserBusy,
    LowPriority,
    NotReceptive,
    NoStrategy,
}

impl HoldReason {
    /// Holds that clear up by themselves as the writer's state changes.
    /// They are re-checked every pass without spending retry attempts;
    /// only relevance ages them out.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::BadTime | Self::UserBusy | Self::NotReceptive)
    }
}

enum Decision {
    Deliver(Arc<dyn FeedbackStrategy>),
    Hold(HoldReason),
    Archive(ArchiveReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub delivered: usize,
    pub requeued: usize,
    pub archived: usize,
    pub deferred: usize,
    /// Items kept back by a transient gate; no attempt was spent.
    pub held: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerStats {
    pub queued: usize,
    pub delivered: u64,
    pub requeued: u64,
    pub archived: u64,
    pub delivery_failures: u64,
    pub interval_ms: u64,
    pub acceptance_rate: Option<f64>,
}

struct ControllerState {
    queue: PriorityQueue<QueuedFeedback>,
    strategies: Vec<Arc<dyn FeedbackStrategy>>,
    patterns: UserPatternTracker,
    activity: UserActivityMonitor,
    archive: VecDeque<ArchivedFeedback>,
    interval_ms: u64,
    delivered: u64,
    requeued: u64,
    archived: u64,
    delivery_failures: u64,
}

struct ControllerInner {
    state: Mutex<ControllerState>,
    config: FeedbackConfig,
    policy: RetryPolicy,
    recovery: Arc<dyn DeliveryRecovery>,
    observer: Arc<dyn Observer>,
    heartbeat: Arc<LoopHeartbeat>,
    shutdown: CancellationToken,
}

/// Decides when and how queued feedback reaches the writer.
///
/// Each pass drains the queue most urgent first. An item is delivered only
/// when the timing is right, the writer is receptive and the item is still
/// relevant; otherwise it backs off and retries until its attempts run out.
#[derive(Clone)]
pub struct FeedbackController {
    inner: Arc<ControllerInner>,
}

fn queue_key(priority: u8) -> u32 {
    u32::from(MAX_FEEDBACK_PRIORITY - priority.min(MAX_FEEDBACK_PRIORITY))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale(ms: u64, factor: f64) -> u64 {
    ((ms as f64) * factor).round() as u64
}

impl FeedbackController {
    pub fn new(config: &FeedbackConfig, observer: Arc<dyn Observer>) -> Self {
        Self::with_recovery(config, Arc::new(RequeueRecovery), observer)
    }

    pub fn with_recovery(
        config: &FeedbackConfig,
        recovery: Arc<dyn DeliveryRecovery>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let interval_ms = config
            .interval_ms
            .clamp(config.min_interval_ms, config.max_interval_ms);
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(ControllerState {
                    queue: PriorityQueue::new(),
                    strategies: Vec::new(),
                    patterns: UserPatternTracker::new(config),
                    activity: UserActivityMonitor::new(config),
                    archive: VecDeque::new(),
                    interval_ms,
                    delivered: 0,
                    requeued: 0,
                    archived: 0,
                    delivery_failures: 0,
                }),
                config: config.clone(),
                policy: RetryPolicy::from_config(config),
                recovery,
                observer,
                heartbeat: Arc::new(LoopHeartbeat::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register a strategy. A strategy of an already registered kind takes
    /// the old one's place in the registration order.
    pub fn add_strategy(&self, strategy: Arc<dyn FeedbackStrategy>) {
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        let kind = strategy.kind();
        if let Some(slot) = state.strategies.iter_mut().find(|s| s.kind() == kind) {
            *slot = strategy;
        } else {
            state.strategies.push(strategy);
        }
    }

    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.inner
            .state
            .lock()
            .map(|state| state.strategies.iter().map(|s| s.kind()).collect())
            .unwrap_or_default()
    }

    pub fn queue_feedback(&self, feedback: Feedback) {
        self.queue_feedback_at(feedback, Utc::now());
    }

    pub fn queue_feedback_at(&self, feedback: Feedback, now: DateTime<Utc>) {
        let depth = match self.inner.state.lock() {
            Ok(mut state) => {
                let key = queue_key(feedback.priority);
                state.queue.enqueue(
                    QueuedFeedback {
                        feedback,
                        attempts: 0,
                        not_before: now,
                    },
                    key,
                );
                state.queue.len()
            }
            Err(_) => return,
        };
        self.inner.observer.record_metric(&ObserverMetric::QueueDepth {
            queue: "feedback".into(),
            depth: depth as u64,
        });
    }

    pub fn queue_depth(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|state| state.queue.len())
            .unwrap_or(0)
    }

    /// Best strategy for `feedback`: the highest priority among those that
    /// accept it, earliest registered on ties.
    pub fn select_strategy(&self, feedback: &Feedback) -> Option<Arc<dyn FeedbackStrategy>> {
        let state = self.inner.state.lock().ok()?;
        Self::select_from(&state.strategies, feedback)
    }

    fn select_from(
        strategies: &[Arc<dyn FeedbackStrategy>],
        feedback: &Feedback,
    ) -> Option<Arc<dyn FeedbackStrategy>> {
        let mut best: Option<&Arc<dyn FeedbackStrategy>> = None;
        for strategy in strategies.iter().filter(|s| s.should_deliver(feedback)) {
            if best.is_none_or(|b| strategy.priority() > b.priority()) {
                best = Some(strategy);
            }
        }
        best.cloned()
    }

    pub fn should_deliver(&self, feedback: &Feedback) -> bool {
        self.should_deliver_at(feedback, Utc::now())
    }

    pub fn should_deliver_at(&self, feedback: &Feedback, now: DateTime<Utc>) -> bool {
        self.inner
            .state
            .lock()
            .is_ok_and(|state| self.gate(&state, feedback, now).is_ok())
    }

    fn is_relevant(&self, feedback: &Feedback, now: DateTime<Utc>) -> bool {
        elapsed_ms(feedback.context.timestamp, now)
            <= self.inner.config.max_age_secs.saturating_mul(1_000)
    }

    fn is_receptive(&self, state: &ControllerState, now: DateTime<Utc>) -> bool {
        if state.patterns.negative_streak() < self.inner.config.rejection_streak {
            return true;
        }
        state.patterns.last_response_at().is_none_or(|last| {
            elapsed_ms(last, now) >= self.inner.config.cooldown_secs.saturating_mul(1_000)
        })
    }

    fn gate(
        &self,
        state: &ControllerState,
        feedback: &Feedback,
        now: DateTime<Utc>,
    ) -> Result<(), Decision> {
        if !self.is_relevant(feedback, now) {
            return Err(Decision::Archive(ArchiveReason::Stale));
        }
        if !state.patterns.is_good_time_at(now) {
            return Err(Decision::Hold(HoldReason::BadTime));
        }
        if !state.activity.is_user_in_break_at(now) {
            return Err(Decision::Hold(HoldReason::UserBusy));
        }
        if feedback.priority < self.inner.config.min_priority {
            return Err(Decision::Hold(HoldReason::LowPriority));
        }
        if !self.is_receptive(state, now) {
            return Err(Decision::Hold(HoldReason::NotReceptive));
        }
        Ok(())
    }

    fn decide(&self, feedback: &Feedback, now: DateTime<Utc>) -> Decision {
        let Ok(state) = self.inner.state.lock() else {
            return Decision::Hold(HoldReason::NoStrategy);
        };
        if let Err(decision) = self.gate(&state, feedback, now) {
            return decision;
        }
        match Self::select_from(&state.strategies, feedback) {
            Some(strategy) => Decision::Deliver(strategy),
            None => Decision::Hold(HoldReason::NoStrategy),
        }
    }

    fn archive(&self, item: QueuedFeedback, reason: ArchiveReason, now: DateTime<Utc>) {
        tracing::debug!(feedback_id = %item.feedback.id, %reason, "feedback archived");
        self.inner.observer.record_event(&ObserverEvent::FeedbackArchived {
            feedback_id: item.feedback.id.clone(),
            reason: reason.to_string(),
        });
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        if state.archive.len() >= self.inner.config.archive_capacity {
            state.archive.pop_front();
        }
        state.archive.push_back(ArchivedFeedback {
            feedback: item.feedback,
            reason,
            attempts: item.attempts,
            archived_at: now,
        });
        state.archived += 1;
    }

    /// Count an attempt; back off and return the item, or archive it once
    /// attempts run out.
    fn requeue_or_archive(
        &self,
        mut item: QueuedFeedback,
        now: DateTime<Utc>,
    ) -> Option<QueuedFeedback> {
        item.attempts += 1;
        if self.inner.policy.exhausted(item.attempts) {
            self.archive(item, ArchiveReason::Exhausted, now);
            return None;
        }
        let backoff = self.inner.policy.backoff_ms(item.attempts);
        item.not_before =
            now + chrono::Duration::milliseconds(i64::try_from(backoff).unwrap_or(i64::MAX));
        self.inner.observer.record_event(&ObserverEvent::FeedbackRequeued {
            feedback_id: item.feedback.id.clone(),
            attempts: item.attempts,
        });
        Some(item)
    }

    pub async fn process_queue(&self) -> PassReport {
        self.process_queue_at(Utc::now()).await
    }

    /// One delivery pass over everything queued at `now`.
    pub async fn process_queue_at(&self, now: DateTime<Utc>) -> PassReport {
        let items = match self.inner.state.lock() {
            Ok(mut state) => state.queue.drain_ordered(),
            Err(_) => return PassReport::default(),
        };

        let mut report = PassReport::default();
        let mut back_to_queue = Vec::new();

        for item in items {
            if item.not_before > now {
                report.deferred += 1;
                back_to_queue.push(item);
                continue;
            }

            match self.decide(&item.feedback, now) {
                Decision::Deliver(strategy) => {
                    match strategy.deliver(&item.feedback).await {
                        Ok(()) => {
                            report.delivered += 1;
                            self.inner.observer.record_event(&ObserverEvent::FeedbackDelivered {
                                strategy: strategy.kind().to_string(),
                                feedback_type: item.feedback.feedback_type.to_string(),
                            });
                            if let Ok(mut state) = self.inner.state.lock() {
                                state.delivered += 1;
                            }
                        }
                        Err(error) => {
                            let error = DeliveryError::Strategy {
                                strategy: strategy.kind().to_string(),
                                feedback_id: item.feedback.id.clone(),
                                message: format!("{error:#}"),
                            };
                            tracing::warn!("{error}");
                            if let Ok(mut state) = self.inner.state.lock() {
                                state.delivery_failures += 1;
                            }
                            match self.inner.recovery.recover(&item.feedback, &error) {
                                RecoveryAction::Requeue => {
                                    if let Some(item) = self.requeue_or_archive(item, now) {
                                        report.requeued += 1;
                                        back_to_queue.push(item);
                                    } else {
                                        report.archived += 1;
                                    }
                                }
                                RecoveryAction::Archive => {
                                    let mut item = item;
                                    item.attempts += 1;
                                    self.archive(item, ArchiveReason::Abandoned, now);
                                    report.archived += 1;
                                }
                            }
                        }
                    }
                }
                Decision::Hold(reason) if reason.is_transient() => {
                    tracing::trace!(feedback_id = %item.feedback.id, ?reason, "feedback held");
                    report.held += 1;
                    back_to_queue.push(item);
                }
                Decision::Hold(reason) => {
                    tracing::trace!(feedback_id = %item.feedback.id, ?reason, "feedback undeliverable");
                    if let Some(item) = self.requeue_or_archive(item, now) {
                        report.requeued += 1;
                        back_to_queue.push(item);
                    } else {
                        report.archived += 1;
                    }
                }
                Decision::Archive(reason) => {
                    self.archive(item, reason, now);
                    report.archived += 1;
                }
            }
        }

        if let Ok(mut state) = self.inner.state.lock() {
            state.requeued += report.requeued as u64;
            for item in back_to_queue {
                let key = queue_key(item.feedback.priority);
                state.queue.enqueue(item, key);
            }
        }
        report
    }

    pub fn record_response(&self, response: FeedbackResponse) {
        self.record_response_at(response, Utc::now());
    }

    /// Feed a writer response into the pattern tracker and retune the pass
    /// interval from the overall acceptance rate.
    pub fn record_response_at(&self, response: FeedbackResponse, now: DateTime<Utc>) {
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        state.patterns.record_response_at(response, now);

        let config = &self.inner.config;
        let Some(rate) = state.patterns.acceptance_rate() else {
            return;
        };
        let current = state.interval_ms;
        let next = if rate < config.min_acceptance_rate {
            scale(current, SLOWDOWN_FACTOR)
        } else if rate >= HIGH_ACCEPTANCE {
            scale(current, SPEEDUP_FACTOR)
        } else {
            current
        }
        .clamp(config.min_interval_ms, config.max_interval_ms);

        if next != current {
            tracing::debug!(from_ms = current, to_ms = next, rate, "feedback interval retuned");
            state.interval_ms = next;
        }
    }

    pub fn record_activity(&self) {
        self.record_activity_at(Utc::now());
    }

    pub fn record_activity_at(&self, now: DateTime<Utc>) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.activity.record_activity_at(now);
        }
    }

    pub fn is_user_in_break_at(&self, now: DateTime<Utc>) -> bool {
        self.inner
            .state
            .lock()
            .is_ok_and(|state| state.activity.is_user_in_break_at(now))
    }

    pub fn interval_ms(&self) -> u64 {
        self.inner
            .state
            .lock()
            .map(|state| state.interval_ms)
            .unwrap_or(self.inner.config.interval_ms)
    }

    pub fn set_interval_ms(&self, ms: u64) -> u64 {
        let clamped = ms.clamp(self.inner.config.min_interval_ms, self.inner.config.max_interval_ms);
        if let Ok(mut state) = self.inner.state.lock() {
            state.interval_ms = clamped;
        }
        clamped
    }

    pub fn archived(&self) -> Vec<ArchivedFeedback> {
        self.inner
            .state
            .lock()
            .map(|state| state.archive.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> ControllerStats {
        self.inner
            .state
            .lock()
            .map(|state| ControllerStats {
                queued: state.queue.len(),
                delivered: state.delivered,
                requeued: state.requeued,
                archived: state.archived,
                delivery_failures: state.delivery_failures,
                interval_ms: state.interval_ms,
                acceptance_rate: state.patterns.acceptance_rate(),
            })
            .unwrap_or_default()
    }

    pub fn heartbeat(&self) -> Arc<LoopHeartbeat> {
        Arc::clone(&self.inner.heartbeat)
    }

    pub async fn run(&self) {
        let inner = &self.inner;
        inner.heartbeat.mark_started();
        tracing::info!("feedback controller started");

        while !inner.shutdown.is_cancelled() {
            let report = self.process_queue().await;
            if report.delivered > 0 || report.archived > 0 {
                tracing::debug!(
                    delivered = report.delivered,
                    requeued = report.requeued,
                    archived = report.archived,
                    deferred = report.deferred,
                    held = report.held,
                    "feedback pass"
                );
            }
            inner.heartbeat.beat();

            let sleep = Duration::from_millis(self.interval_ms());
            tokio::select! {
                () = inner.shutdown.cancelled() => break,
                () = time::sleep(sleep) => {}
            }
        }

        inner.heartbeat.mark_stopped();
        tracing::info!("feedback controller stopped");
    }

    pub fn stop(&self) {
        self.inner.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::strategies::{InlineCommentStrategy, StatusBarStrategy};
    use crate::feedback::surface::{FeedbackSurface, RecordingSurface};
    use crate::feedback::types::{FeedbackType, ResponseAction};
    use crate::observability::NoopObserver;
    use std::future::Future;
    use std::pin::Pin;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_780_000_000 + secs, 0).unwrap()
    }

    fn controller(config: FeedbackConfig) -> (FeedbackController, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::new());
        let c = FeedbackController::new(&config, Arc::new(NoopObserver));
        let shared: Arc<dyn FeedbackSurface> = surface.clone();
        c.add_strategy(Arc::new(InlineCommentStrategy::new(Arc::clone(&shared))));
        c.add_strategy(Arc::new(StatusBarStrategy::new(shared)));
        (c, surface)
    }

    fn fb(priority: u8, at: DateTime<Utc>) -> Feedback {
        let mut f = Feedback::new(FeedbackType::StyleSuggestion, "Vary sentence length", priority);
        f.context.timestamp = at;
        f
    }

    struct FailingStrategy;

    impl FeedbackStrategy for FailingStrategy {
        fn kind(&self) -> StrategyKind {
            StrategyKind::StatusBar
        }

        fn should_deliver(&self, _feedback: &Feedback) -> bool {
            true
        }

        fn deliver<'a>(
            &'a self,
            _feedback: &'a Feedback,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async { anyhow::bail!("editor went away") })
        }

        fn priority(&self) -> u32 {
            1
        }
    }

    #[test]
    fn strategy_selection_matches_location_and_priority() {
        let (c, _) = controller(FeedbackConfig::default());
        let urgent = fb(8, t(0)).at(3, 9);
        let minor = fb(3, t(0));
        let middling = fb(6, t(0));

        assert_eq!(
            c.select_strategy(&urgent).map(|s| s.kind()),
            Some(StrategyKind::InlineComment)
        );
        assert_eq!(
            c.select_strategy(&minor).map(|s| s.kind()),
            Some(StrategyKind::StatusBar)
        );
        assert!(c.select_strategy(&middling).is_none());
    }

    #[test]
    fn same_kind_strategy_replaces_in_place() {
        let (c, _) = controller(FeedbackConfig::default());
        c.add_strategy(Arc::new(FailingStrategy));
        assert_eq!(
            c.strategy_kinds(),
            vec![StrategyKind::InlineComment, StrategyKind::StatusBar]
        );
        // The failing replacement accepts everything, yet inline still wins
        // for located urgent feedback by priority.
        assert_eq!(
            c.select_strategy(&fb(9, t(0)).at(0, 1)).map(|s| s.kind()),
            Some(StrategyKind::InlineComment)
        );
    }

    struct NamedStrategy {
        name: &'static str,
        priority: u32,
    }

    impl FeedbackStrategy for NamedStrategy {
        fn kind(&self) -> StrategyKind {
            StrategyKind::custom(self.name)
        }

        fn should_deliver(&self, feedback: &Feedback) -> bool {
            feedback.context.location.is_none()
        }

        fn deliver<'a>(
            &'a self,
            _feedback: &'a Feedback,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }

        fn priority(&self) -> u32 {
            self.priority
        }
    }

    #[test]
    fn custom_strategies_extend_the_registry() {
        let (c, _) = controller(FeedbackConfig::default());
        c.add_strategy(Arc::new(NamedStrategy {
            name: "toast",
            priority: 0,
        }));
        c.add_strategy(Arc::new(NamedStrategy {
            name: "sidebar",
            priority: 0,
        }));
        assert_eq!(
            c.strategy_kinds(),
            vec![
                StrategyKind::InlineComment,
                StrategyKind::StatusBar,
                StrategyKind::custom("toast"),
                StrategyKind::custom("sidebar"),
            ]
        );
        // Status bar still outranks the lower-priority additions.
        assert_eq!(
            c.select_strategy(&fb(3, t(0))).map(|s| s.kind()),
            Some(StrategyKind::StatusBar)
        );
        // Priority 6 without a location: only the custom pair accepts it.
        assert_eq!(
            c.select_strategy(&fb(6, t(0))).map(|s| s.kind()),
            Some(StrategyKind::custom("toast"))
        );
    }

    #[test]
    fn equal_priority_goes_to_earliest_registered() {
        let c = FeedbackController::new(&FeedbackConfig::default(), Arc::new(NoopObserver));
        for name in ["first", "second", "third"] {
            c.add_strategy(Arc::new(NamedStrategy { name, priority: 5 }));
        }
        assert_eq!(
            c.select_strategy(&fb(4, t(0))).map(|s| s.kind()),
            Some(StrategyKind::custom("first"))
        );

        // Re-registering a name keeps its slot in the order.
        c.add_strategy(Arc::new(NamedStrategy {
            name: "first",
            priority: 5,
        }));
        assert_eq!(c.strategy_kinds().len(), 3);
        assert_eq!(
            c.select_strategy(&fb(4, t(0))).map(|s| s.kind()),
            Some(StrategyKind::custom("first"))
        );

        c.add_strategy(Arc::new(NamedStrategy {
            name: "third",
            priority: 6,
        }));
        assert_eq!(
            c.select_strategy(&fb(4, t(0))).map(|s| s.kind()),
            Some(StrategyKind::custom("third"))
        );
    }

    #[tokio::test]
    async fn delivers_most_urgent_first_during_break() {
        let (c, surface) = controller(FeedbackConfig::default());
        let minor = fb(2, t(0));
        let moderate = fb(4, t(0)).with_related("later");
        c.queue_feedback_at(minor.clone(), t(0));
        c.queue_feedback_at(moderate.clone(), t(0));
        c.queue_feedback_at(fb(9, t(0)).at(0, 5), t(0));

        let report = c.process_queue_at(t(1)).await;
        assert_eq!(report.delivered, 3);
        assert_eq!(surface.inline_comments().len(), 1);
        let statuses = surface.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].feedback_id, moderate.id);
        assert_eq!(statuses[1].feedback_id, minor.id);
        assert_eq!(surface.active_status().as_deref(), Some("Vary sentence length"));
        assert_eq!(c.queue_depth(), 0);
        assert_eq!(c.stats().delivered, 3);
    }

    #[tokio::test]
    async fn busy_writer_gets_nothing_until_a_pause() {
        let (c, surface) = controller(FeedbackConfig::default());
        c.record_activity_at(t(10));
        c.queue_feedback_at(fb(3, t(10)), t(10));

        let report = c.process_queue_at(t(11)).await;
        assert_eq!(report.held, 1);
        assert_eq!(report.requeued, 0);
        assert!(surface.statuses().is_empty());

        // Writer paused for 3s by now.
        let report = c.process_queue_at(t(14)).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(surface.statuses().len(), 1);
    }

    #[tokio::test]
    async fn long_typing_session_does_not_exhaust_retries() {
        let (c, surface) = controller(FeedbackConfig::default());
        c.queue_feedback_at(fb(3, t(0)), t(0));

        // Writer keeps typing for a minute; passes run every second.
        for sec in 0..60 {
            c.record_activity_at(t(sec));
            let report = c.process_queue_at(t(sec)).await;
            assert_eq!(report.held, 1, "second {sec}");
        }
        assert!(c.archived().is_empty());
        assert_eq!(c.stats().requeued, 0);

        let report = c.process_queue_at(t(63)).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(surface.statuses().len(), 1);
    }

    #[tokio::test]
    async fn undeliverable_feedback_is_archived_after_max_attempts() {
        let config = FeedbackConfig {
            max_attempts: 3,
            retry_base_ms: 1_000,
            retry_max_ms: 1_000,
            ..FeedbackConfig::default()
        };
        let (c, _) = controller(config);
        // Priority 6 without a location matches no strategy.
        c.queue_feedback_at(fb(6, t(0)), t(0));

        for step in 0..3 {
            c.process_queue_at(t(step * 2)).await;
        }
        assert_eq!(c.queue_depth(), 0);
        let archived = c.archived();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].reason, ArchiveReason::Exhausted);
        assert_eq!(archived[0].attempts, 3);
    }

    #[tokio::test]
    async fn stale_feedback_is_archived_immediately() {
        let (c, surface) = controller(FeedbackConfig::default());
        c.queue_feedback_at(fb(3, t(0)), t(0));
        let report = c.process_queue_at(t(1_801)).await;
        assert_eq!(report.archived, 1);
        assert!(surface.statuses().is_empty());
        assert_eq!(c.archived()[0].reason, ArchiveReason::Stale);
    }

    #[tokio::test]
    async fn rejection_streak_triggers_cooldown() {
        let (c, surface) = controller(FeedbackConfig::default());
        for i in 0..3 {
            let mut response = FeedbackResponse::new(format!("fb-{i}"), ResponseAction::Rejected);
            response.timestamp = t(i);
            c.record_response_at(response, t(i));
        }
        c.queue_feedback_at(fb(3, t(3)), t(3));
        assert!(!c.should_deliver_at(&fb(3, t(3)), t(3)));
        assert_eq!(c.process_queue_at(t(4)).await.held, 1);
        assert!(surface.statuses().is_empty());

        // Cool-down of 600s has passed since the last rejection.
        assert!(c.should_deliver_at(&fb(3, t(603)), t(603)));
    }

    #[tokio::test]
    async fn failed_delivery_is_requeued_by_default_recovery() {
        let c = FeedbackController::new(&FeedbackConfig::default(), Arc::new(NoopObserver));
        c.add_strategy(Arc::new(FailingStrategy));
        c.queue_feedback_at(fb(3, t(0)), t(0));

        let report = c.process_queue_at(t(0)).await;
        assert_eq!(report.requeued, 1);
        assert_eq!(c.stats().delivery_failures, 1);
        assert_eq!(c.queue_depth(), 1);
    }

    #[tokio::test]
    async fn archiving_recovery_gives_up_at_once() {
        struct GiveUp;
        impl DeliveryRecovery for GiveUp {
            fn recover(&self, _feedback: &Feedback, _error: &DeliveryError) -> RecoveryAction {
                RecoveryAction::Archive
            }
        }

        let c = FeedbackController::with_recovery(
            &FeedbackConfig::default(),
            Arc::new(GiveUp),
            Arc::new(NoopObserver),
        );
        c.add_strategy(Arc::new(FailingStrategy));
        c.queue_feedback_at(fb(3, t(0)), t(0));

        assert_eq!(c.process_queue_at(t(0)).await.archived, 1);
        assert_eq!(c.archived()[0].reason, ArchiveReason::Abandoned);
    }

    #[test]
    fn acceptance_retunes_interval_within_bounds() {
        let (c, _) = controller(FeedbackConfig::default());
        assert_eq!(c.interval_ms(), 1_000);

        c.record_response_at(FeedbackResponse::new("a", ResponseAction::Accepted), t(0));
        assert_eq!(c.interval_ms(), 750);

        for i in 0..20 {
            let response = FeedbackResponse::new(format!("r{i}"), ResponseAction::Rejected);
            c.record_response_at(response, t(i));
        }
        assert_eq!(c.interval_ms(), 30_000);

        assert_eq!(c.set_interval_ms(10), 250);
    }

    #[tokio::test]
    async fn archive_is_bounded() {
        let config = FeedbackConfig {
            archive_capacity: 2,
            ..FeedbackConfig::default()
        };
        let (c, _) = controller(config);
        for _ in 0..4 {
            c.queue_feedback_at(fb(3, t(0)), t(0));
        }
        let report = c.process_queue_at(t(5_000)).await;
        assert_eq!(report.archived, 4);
        assert_eq!(c.archived().len(), 2);
        assert_eq!(c.stats().archived, 4);
    }
}
