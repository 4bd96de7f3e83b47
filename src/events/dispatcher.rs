use super::classify::event_from_batch;
use super::types::{ChangeBatch, WritingEvent, WritingEventType};
use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::monitor::LoopHeartbeat;
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use crate::util::PriorityQueue;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

/// Receives dispatched events of the types it was registered for.
pub trait EventListener: Send + Sync {
    /// Listener name used in logs
    fn name(&self) -> &str;

    fn handle<'a>(
        &'a self,
        event: &'a WritingEvent,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Handle returned by [`EventDispatcher::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub dispatched: u64,
    pub listener_failures: u64,
    pub queue_depth: usize,
}

type ListenerTable = HashMap<WritingEventType, Vec<(ListenerId, Arc<dyn EventListener>)>>;

struct DispatcherInner {
    listeners: Mutex<ListenerTable>,
    queue: Mutex<PriorityQueue<WritingEvent>>,
    wake: Notify,
    next_listener_id: AtomicU64,
    dispatched: AtomicU64,
    listener_failures: AtomicU64,
    poll: Duration,
    context_window_chars: usize,
    observer: Arc<dyn Observer>,
    heartbeat: Arc<LoopHeartbeat>,
    shutdown: CancellationToken,
}

/// Priority-ordered event pipeline.
///
/// Events dequeue strictly one at a time in priority order. Every listener
/// registered for the event's type runs concurrently, and the next event is
/// not dequeued until all of them have finished. Listener failures and
/// panics are logged and never stop the loop.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

impl EventDispatcher {
    pub fn new(config: &DispatcherConfig, observer: Arc<dyn Observer>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                listeners: Mutex::new(HashMap::new()),
                queue: Mutex::new(PriorityQueue::new()),
                wake: Notify::new(),
                next_listener_id: AtomicU64::new(1),
                dispatched: AtomicU64::new(0),
                listener_failures: AtomicU64::new(0),
                poll: Duration::from_millis(config.poll_ms.max(1)),
                context_window_chars: config.context_window_chars,
                observer,
                heartbeat: Arc::new(LoopHeartbeat::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register `listener` for `event_type`. Takes effect for events
    /// dispatched after this call.
    pub fn add_listener(
        &self,
        event_type: WritingEventType,
        listener: Arc<dyn EventListener>,
    ) -> ListenerId {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut table) = self.inner.listeners.lock() {
            table.entry(event_type).or_default().push((id, listener));
        }
        id
    }

    pub fn remove_listener(&self, event_type: WritingEventType, id: ListenerId) -> bool {
        let Ok(mut table) = self.inner.listeners.lock() else {
            return false;
        };
        let Some(listeners) = table.get_mut(&event_type) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, event_type: WritingEventType) -> usize {
        self.inner
            .listeners
            .lock()
            .map(|table| table.get(&event_type).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Turn a coalesced change batch into a typed event and enqueue it.
    /// Returns the new event's id.
    pub fn publish_change(&self, batch: &ChangeBatch) -> String {
        let event = event_from_batch(batch, self.inner.context_window_chars);
        let id = event.id.clone();
        self.publish(event);
        id
    }

    pub fn publish(&self, event: WritingEvent) {
        let priority = event.priority.rank();
        let depth = match self.inner.queue.lock() {
            Ok(mut queue) => {
                queue.enqueue(event, priority);
                queue.len()
            }
            Err(_) => return,
        };
        self.inner.observer.record_metric(&ObserverMetric::QueueDepth {
            queue: "events".into(),
            depth: depth as u64,
        });
        self.inner.wake.notify_one();
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            listener_failures: self.inner.listener_failures.load(Ordering::Relaxed),
            queue_depth: self.queue_depth(),
        }
    }

    pub fn heartbeat(&self) -> Arc<LoopHeartbeat> {
        Arc::clone(&self.inner.heartbeat)
    }

    fn next_event(&self) -> Option<WritingEvent> {
        self.inner.queue.lock().ok().and_then(|mut queue| queue.dequeue())
    }

    /// Drain the queue, dispatching events one at a time. Returns how many
    /// events were dispatched.
    pub async fn dispatch_pending(&self) -> usize {
        let mut count = 0;
        while let Some(event) = self.next_event() {
            self.dispatch_one(event).await;
            count += 1;
        }
        count
    }

    async fn dispatch_one(&self, event: WritingEvent) {
        let started = Instant::now();
        let event_type = event.event_type;
        let listeners: Vec<Arc<dyn EventListener>> = self
            .inner
            .listeners
            .lock()
            .map(|table| {
                table
                    .get(&event_type)
                    .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let listener_count = listeners.len();
        let event = Arc::new(event);
        let mut set = JoinSet::new();
        for listener in listeners {
            let event = Arc::clone(&event);
            set.spawn(async move {
                let result = listener.handle(&event).await;
                (listener.name().to_string(), result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok((_, Ok(()))) => None,
                Ok((name, Err(error))) => {
                    tracing::warn!(listener = %name, event_id = %event.id, "listener failed: {error:#}");
                    Some(DispatchError::ListenerFailed {
                        event_type: event_type.to_string(),
                        message: format!("{name}: {error}"),
                    })
                }
                Err(join_error) => {
                    tracing::error!(event_id = %event.id, "listener panicked: {join_error}");
                    Some(DispatchError::ListenerPanicked {
                        event_type: event_type.to_string(),
                    })
                }
            };

            if let Some(error) = failure {
                self.inner.listener_failures.fetch_add(1, Ordering::Relaxed);
                self.inner.observer.record_event(&ObserverEvent::ListenerFailed {
                    event_type: event_type.to_string(),
                    message: error.to_string(),
                });
            }
        }

        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
        let elapsed = started.elapsed();
        self.inner.observer.record_event(&ObserverEvent::EventDispatched {
            event_type: event_type.to_string(),
            listeners: listener_count,
            duration: elapsed,
        });
        self.inner
            .observer
            .record_metric(&ObserverMetric::ListenerLatency(elapsed));
    }

    /// Dispatch loop. Wakes on publish (or every poll interval) and drains
    /// the queue until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        let inner = &self.inner;
        inner.heartbeat.mark_started();
        tracing::info!("event dispatcher started");

        while !inner.shutdown.is_cancelled() {
            self.dispatch_pending().await;
            inner.heartbeat.beat();

            tokio::select! {
                () = inner.shutdown.cancelled() => break,
                () = inner.wake.notified() => {}
                () = time::sleep(inner.poll) => {}
            }
        }

        inner.heartbeat.mark_stopped();
        tracing::info!("event dispatcher stopped");
    }

    pub fn stop(&self) {
        self.inner.shutdown.cancel();
    }
}

/// Listener backed by a synchronous closure.
pub struct CallbackListener<F> {
    name: String,
    callback: F,
}

impl<F> CallbackListener<F>
where
    F: Fn(&WritingEvent) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<F> EventListener for CallbackListener<F>
where
    F: Fn(&WritingEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle<'a>(
        &'a self,
        event: &'a WritingEvent,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        let result = (self.callback)(event);
        Box::pin(async move { result })
    }
}
