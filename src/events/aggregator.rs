use super::types::{ChangeBatch, ContentChange};
use crate::config::AggregatorConfig;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

const DISARMED: Duration = Duration::from_secs(86_400);

/// Fired once after the editor has been quiet for the idle threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct IdleSignal {
    pub document_id: String,
    pub content: String,
    pub last_edit_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchSignal {
    Batch(ChangeBatch),
    Idle(IdleSignal),
}

/// Debounces raw edits into per-document change batches and detects idle
/// periods.
///
/// Every edit re-arms both the quiet timer and the idle timer; only one of
/// each is live at a time. When the quiet timer fires, edits accumulated
/// since the last emission are merged last-write-wins per document.
pub struct ChangeAggregator {
    quiet: Duration,
    idle: Duration,
    pending: Vec<ChangeBatch>,
    latest: Option<ContentChange>,
}

impl ChangeAggregator {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            quiet: Duration::from_millis(config.quiet_ms),
            idle: Duration::from_millis(config.idle_ms),
            pending: Vec::new(),
            latest: None,
        }
    }

    /// Record an edit. Later edits to the same document supersede earlier
    /// ones; the batch remembers how many edits it absorbed.
    pub fn push(&mut self, change: ContentChange) {
        self.latest = Some(change.clone());
        if let Some(batch) = self
            .pending
            .iter_mut()
            .find(|batch| batch.change.document_id == change.document_id)
        {
            batch.edits += 1;
            batch.change = change;
            return;
        }
        self.pending.push(ChangeBatch {
            first_edit_at: change.timestamp,
            change,
            edits: 1,
        });
    }

    /// Take every pending batch, in order of each document's first edit.
    pub fn flush(&mut self) -> Vec<ChangeBatch> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn idle_signal(&self) -> Option<IdleSignal> {
        self.latest.as_ref().map(|change| IdleSignal {
            document_id: change.document_id.clone(),
            content: change.content.clone(),
            last_edit_at: change.timestamp,
        })
    }

    /// Consume edits until cancelled or the edit channel closes. Pending
    /// edits are flushed before returning.
    pub async fn run(
        mut self,
        mut edits: mpsc::Receiver<ContentChange>,
        signals: mpsc::Sender<WatchSignal>,
        cancel: CancellationToken,
    ) {
        let mut quiet_deadline: Option<Instant> = None;
        let mut idle_deadline: Option<Instant> = None;

        loop {
            let quiet_at = quiet_deadline.unwrap_or_else(|| Instant::now() + DISARMED);
            let idle_at = idle_deadline.unwrap_or_else(|| Instant::now() + DISARMED);

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                received = edits.recv() => {
                    let Some(change) = received else { break };
                    self.push(change);
                    let now = Instant::now();
                    quiet_deadline = Some(now + self.quiet);
                    idle_deadline = Some(now + self.idle);
                }
                () = time::sleep_until(quiet_at), if quiet_deadline.is_some() => {
                    quiet_deadline = None;
                    if !self.emit_batches(&signals).await {
                        return;
                    }
                }
                () = time::sleep_until(idle_at), if idle_deadline.is_some() => {
                    idle_deadline = None;
                    if let Some(signal) = self.idle_signal() {
                        tracing::debug!(document_id = %signal.document_id, "editor idle");
                        if signals.send(WatchSignal::Idle(signal)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }

        self.emit_batches(&signals).await;
    }

    async fn emit_batches(&mut self, signals: &mpsc::Sender<WatchSignal>) -> bool {
        for batch in self.flush() {
            tracing::debug!(
                document_id = %batch.change.document_id,
                edits = batch.edits,
                "emitting change batch"
            );
            if signals.send(WatchSignal::Batch(batch)).await.is_err() {
                tracing::warn!("change signal receiver dropped; stopping aggregator");
                return false;
            }
        }
        true
    }
}
