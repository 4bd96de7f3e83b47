use crate::analysis::TextSpan;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisplayLevel {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineComment {
    pub feedback_id: String,
    pub text: String,
    pub range: TextSpan,
    pub level: DisplayLevel,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusNotification {
    pub feedback_id: String,
    pub text: String,
    pub level: DisplayLevel,
    pub duration_ms: u64,
}

/// Identifies a status notification currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationHandle(pub u64);

type SurfaceFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// The editor UI as seen by delivery strategies.
pub trait FeedbackSurface: Send + Sync {
    fn show_inline_comment<'a>(&'a self, comment: &'a InlineComment) -> SurfaceFuture<'a, ()>;

    fn show_status<'a>(
        &'a self,
        notification: &'a StatusNotification,
    ) -> SurfaceFuture<'a, NotificationHandle>;

    fn clear_status(&self, handle: NotificationHandle) -> SurfaceFuture<'_, ()>;
}

/// Surface for headless runs: every delivery becomes a log line.
#[derive(Debug, Default)]
pub struct LogSurface {
    next_handle: AtomicU64,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackSurface for LogSurface {
    fn show_inline_comment<'a>(&'a self, comment: &'a InlineComment) -> SurfaceFuture<'a, ()> {
        Box::pin(async move {
            tracing::info!(
                feedback_id = %comment.feedback_id,
                level = %comment.level,
                start = comment.range.start,
                end = comment.range.end,
                source = %comment.source,
                "inline comment: {}",
                comment.text
            );
            Ok(())
        })
    }

    fn show_status<'a>(
        &'a self,
        notification: &'a StatusNotification,
    ) -> SurfaceFuture<'a, NotificationHandle> {
        let handle = NotificationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        Box::pin(async move {
            tracing::info!(
                feedback_id = %notification.feedback_id,
                duration_ms = notification.duration_ms,
                "status: {}",
                notification.text
            );
            Ok(handle)
        })
    }

    fn clear_status(&self, handle: NotificationHandle) -> SurfaceFuture<'_, ()> {
        Box::pin(async move {
            tracing::debug!(handle = handle.0, "status cleared");
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct Recorded {
    comments: Vec<InlineComment>,
    statuses: Vec<StatusNotification>,
    active: Option<(NotificationHandle, String)>,
    cleared: Vec<NotificationHandle>,
    next_handle: u64,
}

/// In-memory surface that keeps everything shown on it.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    recorded: Mutex<Recorded>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inline_comments(&self) -> Vec<InlineComment> {
        self.recorded
            .lock()
            .map(|r| r.comments.clone())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<StatusNotification> {
        self.recorded
            .lock()
            .map(|r| r.statuses.clone())
            .unwrap_or_default()
    }

    /// Text of the status notification currently shown.
    pub fn active_status(&self) -> Option<String> {
        self.recorded
            .lock()
            .ok()
            .and_then(|r| r.active.as_ref().map(|(_, text)| text.clone()))
    }

    pub fn cleared(&self) -> Vec<NotificationHandle> {
        self.recorded
            .lock()
            .map(|r| r.cleared.clone())
            .unwrap_or_default()
    }
}

impl FeedbackSurface for RecordingSurface {
    fn show_inline_comment<'a>(&'a self, comment: &'a InlineComment) -> SurfaceFuture<'a, ()> {
        if let Ok(mut r) = self.recorded.lock() {
            r.comments.push(comment.clone());
        }
        Box::pin(async { Ok(()) })
    }

    fn show_status<'a>(
        &'a self,
        notification: &'a StatusNotification,
    ) -> SurfaceFuture<'a, NotificationHandle> {
        let result = self
            .recorded
            .lock()
            .map(|mut r| {
                r.next_handle += 1;
                let handle = NotificationHandle(r.next_handle);
                r.statuses.push(notification.clone());
                r.active = Some((handle, notification.text.clone()));
                handle
            })
            .map_err(|_| anyhow::anyhow!("recording surface poisoned"));
        Box::pin(async move { result })
    }

    fn clear_status(&self, handle: NotificationHandle) -> SurfaceFuture<'_, ()> {
        if let Ok(mut r) = self.recorded.lock() {
            if r.active.as_ref().is_some_and(|(active, _)| *active == handle) {
                r.active = None;
            }
            r.cleared.push(handle);
        }
        Box::pin(async { Ok(()) })
    }
}
