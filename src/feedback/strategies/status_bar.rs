use crate::feedback::surface::{DisplayLevel, FeedbackSurface, NotificationHandle, StatusNotification};
use crate::feedback::types::{Feedback, FeedbackStrategy, StrategyKind};
use crate::util::truncate_with_ellipsis;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

const MAX_PRIORITY: u8 = 5;
const MAX_CHARS: usize = 50;
const DISPLAY_MS: u64 = 5_000;

/// Shows low-urgency, unanchored feedback in the status bar. A new
/// notification replaces the one on screen.
pub struct StatusBarStrategy {
    surface: Arc<dyn FeedbackSurface>,
    current: Mutex<Option<NotificationHandle>>,
}

impl StatusBarStrategy {
    pub fn new(surface: Arc<dyn FeedbackSurface>) -> Self {
        Self {
            surface,
            current: Mutex::new(None),
        }
    }

    pub fn format_message(message: &str) -> String {
        truncate_with_ellipsis(message, MAX_CHARS)
    }
}

impl FeedbackStrategy for StatusBarStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StatusBar
    }

    fn should_deliver(&self, feedback: &Feedback) -> bool {
        feedback.priority <= MAX_PRIORITY && feedback.context.location.is_none()
    }

    fn deliver<'a>(
        &'a self,
        feedback: &'a Feedback,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let previous = self.current.lock().ok().and_then(|mut current| current.take());
            if let Some(handle) = previous {
                self.surface.clear_status(handle).await?;
            }

            let notification = StatusNotification {
                feedback_id: feedback.id.clone(),
                text: Self::format_message(&feedback.message),
                level: DisplayLevel::Info,
                duration_ms: DISPLAY_MS,
            };
            let handle = self.surface.show_status(&notification).await?;
            if let Ok(mut current) = self.current.lock() {
                *current = Some(handle);
            }
            Ok(())
        })
    }

    fn priority(&self) -> u32 {
        1
    }
}
