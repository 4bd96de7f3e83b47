use crate::feedback::surface::{DisplayLevel, FeedbackSurface, InlineComment};
use crate::feedback::types::{Feedback, FeedbackStrategy, StrategyKind};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

const MIN_PRIORITY: u8 = 7;
const ERROR_PRIORITY: u8 = 9;

/// Anchors urgent, located feedback as a comment on the text it concerns.
pub struct InlineCommentStrategy {
    surface: Arc<dyn FeedbackSurface>,
}

impl InlineCommentStrategy {
    pub fn new(surface: Arc<dyn FeedbackSurface>) -> Self {
        Self { surface }
    }

    pub fn level_for(priority: u8) -> DisplayLevel {
        if priority >= ERROR_PRIORITY {
            DisplayLevel::Error
        } else if priority >= MIN_PRIORITY {
            DisplayLevel::Warning
        } else {
            DisplayLevel::Info
        }
    }
}

impl FeedbackStrategy for InlineCommentStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InlineComment
    }

    fn should_deliver(&self, feedback: &Feedback) -> bool {
        feedback.context.location.is_some() && feedback.priority >= MIN_PRIORITY
    }

    fn deliver<'a>(
        &'a self,
        feedback: &'a Feedback,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let range = feedback
                .context
                .location
                .ok_or_else(|| anyhow::anyhow!("feedback {} has no location", feedback.id))?;
            let comment = InlineComment {
                feedback_id: feedback.id.clone(),
                text: feedback.message.clone(),
                range,
                level: Self::level_for(feedback.priority),
                source: feedback.metadata.source.clone(),
            };
            self.surface.show_inline_comment(&comment).await
        })
    }

    fn priority(&self) -> u32 {
        3
    }
}
