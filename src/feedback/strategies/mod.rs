pub mod inline_comment;
pub mod status_bar;

pub use inline_comment::InlineCommentStrategy;
pub use status_bar::StatusBarStrategy;

use super::surface::FeedbackSurface;
use super::types::FeedbackStrategy;
use std::sync::Arc;

/// Strategies registered by default, all drawing on `surface`.
pub fn reference_strategies(surface: &Arc<dyn FeedbackSurface>) -> Vec<Arc<dyn FeedbackStrategy>> {
    vec![
        Arc::new(InlineCommentStrategy::new(Arc::clone(surface))),
        Arc::new(StatusBarStrategy::new(Arc::clone(surface))),
    ]
}
