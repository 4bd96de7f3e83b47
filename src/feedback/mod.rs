pub mod controller;
pub mod patterns;
pub mod policy;
pub mod sink;
pub mod strategies;
pub mod surface;
pub mod types;

pub use controller::{ControllerStats, FeedbackController, HoldReason, PassReport};
pub use patterns::{HourBucket, UserActivityMonitor, UserPatternTracker};
pub use policy::{
    ArchiveReason, ArchivedFeedback, DeliveryRecovery, RecoveryAction, RequeueRecovery,
    RetryPolicy,
};
pub use sink::{FeedbackSink, feedback_type_for};
pub use strategies::{InlineCommentStrategy, StatusBarStrategy, reference_strategies};
pub use surface::{
    DisplayLevel, FeedbackSurface, InlineComment, LogSurface, NotificationHandle,
    RecordingSurface, StatusNotification,
};
pub use types::{
    Feedback, FeedbackContext, FeedbackMetadata, FeedbackResponse, FeedbackStrategy,
    FeedbackType, ResponseAction, StrategyKind,
};
