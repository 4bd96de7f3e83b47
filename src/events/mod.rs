pub mod aggregator;
pub mod classify;
pub mod dispatcher;
pub mod types;

pub use aggregator::{ChangeAggregator, IdleSignal, WatchSignal};
pub use dispatcher::{CallbackListener, DispatcherStats, EventDispatcher, EventListener, ListenerId};
pub use types::{
    ChangeBatch, ContentChange, ContextMetadata, CursorPosition, EventPayload, Priority,
    SurroundingText, WritingContext, WritingEvent, WritingEventType,
};
