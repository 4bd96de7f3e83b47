pub mod schema;

pub use schema::{
    AggregatorConfig, Config, DispatcherConfig, EngineConfig, FeedbackConfig, MonitorConfig,
    ObservabilityConfig, SchedulerConfig,
};
