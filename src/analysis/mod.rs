pub mod engine;
pub mod ingest;
pub mod processors;
pub mod scheduler;
pub mod types;

pub use engine::{AnalysisEngine, EngineStats, LogSink, ResultSink, TaskOutcome};
pub use ingest::{SchedulerIngest, analysis_types_for};
pub use processors::{CharacterDevelopmentProcessor, PlotConsistencyProcessor, reference_processors};
pub use scheduler::{AnalysisScheduler, SchedulerSnapshot};
pub use types::{
    AnalysisMetadata, AnalysisResult, AnalysisTask, AnalysisType, ContentProcessor,
    DEEP_ANALYSIS_TYPES, Finding, MAX_INTERVAL_MS, MIN_INTERVAL_MS, ProcessorOutput, Severity,
    TaskContext, TextSpan,
};
