use super::engine::AnalysisEngine;
use super::types::{AnalysisTask, AnalysisType, TaskContext};
use crate::events::{EventListener, WritingEvent, WritingEventType};
use std::future::Future;
use std::pin::Pin;

const ALL_TYPES: &[AnalysisType] = &[
    AnalysisType::PlotConsistency,
    AnalysisType::CharacterDevelopment,
    AnalysisType::WorldBuilding,
    AnalysisType::WritingStyle,
    AnalysisType::Pacing,
    AnalysisType::Dialogue,
    AnalysisType::Theme,
    AnalysisType::Structure,
];

/// Analysis types an event of `event_type` should trigger.
pub fn analysis_types_for(event_type: WritingEventType) -> &'static [AnalysisType] {
    match event_type {
        WritingEventType::ContentChange => ALL_TYPES,
        WritingEventType::CharacterMention => &[AnalysisType::CharacterDevelopment],
        WritingEventType::PlotPoint => &[AnalysisType::PlotConsistency],
        WritingEventType::WorldBuilding => &[AnalysisType::WorldBuilding],
        WritingEventType::StyleChange => &[AnalysisType::WritingStyle, AnalysisType::Dialogue],
        WritingEventType::SectionComplete => &[
            AnalysisType::Structure,
            AnalysisType::Pacing,
            AnalysisType::Theme,
        ],
        WritingEventType::ConsistencyCheck => &[
            AnalysisType::PlotConsistency,
            AnalysisType::CharacterDevelopment,
            AnalysisType::WorldBuilding,
        ],
        WritingEventType::AnalysisComplete | WritingEventType::FeedbackReady => &[],
    }
}

/// Listener that turns content-bearing events into scheduled analysis
/// tasks, one per mapped analysis type.
pub struct SchedulerIngest {
    engine: AnalysisEngine,
}

impl SchedulerIngest {
    pub fn new(engine: AnalysisEngine) -> Self {
        Self { engine }
    }

    /// Schedule tasks for `event`, returning how many were admitted.
    pub fn ingest(&self, event: &WritingEvent) -> usize {
        let Some(text) = event.payload.text() else {
            return 0;
        };

        let mut admitted = 0;
        for ty in analysis_types_for(event.event_type) {
            let priority = event.priority.rank() * 10 + ty.base_priority();
            let task = AnalysisTask::new(
                *ty,
                text,
                priority,
                TaskContext::ContentChange {
                    event_id: event.id.clone(),
                    document_id: event.context.document_id.clone(),
                    position: event.context.position,
                },
            );
            if self.engine.schedule_analysis(task) {
                admitted += 1;
            }
        }
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, admitted, "event ingested");
        admitted
    }
}

impl EventListener for SchedulerIngest {
    fn name(&self) -> &str {
        "scheduler_ingest"
    }

    fn handle<'a>(
        &'a self,
        event: &'a WritingEvent,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        self.ingest(event);
        Box::pin(async { Ok(()) })
    }
}
