use super::controller::FeedbackController;
use super::types::{Feedback, FeedbackType};
use crate::analysis::{AnalysisResult, AnalysisType, Finding, ResultSink, Severity};
use crate::events::{EventDispatcher, EventPayload, Priority, WritingContext, WritingEvent, WritingEventType};
use std::future::Future;
use std::pin::Pin;

pub fn feedback_type_for(analysis_type: AnalysisType) -> FeedbackType {
    match analysis_type {
        AnalysisType::PlotConsistency => FeedbackType::PlotIssue,
        AnalysisType::CharacterDevelopment => FeedbackType::CharacterInconsistency,
        AnalysisType::WorldBuilding => FeedbackType::WorldbuildingTip,
        AnalysisType::WritingStyle | AnalysisType::Dialogue => FeedbackType::StyleSuggestion,
        AnalysisType::Pacing => FeedbackType::PacingAdvice,
        AnalysisType::Theme => FeedbackType::ContentRecommendation,
        AnalysisType::Structure => FeedbackType::StructureSuggestion,
    }
}

pub fn priority_for(severity: Severity) -> u8 {
    match severity {
        Severity::Critical => 9,
        Severity::Warning => 7,
        Severity::Suggestion => 4,
    }
}

/// Turns analysis findings into queued feedback and announces both on the
/// event pipeline.
pub struct FeedbackSink {
    controller: FeedbackController,
    dispatcher: Option<EventDispatcher>,
}

impl FeedbackSink {
    pub fn new(controller: FeedbackController) -> Self {
        Self {
            controller,
            dispatcher: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn to_feedback(result: &AnalysisResult, finding: &Finding) -> Feedback {
        let mut feedback = Feedback::new(
            feedback_type_for(result.analysis_type),
            finding.message.clone(),
            priority_for(finding.severity),
        )
        .with_metadata(
            result.analysis_type.to_string(),
            result.metadata.confidence,
            finding.kind.clone(),
        );
        // Suggestions go to the status bar, which only takes unanchored
        // feedback; their excerpt still says where they came from.
        if finding.severity != Severity::Suggestion {
            feedback.context.location = finding.location;
        }
        feedback.context.related_content = finding.excerpt.clone();
        feedback
    }

    fn announce(&self, result: &AnalysisResult, payload: EventPayload, event_type: WritingEventType) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        let context = WritingContext::for_document(result.document_id.clone().unwrap_or_default());
        dispatcher.publish(WritingEvent::new(event_type, payload, Priority::Low, context));
    }
}

impl ResultSink for FeedbackSink {
    fn accept<'a>(
        &'a self,
        result: &'a AnalysisResult,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        self.announce(
            result,
            EventPayload::AnalysisComplete {
                task_id: result.task_id.clone(),
                analysis_type: result.analysis_type,
                finding_count: result.findings.len(),
                confidence: result.metadata.confidence,
            },
            WritingEventType::AnalysisComplete,
        );

        for finding in &result.findings {
            let feedback = Self::to_feedback(result, finding);
            self.announce(
                result,
                EventPayload::FeedbackReady {
                    feedback_id: feedback.id.clone(),
                    feedback_type: feedback.feedback_type,
                },
                WritingEventType::FeedbackReady,
            );
            self.controller.queue_feedback(feedback);
        }
        Box::pin(async { Ok(()) })
    }
}
