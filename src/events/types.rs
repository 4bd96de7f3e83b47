use crate::analysis::AnalysisType;
use crate::feedback::FeedbackType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WritingEventType {
    ContentChange,
    SectionComplete,
    CharacterMention,
    PlotPoint,
    WorldBuilding,
    StyleChange,
    ConsistencyCheck,
    AnalysisComplete,
    FeedbackReady,
}

/// Dispatch urgency. Lower values dequeue first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
    Background = 4,
}

impl Priority {
    pub fn rank(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub character: u32,
}

/// A raw edit notification: the full document text after the edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChange {
    pub document_id: String,
    pub content: String,
    pub position: CursorPosition,
    pub timestamp: DateTime<Utc>,
}

impl ContentChange {
    pub fn new(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            content: content.into(),
            position: CursorPosition::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, line: u32, character: u32) -> Self {
        self.position = CursorPosition { line, character };
        self
    }
}

/// Edits to one document coalesced over a quiet period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub change: ContentChange,
    pub edits: usize,
    pub first_edit_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurroundingText {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub plot_points: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingContext {
    pub document_id: String,
    pub section_id: Option<String>,
    pub position: CursorPosition,
    pub surrounding: SurroundingText,
    pub metadata: ContextMetadata,
}

impl WritingContext {
    /// Context for events that do not originate from a cursor position.
    pub fn for_document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            section_id: None,
            position: CursorPosition::default(),
            surrounding: SurroundingText::default(),
            metadata: ContextMetadata {
                characters: Vec::new(),
                locations: Vec::new(),
                plot_points: Vec::new(),
                timestamp: Utc::now(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Content {
        text: String,
    },
    AnalysisComplete {
        task_id: String,
        analysis_type: AnalysisType,
        finding_count: usize,
        confidence: f64,
    },
    FeedbackReady {
        feedback_id: String,
        feedback_type: FeedbackType,
    },
}

impl EventPayload {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Content { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingEvent {
    pub id: String,
    pub event_type: WritingEventType,
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
    pub priority: Priority,
    pub context: WritingContext,
}

impl WritingEvent {
    pub fn new(
        event_type: WritingEventType,
        payload: EventPayload,
        priority: Priority,
        context: WritingContext,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            payload,
            timestamp: Utc::now(),
            priority,
            context,
        }
    }
}
