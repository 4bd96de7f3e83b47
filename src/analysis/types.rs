use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use strum::{Display, EnumIter, EnumString};

use crate::events::CursorPosition;

pub const MIN_INTERVAL_MS: u64 = 30_000;
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Types run by the idle-triggered deep analysis pass.
pub const DEEP_ANALYSIS_TYPES: [AnalysisType; 3] = [
    AnalysisType::PlotConsistency,
    AnalysisType::CharacterDevelopment,
    AnalysisType::WorldBuilding,
];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisType {
    PlotConsistency,
    CharacterDevelopment,
    WorldBuilding,
    WritingStyle,
    Pacing,
    Dialogue,
    Theme,
    Structure,
}

impl AnalysisType {
    /// Starting re-run cadence before any adaptation.
    pub fn default_interval_ms(self) -> u64 {
        match self {
            Self::PlotConsistency | Self::Pacing => 300_000,
            Self::CharacterDevelopment | Self::Structure => 600_000,
            Self::WorldBuilding => 900_000,
            Self::WritingStyle => 60_000,
            Self::Dialogue => 120_000,
            Self::Theme => 1_800_000,
        }
    }

    /// Tie-breaker among tasks raised by the same event; lower runs first.
    pub fn base_priority(self) -> u32 {
        match self {
            Self::PlotConsistency => 0,
            Self::CharacterDevelopment => 1,
            Self::WorldBuilding => 2,
            Self::Structure => 3,
            Self::Pacing => 4,
            Self::Dialogue => 5,
            Self::WritingStyle => 6,
            Self::Theme => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Suggestion,
}

/// Character offsets into the analysed content, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TextSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Finding {
    pub fn new(kind: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            severity,
            message: message.into(),
            location: None,
            excerpt: None,
        }
    }

    pub fn at(mut self, start: usize, end: usize) -> Self {
        self.location = Some(TextSpan { start, end });
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub processing_time_ms: u64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub task_id: String,
    pub analysis_type: AnalysisType,
    pub document_id: Option<String>,
    pub findings: Vec<Finding>,
    pub metadata: AnalysisMetadata,
}

/// What a processor hands back; the engine adds timing and identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorOutput {
    pub findings: Vec<Finding>,
    pub confidence: f64,
}

/// Why a task was raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TaskContext {
    ContentChange {
        event_id: String,
        document_id: String,
        position: CursorPosition,
    },
    DeepAnalysis {
        document_id: String,
    },
    Manual,
}

impl TaskContext {
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::ContentChange { document_id, .. } | Self::DeepAnalysis { document_id } => {
                Some(document_id)
            }
            Self::Manual => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: String,
    pub analysis_type: AnalysisType,
    pub content: String,
    /// Lower runs first within a pass.
    pub priority: u32,
    pub context: TaskContext,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisTask {
    pub fn new(
        analysis_type: AnalysisType,
        content: impl Into<String>,
        priority: u32,
        context: TaskContext,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            analysis_type,
            content: content.into(),
            priority,
            context,
            timestamp: Utc::now(),
        }
    }
}

/// A content-analysis routine for one analysis type.
pub trait ContentProcessor: Send + Sync {
    fn analysis_type(&self) -> AnalysisType;

    /// Cheap pre-check; content this returns false for is never processed.
    fn can_process(&self, content: &str) -> bool;

    fn process<'a>(
        &'a self,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProcessorOutput>> + Send + 'a>>;

    fn priority(&self) -> u32 {
        self.analysis_type().base_priority()
    }
}
