use crate::analysis::TextSpan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use strum::{Display, EnumIter, EnumString};

pub const MAX_FEEDBACK_PRIORITY: u8 = 10;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackType {
    PlotIssue,
    CharacterInconsistency,
    StyleSuggestion,
    PacingAdvice,
    WorldbuildingTip,
    GrammarCorrection,
    ContentRecommendation,
    StructureSuggestion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TextSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMetadata {
    pub source: String,
    pub confidence: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub feedback_type: FeedbackType,
    pub message: String,
    /// 0..=10, higher is more urgent.
    pub priority: u8,
    pub context: FeedbackContext,
    pub metadata: FeedbackMetadata,
}

impl Feedback {
    pub fn new(feedback_type: FeedbackType, message: impl Into<String>, priority: u8) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            feedback_type,
            message: message.into(),
            priority: priority.min(MAX_FEEDBACK_PRIORITY),
            context: FeedbackContext {
                location: None,
                related_content: None,
                timestamp: Utc::now(),
            },
            metadata: FeedbackMetadata {
                source: "manual".into(),
                confidence: 1.0,
                category: feedback_type.to_string(),
            },
        }
    }

    pub fn at(mut self, start: usize, end: usize) -> Self {
        self.context.location = Some(TextSpan { start, end });
        self
    }

    pub fn with_related(mut self, content: impl Into<String>) -> Self {
        self.context.related_content = Some(content.into());
        self
    }

    pub fn with_metadata(
        mut self,
        source: impl Into<String>,
        confidence: f64,
        category: impl Into<String>,
    ) -> Self {
        self.metadata = FeedbackMetadata {
            source: source.into(),
            confidence,
            category: category.into(),
        };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseAction {
    Accepted,
    Rejected,
    Ignored,
}

/// Delivery mechanism of a strategy. At most one strategy per kind is
/// registered on a controller; strategies outside the built-in pair name
/// themselves through `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    InlineComment,
    StatusBar,
    Custom(String),
}

impl StrategyKind {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InlineComment => f.write_str("inline_comment"),
            Self::StatusBar => f.write_str("status_bar"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub feedback_id: String,
    pub action: ResponseAction,
    pub timestamp: DateTime<Utc>,
    /// Channel the feedback was shown on, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<StrategyKind>,
}

impl FeedbackResponse {
    pub fn new(feedback_id: impl Into<String>, action: ResponseAction) -> Self {
        Self {
            feedback_id: feedback_id.into(),
            action,
            timestamp: Utc::now(),
            context: None,
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self.action, ResponseAction::Rejected | ResponseAction::Ignored)
    }
}

/// A pluggable way of putting feedback in front of the user.
pub trait FeedbackStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn should_deliver(&self, feedback: &Feedback) -> bool;

    fn deliver<'a>(
        &'a self,
        feedback: &'a Feedback,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    /// Preference among strategies that accept the same item; higher wins.
    fn priority(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_capped_at_ten() {
        let fb = Feedback::new(FeedbackType::PlotIssue, "gap", 42);
        assert_eq!(fb.priority, 10);
        assert_eq!(fb.metadata.category, "plot_issue");
    }

    #[test]
    fn negative_responses() {
        assert!(FeedbackResponse::new("a", ResponseAction::Ignored).is_negative());
        assert!(FeedbackResponse::new("a", ResponseAction::Rejected).is_negative());
        assert!(!FeedbackResponse::new("a", ResponseAction::Accepted).is_negative());
    }

    #[test]
    fn feedback_serializes_snake_case() {
        let fb = Feedback::new(FeedbackType::WorldbuildingTip, "map", 4).at(1, 3);
        let json = serde_json::to_value(&fb).unwrap();
        assert_eq!(json["feedback_type"], "worldbuilding_tip");
        assert_eq!(json["context"]["location"]["end"], 3);
        assert!(json["context"].get("related_content").is_none());
    }

    #[test]
    fn strategy_kind_names() {
        assert_eq!(StrategyKind::InlineComment.to_string(), "inline_comment");
        assert_eq!(StrategyKind::custom("toast").to_string(), "toast");
        let json = serde_json::to_value(StrategyKind::custom("toast")).unwrap();
        assert_eq!(json["custom"], "toast");
        assert_eq!(serde_json::to_value(StrategyKind::StatusBar).unwrap(), "status_bar");
    }
}
