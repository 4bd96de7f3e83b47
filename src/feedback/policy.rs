use super::types::Feedback;
use crate::config::FeedbackConfig;
use crate::error::DeliveryError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

/// Exponential backoff for feedback that could not be delivered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_ms: u64,
    pub max_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &FeedbackConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_ms: config.retry_base_ms,
            max_ms: config.retry_max_ms,
        }
    }

    /// Delay before the next try after `attempts` failed tries.
    pub fn backoff_ms(&self, attempts: u32) -> u64 {
        let exponent = attempts.saturating_sub(1).min(32);
        self.base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_ms)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArchiveReason {
    /// Older than the relevance window.
    Stale,
    /// Ran out of delivery attempts.
    Exhausted,
    /// The recovery hook gave up on it.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivedFeedback {
    pub feedback: Feedback,
    pub reason: ArchiveReason,
    pub attempts: u32,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Requeue,
    Archive,
}

/// Decides what happens to feedback whose delivery failed.
pub trait DeliveryRecovery: Send + Sync {
    fn recover(&self, feedback: &Feedback, error: &DeliveryError) -> RecoveryAction;
}

/// Puts failed items back under the normal retry policy.
#[derive(Debug, Default)]
pub struct RequeueRecovery;

impl DeliveryRecovery for RequeueRecovery {
    fn recover(&self, _feedback: &Feedback, _error: &DeliveryError) -> RecoveryAction {
        RecoveryAction::Requeue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_ms: 2_000,
            max_ms: 10_000,
        };
        assert_eq!(policy.backoff_ms(1), 2_000);
        assert_eq!(policy.backoff_ms(2), 4_000);
        assert_eq!(policy.backoff_ms(3), 8_000);
        assert_eq!(policy.backoff_ms(4), 10_000);
        assert_eq!(policy.backoff_ms(60), 10_000);
    }

    #[test]
    fn exhausted_at_max_attempts() {
        let policy = RetryPolicy::from_config(&FeedbackConfig::default());
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));
    }
}
