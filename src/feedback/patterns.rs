use super::types::{FeedbackResponse, ResponseAction};
use crate::config::FeedbackConfig;
use crate::util::elapsed_ms;
use chrono::{DateTime, Timelike, Utc};
use std::collections::VecDeque;

const HISTORY_CAPACITY: usize = 1_000;
const RECOMPUTE_EVERY_MS: u64 = 3_600_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourBucket {
    pub accepted: usize,
    pub total: usize,
}

impl HourBucket {
    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.accepted as f64 / self.total as f64)
    }
}

/// Learns from how the writer responds to feedback.
///
/// Hour-of-day acceptance buckets are recomputed from the response history
/// at most once per hour; streak and overall rate are always live.
#[derive(Debug)]
pub struct UserPatternTracker {
    history: VecDeque<FeedbackResponse>,
    hourly: [HourBucket; 24],
    last_recompute: Option<DateTime<Utc>>,
    min_acceptance_rate: f64,
    min_hour_samples: usize,
}

impl UserPatternTracker {
    pub fn new(config: &FeedbackConfig) -> Self {
        Self {
            history: VecDeque::new(),
            hourly: [HourBucket::default(); 24],
            last_recompute: None,
            min_acceptance_rate: config.min_acceptance_rate,
            min_hour_samples: config.min_hour_samples,
        }
    }

    pub fn record_response(&mut self, response: FeedbackResponse) {
        self.record_response_at(response, Utc::now());
    }

    pub fn record_response_at(&mut self, response: FeedbackResponse, now: DateTime<Utc>) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(response);

        let due = self
            .last_recompute
            .is_none_or(|last| elapsed_ms(last, now) >= RECOMPUTE_EVERY_MS);
        if due {
            self.recompute();
            self.last_recompute = Some(now);
        }
    }

    fn recompute(&mut self) {
        let mut hourly = [HourBucket::default(); 24];
        for response in &self.history {
            let bucket = &mut hourly[response.timestamp.hour() as usize];
            bucket.total += 1;
            if response.action == ResponseAction::Accepted {
                bucket.accepted += 1;
            }
        }
        self.hourly = hourly;
        tracing::debug!(responses = self.history.len(), "user response patterns recomputed");
    }

    pub fn hour_bucket(&self, hour: u32) -> HourBucket {
        self.hourly.get(hour as usize).copied().unwrap_or_default()
    }

    /// True unless this hour has enough history and a poor acceptance rate.
    pub fn is_good_time_at(&self, now: DateTime<Utc>) -> bool {
        let bucket = self.hour_bucket(now.hour());
        if bucket.total < self.min_hour_samples {
            return true;
        }
        bucket
            .acceptance_rate()
            .is_none_or(|rate| rate >= self.min_acceptance_rate)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_rate(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        let accepted = self
            .history
            .iter()
            .filter(|r| r.action == ResponseAction::Accepted)
            .count();
        Some(accepted as f64 / self.history.len() as f64)
    }

    /// Consecutive rejected or ignored responses at the end of the history.
    pub fn negative_streak(&self) -> usize {
        self.history
            .iter()
            .rev()
            .take_while(|r| r.is_negative())
            .count()
    }

    pub fn last_response_at(&self) -> Option<DateTime<Utc>> {
        self.history.back().map(|r| r.timestamp)
    }

    pub fn response_count(&self) -> usize {
        self.history.len()
    }
}

/// Tracks editor activity to tell when the writer has paused.
#[derive(Debug)]
pub struct UserActivityMonitor {
    last_activity: Option<DateTime<Utc>>,
    break_after_ms: u64,
}

impl UserActivityMonitor {
    pub fn new(config: &FeedbackConfig) -> Self {
        Self {
            last_activity: None,
            break_after_ms: config.break_after_ms,
        }
    }

    pub fn record_activity_at(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    /// No activity seen at all also counts as a break.
    pub fn is_user_in_break_at(&self, now: DateTime<Utc>) -> bool {
        self.last_activity
            .is_none_or(|last| elapsed_ms(last, now) >= self.break_after_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, minute, 0).unwrap()
    }

    fn response(action: ResponseAction, when: DateTime<Utc>) -> FeedbackResponse {
        FeedbackResponse {
            feedback_id: "fb".into(),
            action,
            timestamp: when,
            context: None,
        }
    }

    fn config() -> FeedbackConfig {
        FeedbackConfig {
            min_acceptance_rate: 0.5,
            min_hour_samples: 3,
            ..FeedbackConfig::default()
        }
    }

    #[test]
    fn hour_with_few_samples_is_good() {
        let mut t = UserPatternTracker::new(&config());
        t.record_response_at(response(ResponseAction::Rejected, at(9, 0)), at(9, 0));
        assert!(t.is_good_time_at(at(9, 30)));
    }

    #[test]
    fn poor_hour_becomes_bad_after_hourly_recompute() {
        let mut t = UserPatternTracker::new(&config());
        t.record_response_at(response(ResponseAction::Rejected, at(9, 0)), at(9, 0));
        t.record_response_at(response(ResponseAction::Rejected, at(9, 10)), at(9, 10));
        t.record_response_at(response(ResponseAction::Ignored, at(9, 20)), at(9, 20));
        // Buckets were last computed at 09:00 with a single sample.
        assert!(t.is_good_time_at(at(9, 30)));

        t.record_response_at(response(ResponseAction::Accepted, at(10, 5)), at(10, 5));
        assert_eq!(t.hour_bucket(9), HourBucket { accepted: 0, total: 3 });
        assert!(!t.is_good_time_at(at(9, 45)));
        assert!(t.is_good_time_at(at(10, 45)));
    }

    #[test]
    fn streak_and_rate_are_live() {
        let mut t = UserPatternTracker::new(&config());
        assert_eq!(t.acceptance_rate(), None);
        t.record_response_at(response(ResponseAction::Accepted, at(8, 0)), at(8, 0));
        t.record_response_at(response(ResponseAction::Rejected, at(8, 1)), at(8, 1));
        t.record_response_at(response(ResponseAction::Ignored, at(8, 2)), at(8, 2));
        assert_eq!(t.negative_streak(), 2);
        assert_eq!(t.acceptance_rate(), Some(1.0 / 3.0));
        assert_eq!(t.last_response_at(), Some(at(8, 2)));
    }

    #[test]
    fn break_detection_uses_threshold() {
        let mut m = UserActivityMonitor::new(&FeedbackConfig {
            break_after_ms: 3_000,
            ..FeedbackConfig::default()
        });
        let start = at(12, 0);
        assert!(m.is_user_in_break_at(start));

        m.record_activity_at(start);
        assert!(!m.is_user_in_break_at(start + chrono::Duration::milliseconds(2_999)));
        assert!(m.is_user_in_break_at(start + chrono::Duration::milliseconds(3_000)));
    }
}
