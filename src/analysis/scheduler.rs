use super::types::{AnalysisTask, AnalysisType, MAX_INTERVAL_MS, MIN_INTERVAL_MS};
use crate::config::SchedulerConfig;
use crate::util::elapsed_ms;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use strum::IntoEnumIterator;

const SLOW_PROCESSING_MS: u64 = 5_000;
const FAST_PROCESSING_MS: u64 = 1_000;
const LOW_CONFIDENCE: f64 = 0.7;
const HIGH_CONFIDENCE: f64 = 0.9;
const BACKOFF_FACTOR: f64 = 1.2;
const SPEEDUP_FACTOR: f64 = 0.8;

#[derive(Debug, Clone)]
struct Scheduled {
    task: AnalysisTask,
    admitted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    intervals: HashMap<AnalysisType, u64>,
    last_completion: HashMap<AnalysisType, DateTime<Utc>>,
    scheduled: HashMap<String, Scheduled>,
    in_flight: HashSet<String>,
}

impl SchedulerState {
    fn interval(&self, ty: AnalysisType) -> u64 {
        self.intervals
            .get(&ty)
            .copied()
            .unwrap_or_else(|| ty.default_interval_ms())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub scheduled: usize,
    pub in_flight: usize,
}

/// Per-type adaptive re-run cadence plus the admission gate and in-flight
/// bookkeeping for analysis tasks.
///
/// Tasks stay in the scheduled set while they are processed and leave it only
/// through [`mark_task_complete`](Self::mark_task_complete) or
/// [`release_task`](Self::release_task).
pub struct AnalysisScheduler {
    state: Mutex<SchedulerState>,
}

fn clamp_interval(ms: u64) -> u64 {
    ms.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale(ms: u64, factor: f64) -> u64 {
    ((ms as f64) * factor).round() as u64
}

impl AnalysisScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        let mut intervals = HashMap::new();
        for ty in AnalysisType::iter() {
            intervals.insert(ty, ty.default_interval_ms());
        }
        for (name, ms) in &config.intervals {
            match name.parse::<AnalysisType>() {
                Ok(ty) => {
                    intervals.insert(ty, clamp_interval(*ms));
                }
                Err(_) => tracing::warn!(name = %name, "ignoring interval for unknown analysis type"),
            }
        }
        Self {
            state: Mutex::new(SchedulerState {
                intervals,
                ..SchedulerState::default()
            }),
        }
    }

    pub fn schedule_analysis(&self, task: AnalysisTask) -> bool {
        self.schedule_analysis_at(task, Utc::now())
    }

    /// Admit `task` unless its id is in flight or its type completed less
    /// than one interval ago. A newly admitted task replaces a still-waiting
    /// task of the same type and keeps that task's admission time.
    pub fn schedule_analysis_at(&self, task: AnalysisTask, now: DateTime<Utc>) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };

        if state.in_flight.contains(&task.id) {
            tracing::debug!(task_id = %task.id, "task already in flight; not rescheduled");
            return false;
        }

        let ty = task.analysis_type;
        let interval = state.interval(ty);
        if let Some(last) = state.last_completion.get(&ty)
            && elapsed_ms(*last, now) < interval
        {
            return false;
        }

        let superseded: Vec<String> = state
            .scheduled
            .iter()
            .filter(|(id, entry)| entry.task.analysis_type == ty && !state.in_flight.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();

        let mut admitted_at = now;
        for id in superseded {
            if let Some(old) = state.scheduled.remove(&id) {
                admitted_at = admitted_at.min(old.admitted_at);
            }
        }

        tracing::debug!(task_id = %task.id, analysis_type = %ty, "analysis scheduled");
        state
            .scheduled
            .insert(task.id.clone(), Scheduled { task, admitted_at });
        true
    }

    pub fn pending_tasks(&self) -> Vec<AnalysisTask> {
        self.pending_tasks_at(Utc::now())
    }

    /// Every waiting task whose interval has elapsed, marked in flight and
    /// sorted by ascending priority. The interval is measured from the type's
    /// last completion, or from admission when the type never completed.
    pub fn pending_tasks_at(&self, now: DateTime<Utc>) -> Vec<AnalysisTask> {
        let Ok(mut state) = self.state.lock() else {
            return Vec::new();
        };

        let mut due: Vec<AnalysisTask> = state
            .scheduled
            .iter()
            .filter(|(id, _)| !state.in_flight.contains(*id))
            .filter(|(_, entry)| {
                let ty = entry.task.analysis_type;
                let anchor = state
                    .last_completion
                    .get(&ty)
                    .copied()
                    .unwrap_or(entry.admitted_at);
                elapsed_ms(anchor, now) >= state.interval(ty)
            })
            .map(|(_, entry)| entry.task.clone())
            .collect();

        for task in &due {
            state.in_flight.insert(task.id.clone());
        }
        due.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        due
    }

    pub fn mark_task_complete(&self, task_id: &str, analysis_type: AnalysisType) {
        self.mark_task_complete_at(task_id, analysis_type, Utc::now());
    }

    pub fn mark_task_complete_at(
        &self,
        task_id: &str,
        analysis_type: AnalysisType,
        now: DateTime<Utc>,
    ) {
        if let Ok(mut state) = self.state.lock() {
            state.scheduled.remove(task_id);
            state.in_flight.remove(task_id);
            state.last_completion.insert(analysis_type, now);
        }
    }

    /// Drop a task without recording a completion. Returns whether the task
    /// was known.
    pub fn release_task(&self, task_id: &str) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let was_scheduled = state.scheduled.remove(task_id).is_some();
        let was_in_flight = state.in_flight.remove(task_id);
        was_scheduled || was_in_flight
    }

    /// Slow or unsure runs back the type off by 20%; fast and confident runs
    /// speed it up by 20%. Returns the interval now in force.
    pub fn adjust_interval(
        &self,
        analysis_type: AnalysisType,
        processing_time_ms: u64,
        confidence: f64,
    ) -> u64 {
        let Ok(mut state) = self.state.lock() else {
            return analysis_type.default_interval_ms();
        };
        let current = state.interval(analysis_type);

        let next = if processing_time_ms > SLOW_PROCESSING_MS || confidence < LOW_CONFIDENCE {
            scale(current, BACKOFF_FACTOR).min(MAX_INTERVAL_MS)
        } else if processing_time_ms < FAST_PROCESSING_MS && confidence > HIGH_CONFIDENCE {
            scale(current, SPEEDUP_FACTOR).max(MIN_INTERVAL_MS)
        } else {
            current
        };

        state.intervals.insert(analysis_type, next);
        next
    }

    pub fn interval(&self, analysis_type: AnalysisType) -> u64 {
        self.state
            .lock()
            .map(|state| state.interval(analysis_type))
            .unwrap_or_else(|_| analysis_type.default_interval_ms())
    }

    /// Shortest interval across all analysis types.
    pub fn optimal_interval(&self) -> u64 {
        let Ok(state) = self.state.lock() else {
            return MIN_INTERVAL_MS;
        };
        AnalysisType::iter()
            .map(|ty| state.interval(ty))
            .min()
            .unwrap_or(MIN_INTERVAL_MS)
    }

    pub fn is_in_flight(&self, task_id: &str) -> bool {
        self.state
            .lock()
            .is_ok_and(|state| state.in_flight.contains(task_id))
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.state
            .lock()
            .map(|state| SchedulerSnapshot {
                scheduled: state.scheduled.len(),
                in_flight: state.in_flight.len(),
            })
            .unwrap_or_default()
    }
}

impl Default for AnalysisScheduler {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}
