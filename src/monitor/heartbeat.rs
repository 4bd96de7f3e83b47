use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    NotStarted,
    Running { last_beat: DateTime<Utc> },
    Stopped,
}

/// Liveness marker a background loop bumps once per iteration.
#[derive(Debug, Default)]
pub struct LoopHeartbeat {
    state: AtomicU8,
    last_beat_ms: AtomicI64,
}

impl LoopHeartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self) {
        self.beat();
        self.state.store(RUNNING, Ordering::Release);
    }

    pub fn beat(&self) {
        self.last_beat_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    pub fn mark_stopped(&self) {
        self.state.store(STOPPED, Ordering::Release);
    }

    pub fn state(&self) -> LoopState {
        match self.state.load(Ordering::Acquire) {
            NOT_STARTED => LoopState::NotStarted,
            RUNNING => {
                let ms = self.last_beat_ms.load(Ordering::Acquire);
                let last_beat = DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now);
                LoopState::Running { last_beat }
            }
            _ => LoopState::Stopped,
        }
    }
}
