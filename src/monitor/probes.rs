use super::health::{HealthProbe, ProbeStatus};
use super::heartbeat::{LoopHeartbeat, LoopState};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type DepthFn = Box<dyn Fn() -> usize + Send + Sync>;

/// Health of a background loop, judged from its heartbeat and optionally
/// the depth of the queue it drains.
pub struct LoopProbe {
    name: String,
    heartbeat: Arc<LoopHeartbeat>,
    stale_after_secs: u64,
    depth: Option<(DepthFn, usize)>,
}

impl LoopProbe {
    pub fn new(name: impl Into<String>, heartbeat: Arc<LoopHeartbeat>, stale_after_secs: u64) -> Self {
        Self {
            name: name.into(),
            heartbeat,
            stale_after_secs,
            depth: None,
        }
    }

    /// Report degraded while `depth()` exceeds `warn_above`.
    pub fn with_queue_depth<F>(mut self, depth: F, warn_above: usize) -> Self
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        self.depth = Some((Box::new(depth), warn_above));
        self
    }

    pub fn evaluate(&self) -> anyhow::Result<ProbeStatus> {
        let last_beat = match self.heartbeat.state() {
            LoopState::NotStarted => anyhow::bail!("loop not started"),
            LoopState::Stopped => anyhow::bail!("loop stopped"),
            LoopState::Running { last_beat } => last_beat,
        };

        let silent_secs = (Utc::now() - last_beat).num_seconds();
        if u64::try_from(silent_secs).is_ok_and(|secs| secs > self.stale_after_secs) {
            return Ok(ProbeStatus::Degraded(format!(
                "no loop tick for {silent_secs}s"
            )));
        }

        if let Some((depth, warn_above)) = &self.depth {
            let depth = depth();
            if depth > *warn_above {
                return Ok(ProbeStatus::Degraded(format!("queue depth {depth}")));
            }
        }

        Ok(ProbeStatus::Healthy)
    }
}

impl HealthProbe for LoopProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<ProbeStatus>> + Send + '_>> {
        let outcome = self.evaluate();
        Box::pin(async move { outcome })
    }
}
