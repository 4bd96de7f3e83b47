use crate::error::ProbeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use strum::Display;
use tokio::time::{self, Duration};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// What a probe reports when the check itself succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Healthy,
    Degraded(String),
}

/// Checks one component. An `Err` marks the component unhealthy.
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<ProbeStatus>> + Send + '_>>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub last_check: DateTime<Utc>,
    pub last_ok: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub pid: u32,
    pub updated_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub healthy: bool,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthSnapshot {
    pub fn unhealthy_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|(_, c)| c.status == HealthStatus::Unhealthy)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Registry of component health fed by probes.
pub struct HealthMonitor {
    started_at: Instant,
    probes: RwLock<Vec<Arc<dyn HealthProbe>>>,
    components: RwLock<BTreeMap<String, ComponentHealth>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            probes: RwLock::new(Vec::new()),
            components: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn register_probe(&self, probe: Arc<dyn HealthProbe>) {
        if let Ok(mut probes) = self.probes.write() {
            probes.retain(|existing| existing.name() != probe.name());
            probes.push(probe);
        }
    }

    fn upsert_component<F>(&self, component: &str, update: F)
    where
        F: FnOnce(&mut ComponentHealth),
    {
        if let Ok(mut map) = self.components.write() {
            let now = Utc::now();
            let entry = map
                .entry(component.to_string())
                .or_insert_with(|| ComponentHealth {
                    status: HealthStatus::Healthy,
                    message: None,
                    last_check: now,
                    last_ok: None,
                    last_error: None,
                });
            update(entry);
            entry.last_check = now;
        }
    }

    pub fn mark_component_ok(&self, component: &str) {
        self.upsert_component(component, |entry| {
            entry.status = HealthStatus::Healthy;
            entry.message = None;
            entry.last_ok = Some(Utc::now());
            entry.last_error = None;
        });
    }

    pub fn mark_component_degraded(&self, component: &str, message: impl Into<String>) {
        let message = message.into();
        self.upsert_component(component, move |entry| {
            entry.status = HealthStatus::Degraded;
            entry.message = Some(message);
        });
    }

    #[allow(clippy::needless_pass_by_value)]
    pub fn mark_component_error(&self, component: &str, error: impl ToString) {
        let err = error.to_string();
        self.upsert_component(component, move |entry| {
            entry.status = HealthStatus::Unhealthy;
            entry.message = Some(err.clone());
            entry.last_error = Some(err);
        });
    }

    /// Run every registered probe and record the outcome.
    pub async fn check_all(&self) -> HealthSnapshot {
        let probes: Vec<Arc<dyn HealthProbe>> = self
            .probes
            .read()
            .map(|probes| probes.clone())
            .unwrap_or_default();

        for probe in probes {
            let name = probe.name().to_string();
            match time::timeout(PROBE_TIMEOUT, probe.check()).await {
                Ok(Ok(ProbeStatus::Healthy)) => self.mark_component_ok(&name),
                Ok(Ok(ProbeStatus::Degraded(message))) => {
                    self.mark_component_degraded(&name, message);
                }
                Ok(Err(error)) => {
                    let error = ProbeError::Failed {
                        component: name.clone(),
                        message: format!("{error:#}"),
                    };
                    self.mark_component_error(&name, error);
                }
                Err(_) => {
                    let error = ProbeError::Failed {
                        component: name.clone(),
                        message: "health check timed out".into(),
                    };
                    self.mark_component_error(&name, error);
                }
            }
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let components = self
            .components
            .read()
            .map_or_else(|_| BTreeMap::new(), |map| map.clone());
        let healthy = components
            .values()
            .all(|c| c.status != HealthStatus::Unhealthy);

        HealthSnapshot {
            pid: std::process::id(),
            updated_at: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            healthy,
            components,
        }
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_else(|_| {
            serde_json::json!({
                "status": "error",
                "message": "failed to serialize health snapshot"
            })
        })
    }
}
