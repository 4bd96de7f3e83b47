use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPoint {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Named metric series, each a ring buffer that drops its oldest sample
/// once full.
#[derive(Debug)]
pub struct MetricsCollector {
    capacity: usize,
    series: Mutex<BTreeMap<String, VecDeque<MetricPoint>>>,
}

impl MetricsCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, name: &str, value: f64) {
        self.record_at(name, value, Utc::now());
    }

    pub fn record_at(&self, name: &str, value: f64, timestamp: DateTime<Utc>) {
        let Ok(mut series) = self.series.lock() else {
            return;
        };
        let points = series.entry(name.to_string()).or_default();
        if points.len() == self.capacity {
            points.pop_front();
        }
        points.push_back(MetricPoint { value, timestamp });
    }

    pub fn values(&self, name: &str) -> Vec<MetricPoint> {
        self.series
            .lock()
            .ok()
            .and_then(|series| series.get(name).map(|p| p.iter().copied().collect()))
            .unwrap_or_default()
    }

    pub fn latest(&self, name: &str) -> Option<f64> {
        self.series
            .lock()
            .ok()
            .and_then(|series| series.get(name).and_then(|p| p.back().map(|pt| pt.value)))
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self, name: &str) -> Option<f64> {
        let series = self.series.lock().ok()?;
        let points = series.get(name)?;
        if points.is_empty() {
            return None;
        }
        Some(points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64)
    }

    pub fn names(&self) -> Vec<String> {
        self.series
            .lock()
            .map(|series| series.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, name: &str) {
        if let Ok(mut series) = self.series.lock() {
            series.remove(name);
        }
    }

    pub fn clear_all(&self) {
        if let Ok(mut series) = self.series.lock() {
            series.clear();
        }
    }

    /// Latest value of every series.
    pub fn summary(&self) -> BTreeMap<String, f64> {
        self.series
            .lock()
            .map(|series| {
                series
                    .iter()
                    .filter_map(|(name, points)| points.back().map(|p| (name.clone(), p.value)))
                    .collect()
            })
            .unwrap_or_default()
    }
}
