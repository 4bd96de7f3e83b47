pub mod health;
pub mod heartbeat;
pub mod metrics;
pub mod performance;
pub mod probes;

pub use health::{
    ComponentHealth, HealthMonitor, HealthProbe, HealthSnapshot, HealthStatus, ProbeStatus,
};
pub use heartbeat::{LoopHeartbeat, LoopState};
pub use metrics::{MetricPoint, MetricsCollector};
pub use performance::{
    PerformanceCounters, PerformanceMonitor, PerformanceSample, PerformanceSource,
    compute_sample,
};
pub use probes::LoopProbe;
