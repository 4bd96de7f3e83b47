use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── Change aggregation ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Quiet period (ms) before accumulated edits are emitted as a batch.
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,
    /// Period (ms) without edits after which the idle signal fires.
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,
    /// Capacity of the raw edit channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_quiet_ms() -> u64 {
    500
}

fn default_idle_ms() -> u64 {
    3_000
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            quiet_ms: default_quiet_ms(),
            idle_ms: default_idle_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

// ── Event dispatch ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Fallback wake-up cadence (ms) of the dispatch loop.
    #[serde(default = "default_dispatch_poll_ms")]
    pub poll_ms: u64,
    /// Characters of surrounding text captured on each side of the cursor.
    #[serde(default = "default_context_window_chars")]
    pub context_window_chars: usize,
}

fn default_dispatch_poll_ms() -> u64 {
    100
}

fn default_context_window_chars() -> usize {
    200
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_ms: default_dispatch_poll_ms(),
            context_window_chars: default_context_window_chars(),
        }
    }
}

// ── Analysis scheduling ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Per-type starting intervals in ms, keyed by analysis type name
    /// (e.g. `writing_style = 45000`). Missing types use built-in defaults.
    #[serde(default)]
    pub intervals: BTreeMap<String, u64>,
}

// ── Analysis engine ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound (ms) on a single sleep of the analysis loop.
    #[serde(default = "default_engine_max_sleep_ms")]
    pub max_sleep_ms: u64,
    /// Run the deep analysis pass when the document goes idle.
    #[serde(default = "default_true")]
    pub deep_analysis_on_idle: bool,
}

fn default_engine_max_sleep_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sleep_ms: default_engine_max_sleep_ms(),
            deep_analysis_on_idle: true,
        }
    }
}

// ── Feedback delivery ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Initial sleep (ms) between delivery passes.
    #[serde(default = "default_feedback_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_feedback_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_feedback_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Feedback below this priority is never pushed to the user.
    #[serde(default = "default_min_priority")]
    pub min_priority: u8,
    /// Time (ms) without editor activity after which the user is on a break.
    #[serde(default = "default_break_after_ms")]
    pub break_after_ms: u64,
    /// Feedback older than this is no longer relevant and gets archived.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    /// Consecutive rejected/ignored responses that trigger a cool-down.
    #[serde(default = "default_rejection_streak")]
    pub rejection_streak: usize,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Delivery attempts before an item is archived.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
    #[serde(default = "default_archive_capacity")]
    pub archive_capacity: usize,
    /// Hourly acceptance rate below which that hour is a bad time.
    #[serde(default = "default_min_acceptance_rate")]
    pub min_acceptance_rate: f64,
    /// Responses needed in an hour bucket before its rate is trusted.
    #[serde(default = "default_min_hour_samples")]
    pub min_hour_samples: usize,
}

fn default_feedback_interval_ms() -> u64 {
    1_000
}

fn default_feedback_min_interval_ms() -> u64 {
    250
}

fn default_feedback_max_interval_ms() -> u64 {
    30_000
}

fn default_min_priority() -> u8 {
    1
}

fn default_break_after_ms() -> u64 {
    3_000
}

fn default_max_age_secs() -> u64 {
    1_800
}

fn default_rejection_streak() -> usize {
    3
}

fn default_cooldown_secs() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base_ms() -> u64 {
    2_000
}

fn default_retry_max_ms() -> u64 {
    60_000
}

fn default_archive_capacity() -> usize {
    200
}

fn default_min_acceptance_rate() -> f64 {
    0.3
}

fn default_min_hour_samples() -> usize {
    5
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_feedback_interval_ms(),
            min_interval_ms: default_feedback_min_interval_ms(),
            max_interval_ms: default_feedback_max_interval_ms(),
            min_priority: default_min_priority(),
            break_after_ms: default_break_after_ms(),
            max_age_secs: default_max_age_secs(),
            rejection_streak: default_rejection_streak(),
            cooldown_secs: default_cooldown_secs(),
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            archive_capacity: default_archive_capacity(),
            min_acceptance_rate: default_min_acceptance_rate(),
            min_hour_samples: default_min_hour_samples(),
        }
    }
}

// ── Health / metrics ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Run the periodic performance sampler.
    #[serde(default = "default_true")]
    pub performance_enabled: bool,
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
    /// Samples kept per metric.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Queue depth above which a component reports degraded.
    #[serde(default = "default_queue_depth_warn")]
    pub queue_depth_warn: usize,
    /// A loop that has not ticked for this long reports degraded.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_sample_interval_secs() -> u64 {
    5
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_history_capacity() -> usize {
    100
}

fn default_queue_depth_warn() -> usize {
    500
}

fn default_stale_after_secs() -> u64 {
    120
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            performance_enabled: true,
            sample_interval_secs: default_sample_interval_secs(),
            health_interval_secs: default_health_interval_secs(),
            history_capacity: default_history_capacity(),
            queue_depth_warn: default_queue_depth_warn(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

// ── Observability ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "noop" | "log"
    pub backend: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "none".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(".draftwise").join("config.toml"),
            aggregator: AggregatorConfig::default(),
            dispatcher: DispatcherConfig::default(),
            scheduler: SchedulerConfig::default(),
            engine: EngineConfig::default(),
            feedback: FeedbackConfig::default(),
            monitor: MonitorConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Validation(msg.to_string()));

        if self.aggregator.quiet_ms == 0 {
            return invalid("aggregator.quiet_ms must be greater than zero");
        }
        if self.aggregator.idle_ms <= self.aggregator.quiet_ms {
            return invalid("aggregator.idle_ms must exceed aggregator.quiet_ms");
        }
        if self.aggregator.channel_capacity == 0 {
            return invalid("aggregator.channel_capacity must be greater than zero");
        }
        if self.dispatcher.poll_ms == 0 {
            return invalid("dispatcher.poll_ms must be greater than zero");
        }
        for (name, interval) in &self.scheduler.intervals {
            if name.parse::<crate::analysis::AnalysisType>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "scheduler.intervals: unknown analysis type '{name}'"
                )));
            }
            if *interval == 0 {
                return Err(ConfigError::Validation(format!(
                    "scheduler.intervals.{name} must be greater than zero"
                )));
            }
        }
        if self.engine.max_sleep_ms == 0 {
            return invalid("engine.max_sleep_ms must be greater than zero");
        }

        let fb = &self.feedback;
        if fb.min_interval_ms == 0 || fb.min_interval_ms > fb.max_interval_ms {
            return invalid("feedback.min_interval_ms must be in 1..=max_interval_ms");
        }
        if !(fb.min_interval_ms..=fb.max_interval_ms).contains(&fb.interval_ms) {
            return invalid("feedback.interval_ms must lie within [min_interval_ms, max_interval_ms]");
        }
        if fb.min_priority > 10 {
            return invalid("feedback.min_priority must be within 0..=10");
        }
        if fb.max_attempts == 0 {
            return invalid("feedback.max_attempts must be greater than zero");
        }
        if fb.retry_base_ms == 0 || fb.retry_base_ms > fb.retry_max_ms {
            return invalid("feedback.retry_base_ms must be in 1..=retry_max_ms");
        }
        if !(0.0..=1.0).contains(&fb.min_acceptance_rate) {
            return invalid("feedback.min_acceptance_rate must be within [0, 1]");
        }

        let mon = &self.monitor;
        if mon.sample_interval_secs == 0 || mon.health_interval_secs == 0 {
            return invalid("monitor intervals must be greater than zero");
        }
        if mon.history_capacity == 0 {
            return invalid("monitor.history_capacity must be greater than zero");
        }

        Ok(())
    }

    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let draftwise_dir = home.join(".draftwise");
        let config_path = draftwise_dir.join("config.toml");

        if !draftwise_dir.exists() {
            fs::create_dir_all(&draftwise_dir).context("Failed to create .draftwise directory")?;
        }

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        let mut config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        // Set computed path that is skipped during serialization
        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // Observability backend: DRAFTWISE_OBSERVABILITY
        if let Ok(backend) = std::env::var("DRAFTWISE_OBSERVABILITY")
            && !backend.is_empty()
        {
            self.observability.backend = backend;
        }

        // Debounce window: DRAFTWISE_QUIET_MS
        if let Ok(raw) = std::env::var("DRAFTWISE_QUIET_MS")
            && let Ok(ms) = raw.parse::<u64>()
            && ms > 0
        {
            self.aggregator.quiet_ms = ms;
        }

        // Idle threshold: DRAFTWISE_IDLE_MS
        if let Ok(raw) = std::env::var("DRAFTWISE_IDLE_MS")
            && let Ok(ms) = raw.parse::<u64>()
            && ms > 0
        {
            self.aggregator.idle_ms = ms;
        }

        // Feedback cadence: DRAFTWISE_FEEDBACK_INTERVAL_MS
        if let Ok(raw) = std::env::var("DRAFTWISE_FEEDBACK_INTERVAL_MS")
            && let Ok(ms) = raw.parse::<u64>()
        {
            self.feedback.interval_ms =
                ms.clamp(self.feedback.min_interval_ms, self.feedback.max_interval_ms);
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
