use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `draftwise`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; plugin seams (processors, strategies,
/// listeners, probes) return `anyhow::Result` and are wrapped here.
#[derive(Debug, Error)]
pub enum DraftwiseError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Analysis ────────────────────────────────────────────────────────
    #[error("analysis: {0}")]
    Analysis(#[from] AnalysisError),

    // ── Event dispatch ──────────────────────────────────────────────────
    #[error("dispatch: {0}")]
    Dispatch(#[from] DispatchError),

    // ── Feedback delivery ───────────────────────────────────────────────
    #[error("delivery: {0}")]
    Delivery(#[from] DeliveryError),

    // ── Health probes ───────────────────────────────────────────────────
    #[error("probe: {0}")]
    Probe(#[from] ProbeError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Analysis errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("processor {analysis_type} failed on task {task_id}: {message}")]
    ProcessorFailed {
        task_id: String,
        analysis_type: String,
        message: String,
    },

    #[error("no processor registered for {0}")]
    NoProcessor(String),

    #[error("processor {0} declined the content")]
    Declined(String),
}

// ─── Dispatch errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("listener for {event_type} failed: {message}")]
    ListenerFailed { event_type: String, message: String },

    #[error("listener for {event_type} panicked")]
    ListenerPanicked { event_type: String },
}

// ─── Delivery errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("strategy {strategy} failed to deliver {feedback_id}: {message}")]
    Strategy {
        strategy: String,
        feedback_id: String,
        message: String,
    },

    #[error("no strategy accepts feedback {0}")]
    NoStrategy(String),
}

// ─── Probe errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("component {component} check failed: {message}")]
    Failed { component: String, message: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, DraftwiseError>;
