use draftwise::Assistant;
use draftwise::config::Config;
use draftwise::feedback::RecordingSurface;
use std::sync::Arc;
use std::time::Duration;

/// Short timings so a whole edit-to-delivery cycle completes in well
/// under a second.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.aggregator.quiet_ms = 50;
    config.aggregator.idle_ms = 200;
    config.dispatcher.poll_ms = 20;
    config.engine.max_sleep_ms = 100;
    config.feedback.interval_ms = 250;
    config.feedback.min_interval_ms = 100;
    config.feedback.break_after_ms = 0;
    config.monitor.performance_enabled = false;
    config
}

pub fn assistant_with(config: Config) -> (Assistant, Arc<RecordingSurface>) {
    let surface = Arc::new(RecordingSurface::new());
    let assistant = Assistant::new(config, surface.clone()).unwrap();
    (assistant, surface)
}

/// Poll `check` until it holds or `within` elapses.
pub async fn wait_for<F>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
