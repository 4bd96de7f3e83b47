use draftwise::Assistant;
use draftwise::analysis::AnalysisType;
use draftwise::config::Config;
use draftwise::feedback::LogSurface;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn configured_intervals_flow_into_the_scheduler() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[aggregator]
quiet_ms = 250

[scheduler.intervals]
writing_style = 45000
theme = 9000000
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.aggregator.quiet_ms, 250);
    assert_eq!(config.config_path, path);

    let assistant = Assistant::new(config, Arc::new(LogSurface::new())).unwrap();
    let scheduler = assistant.engine().scheduler();
    assert_eq!(scheduler.interval(AnalysisType::WritingStyle), 45_000);
    assert_eq!(scheduler.interval(AnalysisType::Theme), 3_600_000);
    assert_eq!(scheduler.optimal_interval(), 45_000);
}

#[test]
fn unknown_analysis_type_in_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[scheduler.intervals]\nsarcasm = 60000\n").unwrap();
    assert!(Config::load_from(&path).is_err());
}
