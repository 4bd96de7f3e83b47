use super::pipeline_harness::{assistant_with, fast_config};
use draftwise::feedback::{Feedback, FeedbackResponse, FeedbackType, ResponseAction};

#[test]
fn rejections_slow_down_delivery_and_acceptance_speeds_it_up() {
    let mut config = fast_config();
    config.feedback.interval_ms = 1_000;
    config.feedback.max_interval_ms = 10_000;
    let (assistant, _surface) = assistant_with(config);

    assistant.record_response(FeedbackResponse::new("f-1", ResponseAction::Rejected));
    assert_eq!(assistant.controller().interval_ms(), 1_500);
    assistant.record_response(FeedbackResponse::new("f-2", ResponseAction::Ignored));
    assert_eq!(assistant.controller().interval_ms(), 2_250);

    for n in 0..8 {
        assistant.record_response(FeedbackResponse::new(format!("a-{n}"), ResponseAction::Accepted));
    }
    // 8 of 10 accepted
    assert!(assistant.controller().interval_ms() < 2_250);
    assert!(assistant.controller().interval_ms() >= 100);
}

#[test]
fn queued_feedback_counts_toward_depth() {
    let (assistant, _surface) = assistant_with(fast_config());
    assistant.queue_feedback(Feedback::new(FeedbackType::PacingAdvice, "Scene drags", 3));
    assistant.queue_feedback(Feedback::new(FeedbackType::PlotIssue, "Timeline gap", 8));
    assert_eq!(assistant.controller().queue_depth(), 2);
}
