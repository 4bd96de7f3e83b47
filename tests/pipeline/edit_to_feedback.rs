use super::pipeline_harness::{assistant_with, fast_config, wait_for};
use draftwise::events::{CallbackListener, ContentChange, WritingEventType};
use draftwise::feedback::DisplayLevel;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DRAFT: &str = "The lighthouse keeper climbed the stairs every evening at dusk. \
                     TODO decide what he finds at the top of the tower tonight. \
                     The sea was calm and grey.";

#[tokio::test]
async fn placeholder_in_draft_surfaces_as_inline_comment() {
    let (assistant, surface) = assistant_with(fast_config());

    let ready = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&ready);
    assistant.dispatcher().add_listener(
        WritingEventType::FeedbackReady,
        Arc::new(CallbackListener::new("ready_counter", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
    );

    assistant.start().unwrap();
    assistant
        .submit_edit(ContentChange::new("chapter-1", DRAFT))
        .await
        .unwrap();

    let delivered = wait_for(Duration::from_secs(5), || !surface.inline_comments().is_empty()).await;
    assert!(delivered, "no inline comment delivered");

    let comment = &surface.inline_comments()[0];
    assert_eq!(comment.level, DisplayLevel::Warning);
    let span = comment.range;
    let marker: String = DRAFT.chars().skip(span.start).take(span.end - span.start).collect();
    assert_eq!(marker, "TODO");

    assert!(wait_for(Duration::from_secs(2), || ready.load(Ordering::SeqCst) > 0).await);
    assert!(assistant.engine().stats().deep_runs >= 1);
    assert!(assistant.controller().stats().delivered >= 1);

    assistant.shutdown().await;
}

const HARBOUR: &str = "Elena walked down to the harbour before sunrise. She counted the boats \
                        and Elena smiled at the fishermen mending their nets. A stranger named \
                        Marcus waved from the pier, then vanished into the fog. Elena went home \
                        and made tea by the window.";

#[tokio::test]
async fn character_mentioned_once_reaches_the_writer() {
    let (assistant, surface) = assistant_with(fast_config());
    assistant.start().unwrap();
    assistant
        .submit_edit(ContentChange::new("chapter-3", HARBOUR))
        .await
        .unwrap();

    let delivered = wait_for(Duration::from_secs(5), || !surface.inline_comments().is_empty()).await;
    assert!(delivered, "single-mention finding never reached the surface");

    let comment = &surface.inline_comments()[0];
    let span = comment.range;
    let name: String = HARBOUR.chars().skip(span.start).take(span.end - span.start).collect();
    assert_eq!(name, "Marcus");
    assert_eq!(comment.level, DisplayLevel::Warning);
    assert!(assistant.controller().archived().is_empty());

    assistant.shutdown().await;
}

#[tokio::test]
async fn burst_of_edits_reaches_listeners_as_one_event() {
    let mut config = fast_config();
    config.aggregator.quiet_ms = 100;
    config.aggregator.idle_ms = 1_000;
    let (assistant, _surface) = assistant_with(config);

    let texts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&texts);
    assistant.dispatcher().add_listener(
        WritingEventType::ContentChange,
        Arc::new(CallbackListener::new("change_recorder", move |event| {
            if let Some(text) = event.payload.text() {
                sink.lock().unwrap().push(text.to_string());
            }
            Ok(())
        })),
    );

    assistant.start().unwrap();
    for draft in ["T", "Th", "The", "The s", "The sea"] {
        assistant
            .submit_edit(ContentChange::new("chapter-2", draft))
            .await
            .unwrap();
    }

    assert!(wait_for(Duration::from_secs(2), || !texts.lock().unwrap().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*texts.lock().unwrap(), vec!["The sea".to_string()]);

    assistant.shutdown().await;
}
