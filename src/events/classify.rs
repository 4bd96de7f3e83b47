use super::types::{
    ChangeBatch, ContextMetadata, CursorPosition, EventPayload, Priority, SurroundingText,
    WritingContext, WritingEvent, WritingEventType,
};
use crate::util::names::scan_names;

const SCENE_BREAKS: &[&str] = &["***", "* * *", "---", "#"];

/// Build the typed event for a coalesced change batch.
pub fn event_from_batch(batch: &ChangeBatch, window_chars: usize) -> WritingEvent {
    let event_type = classify_change(&batch.change.content, batch.change.position);
    let mut event = WritingEvent::new(
        event_type,
        EventPayload::Content {
            text: batch.change.content.clone(),
        },
        priority_for(event_type),
        extract_context(batch, window_chars),
    );
    event.timestamp = batch.change.timestamp;
    event
}

/// A cursor sitting right after a scene break or a fresh heading means the
/// previous section was just finished.
pub fn classify_change(content: &str, position: CursorPosition) -> WritingEventType {
    let line_idx = position.line as usize;
    let Some(previous) = line_idx.checked_sub(1).and_then(|idx| content.split('\n').nth(idx))
    else {
        return WritingEventType::ContentChange;
    };

    let previous = previous.trim();
    let is_break = SCENE_BREAKS.contains(&previous) || previous.starts_with("# ");
    if is_break {
        WritingEventType::SectionComplete
    } else {
        WritingEventType::ContentChange
    }
}

pub fn priority_for(event_type: WritingEventType) -> Priority {
    match event_type {
        WritingEventType::SectionComplete | WritingEventType::ConsistencyCheck => Priority::High,
        WritingEventType::ContentChange
        | WritingEventType::CharacterMention
        | WritingEventType::PlotPoint
        | WritingEventType::WorldBuilding
        | WritingEventType::StyleChange => Priority::Medium,
        WritingEventType::AnalysisComplete | WritingEventType::FeedbackReady => Priority::Low,
    }
}

/// Character offset of a line/character position, clamped to the text.
pub fn char_offset(content: &str, position: CursorPosition) -> usize {
    let mut offset = 0usize;
    for (idx, line) in content.split('\n').enumerate() {
        let len = line.chars().count();
        if idx == position.line as usize {
            return offset + len.min(position.character as usize);
        }
        offset += len + 1;
    }
    content.chars().count()
}

/// Section headings, in document order. These are the plot points a
/// writer has named explicitly.
pub fn plot_points(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix('#'))
        .map(|heading| heading.trim_start_matches('#').trim())
        .filter(|heading| !heading.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn extract_context(batch: &ChangeBatch, window_chars: usize) -> WritingContext {
    let change = &batch.change;
    let offset = char_offset(&change.content, change.position);
    let start = offset.saturating_sub(window_chars);

    let before: String = change
        .content
        .chars()
        .skip(start)
        .take(offset - start)
        .collect();
    let after: String = change.content.chars().skip(offset).take(window_chars).collect();

    let prose: Vec<&str> = change
        .content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect();
    let names = scan_names(&prose.join("\n"));
    WritingContext {
        document_id: change.document_id.clone(),
        section_id: None,
        position: change.position,
        surrounding: SurroundingText { before, after },
        metadata: ContextMetadata {
            characters: names.characters,
            locations: names.locations,
            plot_points: plot_points(&change.content),
            timestamp: change.timestamp,
        },
    }
}
