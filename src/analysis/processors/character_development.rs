use crate::analysis::types::{
    AnalysisType, ContentProcessor, Finding, ProcessorOutput, Severity,
};
use crate::util::names::{Word, looks_like_name, words};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

const MIN_CHARS: usize = 200;
const CONFIDENCE: f64 = 0.85;

/// Flags names that appear exactly once: characters introduced and then
/// dropped from the story.
#[derive(Debug, Default)]
pub struct CharacterDevelopmentProcessor;

impl CharacterDevelopmentProcessor {
    pub fn new() -> Self {
        Self
    }

    fn scan(content: &str) -> Vec<Finding> {
        let words = words(content);

        // Names are recognised mid-sentence only; sentence-initial
        // occurrences still count towards how often a name comes back.
        let mut mentions: HashMap<String, usize> = HashMap::new();
        for word in &words {
            *mentions.entry(word.base().to_string()).or_default() += 1;
        }

        let mut flagged: Vec<&Word> = Vec::new();
        for word in words.iter().filter(|w| !w.sentence_start) {
            if looks_like_name(&word.text)
                && mentions.get(word.base()) == Some(&1)
                && !flagged.iter().any(|w| w.text == word.text)
            {
                flagged.push(word);
            }
        }

        flagged
            .into_iter()
            .map(|word| {
                let name = word.base();
                Finding::new(
                    "single_mention",
                    Severity::Warning,
                    format!("{name} is introduced once and never mentioned again"),
                )
                .at(word.start, word.end)
                .with_excerpt(name)
            })
            .collect()
    }
}

impl ContentProcessor for CharacterDevelopmentProcessor {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::CharacterDevelopment
    }

    fn can_process(&self, content: &str) -> bool {
        content.chars().count() >= MIN_CHARS
    }

    fn process<'a>(
        &'a self,
        content: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProcessorOutput>> + Send + 'a>> {
        Box::pin(async move {
            Ok(ProcessorOutput {
                findings: Self::scan(content),
                confidence: CONFIDENCE,
            })
        })
    }
}
