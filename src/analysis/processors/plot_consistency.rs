use crate::analysis::types::{
    AnalysisType, ContentProcessor, Finding, ProcessorOutput, Severity,
};
use crate::util::truncate_with_ellipsis;
use std::future::Future;
use std::pin::Pin;

const MIN_CHARS: usize = 100;
const CONFIDENCE: f64 = 0.8;
const EXCERPT_CHARS: usize = 80;

/// Marker text and whether it must stand alone as a word.
const MARKERS: &[(&str, bool, Severity)] = &[
    ("TODO", true, Severity::Warning),
    ("FIXME", true, Severity::Warning),
    ("TK", true, Severity::Warning),
    ("[...]", false, Severity::Warning),
    ("[TBD]", false, Severity::Warning),
    ("???", false, Severity::Suggestion),
];

/// Flags placeholders left in the draft: plot holes the author marked but
/// never came back to.
#[derive(Debug, Default)]
pub struct PlotConsistencyProcessor;

impl PlotConsistencyProcessor {
    pub fn new() -> Self {
        Self
    }

    fn scan(content: &str) -> Vec<Finding> {
        let chars: Vec<char> = content.chars().collect();
        let mut findings = Vec::new();

        for (marker, whole_word, severity) in MARKERS {
            let needle: Vec<char> = marker.chars().collect();
            let mut idx = 0;
            while idx + needle.len() <= chars.len() {
                if chars[idx..idx + needle.len()] != needle[..] {
                    idx += 1;
                    continue;
                }
                let end = idx + needle.len();
                let bounded = !whole_word
                    || ((idx == 0 || !chars[idx - 1].is_alphanumeric())
                        && (end == chars.len() || !chars[end].is_alphanumeric()));
                if bounded {
                    findings.push(
                        Finding::new(
                            "unresolved_placeholder",
                            *severity,
                            format!("Unresolved placeholder '{marker}' left in the draft"),
                        )
                        .at(idx, end)
                        .with_excerpt(line_excerpt(&chars, idx)),
                    );
                }
                idx = end;
            }
        }

        findings.sort_by_key(|f| f.location.map(|span| span.start));
        findings
    }
}

fn line_excerpt(chars: &[char], at: usize) -> String {
    let start = chars[..at]
        .iter()
        .rposition(|c| *c == '\n')
        .map_or(0, |pos| pos + 1);
    let end = chars[at..]
        .iter()
        .position(|c| *c == '\n')
        .map_or(chars.len(), |pos| at + pos);
    let line: String = chars[start..end].iter().collect();
    truncate_with_ellipsis(line.trim(), EXCERPT_CHARS)
}

impl ContentProcessor for PlotConsistencyProcessor {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::PlotConsistency
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::TextSpan;

    #[test]
    fn short_content_is_declined() {
        let p = PlotConsistencyProcessor::new();
        assert!(!p.can_process("Too short."));
        assert!(p.can_process(&"a".repeat(100)));
    }

    #[test]
    fn finds_placeholders_with_char_offsets() {
        let text = "Mara opened the vault. TODO: explain the key.\nThe guard was [...] asleep.";
        let findings = PlotConsistencyProcessor::scan(text);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].location, Some(TextSpan { start: 23, end: 27 }));
        assert_eq!(
            findings[0].excerpt.as_deref(),
            Some("Mara opened the vault. TODO: explain the key.")
        );
        assert_eq!(findings[1].excerpt.as_deref(), Some("The guard was [...] asleep."));
    }

    #[test]
    fn word_markers_ignore_embedded_letters() {
        let findings = PlotConsistencyProcessor::scan("TKO in round TK. Toddlers. TODOS");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].location, Some(TextSpan { start: 13, end: 15 }));
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let findings = PlotConsistencyProcessor::scan("Café ??? later");
        assert_eq!(findings[0].location, Some(TextSpan { start: 5, end: 8 }));
        assert_eq!(findings[0].severity, Severity::Suggestion);
    }

    #[tokio::test]
    async fn process_reports_confidence() {
        let p = PlotConsistencyProcessor::new();
        let out = p.process("Clean prose with nothing left open.").await.unwrap();
        assert!(out.findings.is_empty());
        assert!((out.confidence - 0.8).abs() < f64::EPSILON);
    }
}
