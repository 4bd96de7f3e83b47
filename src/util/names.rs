//! Lexical scanning for proper names in prose.

const MIN_NAME_CHARS: usize = 3;

/// Capitalised words that are never character names.
const COMMON_WORDS: &[&str] = &[
    "The", "And", "But", "Then", "When", "She", "He", "They", "His", "Her", "Their", "This",
    "That", "There", "What", "Where", "Who", "Why", "How", "Mr", "Mrs", "Ms", "Dr", "Chapter",
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

/// Words that put the following name in a place rather than a person.
const PLACE_PREPOSITIONS: &[&str] = &["in", "at", "from", "to", "into", "near", "across"];

/// One alphabetic word with its character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub sentence_start: bool,
}

impl Word {
    /// The word with any possessive `'s` removed.
    pub fn base(&self) -> &str {
        self.text.trim_end_matches("'s")
    }
}

pub fn words(content: &str) -> Vec<Word> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let mut at_sentence_start = true;
    let mut word_sentence_start = true;

    for (idx, ch) in content.chars().enumerate() {
        if ch.is_alphabetic() || (ch == '\'' && !current.is_empty()) {
            if current.is_empty() {
                start = idx;
                word_sentence_start = at_sentence_start;
            }
            current.push(ch);
            continue;
        }

        if !current.is_empty() {
            let text = std::mem::take(&mut current);
            out.push(Word {
                end: start + text.chars().count(),
                text,
                start,
                sentence_start: word_sentence_start,
            });
            at_sentence_start = false;
        }
        if matches!(ch, '.' | '!' | '?' | '\n') {
            at_sentence_start = true;
        }
    }

    if !current.is_empty() {
        out.push(Word {
            end: start + current.chars().count(),
            text: current,
            start,
            sentence_start: word_sentence_start,
        });
    }
    out
}

pub fn looks_like_name(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_uppercase()
        && chars.all(|c| c.is_lowercase() || c == '\'')
        && word.chars().count() >= MIN_NAME_CHARS
        && !COMMON_WORDS.contains(&word.trim_end_matches("'s"))
}

/// Names found mid-sentence, split into people and places by the word in
/// front of them. Each list keeps first-appearance order without repeats.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameScan {
    pub characters: Vec<String>,
    pub locations: Vec<String>,
}

pub fn scan_names(content: &str) -> NameScan {
    let words = words(content);
    let mut scan = NameScan::default();

    for (idx, word) in words.iter().enumerate() {
        if word.sentence_start || !looks_like_name(&word.text) {
            continue;
        }
        let after_preposition = idx
            .checked_sub(1)
            .and_then(|prev| words.get(prev))
            .is_some_and(|prev| PLACE_PREPOSITIONS.contains(&prev.text.to_lowercase().as_str()));
        let list = if after_preposition {
            &mut scan.locations
        } else {
            &mut scan.characters
        };
        if !list.iter().any(|name| name == word.base()) {
            list.push(word.base().to_string());
        }
    }

    // A name seen both ways is a person who was somewhere.
    scan.locations
        .retain(|place| !scan.characters.iter().any(|name| name == place));
    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_track_offsets_and_sentence_starts() {
        let w = words("Mara ran. Then Tobias's dog barked");
        assert_eq!(w[0].text, "Mara");
        assert!(w[0].sentence_start);
        assert!(!w[1].sentence_start);
        assert!(w[2].sentence_start);
        assert_eq!(w[3].base(), "Tobias");
        assert_eq!((w[3].start, w[3].end), (15, 23));
    }

    #[test]
    fn name_shape_rules() {
        assert!(looks_like_name("Elena"));
        assert!(looks_like_name("Elena's"));
        assert!(!looks_like_name("Al"));
        assert!(!looks_like_name("NASA"));
        assert!(!looks_like_name("elena"));
        assert!(!looks_like_name("Monday"));
    }

    #[test]
    fn places_follow_prepositions() {
        let scan = scan_names(
            "The ship left with Elena aboard. They sailed to Lisbon and met Marcus in Porto. \
             Later Elena wrote from Porto.",
        );
        assert_eq!(scan.characters, vec!["Elena", "Marcus"]);
        assert_eq!(scan.locations, vec!["Lisbon", "Porto"]);
    }

    #[test]
    fn person_seen_after_preposition_stays_a_person() {
        let scan = scan_names("She waved to Ilsa. Later, Ilsa smiled.");
        assert_eq!(scan.characters, vec!["Ilsa"]);
        assert!(scan.locations.is_empty());
    }
}
