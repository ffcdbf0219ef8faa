//! Word windows around an occurrence.

/// Default number of words kept on each side of an occurrence.
pub const DEFAULT_RADIUS: usize = 80;

/// A whitespace-delimited word and its byte span.
#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    end: usize,
}

/// Precomputed word boundaries for one text, so that building many windows
/// over the same document tokenizes it once.
#[derive(Debug, Clone)]
pub struct WordIndex<'a> {
    text: &'a str,
    words: Vec<Word>,
}

impl<'a> WordIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut words = Vec::new();
        let mut current: Option<usize> = None;
        for (pos, ch) in text.char_indices() {
            match (ch.is_whitespace(), current) {
                (true, Some(start)) => {
                    words.push(Word { start, end: pos });
                    current = None;
                }
                (false, None) => current = Some(pos),
                _ => {}
            }
        }
        if let Some(start) = current {
            words.push(Word {
                start,
                end: text.len(),
            });
        }
        Self { text, words }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// The words overlapping `[start, end)`, extended by `radius` words on
    /// each side and clipped at the text boundaries, joined by single spaces.
    ///
    /// Returns an empty string when the span touches no word.
    pub fn window(&self, start: usize, end: usize, radius: usize) -> String {
        let Some(first) = self.words.iter().position(|w| w.end > start && w.start < end) else {
            return String::new();
        };
        let last = self
            .words
            .iter()
            .rposition(|w| w.end > start && w.start < end)
            .unwrap_or(first);

        let lo = first.saturating_sub(radius);
        let hi = (last + 1 + radius).min(self.words.len());

        self.words[lo..hi]
            .iter()
            .map(|w| &self.text[w.start..w.end])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One-shot helper for a single window.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    WordIndex::new(text).window(start, end, radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn window_extends_radius_words_each_side() {
        let text = numbered_words(21);
        // "w10" is the middle word.
        let start = text.find("w10").unwrap();
        let window = context_window(&text, start, start + 3, 2);
        assert_eq!(window, "w8 w9 w10 w11 w12");
    }

    #[test]
    fn window_is_clipped_at_document_start() {
        let text = numbered_words(10);
        let window = context_window(&text, 0, 2, 3);
        assert_eq!(window, "w0 w1 w2 w3");
    }

    #[test]
    fn window_is_clipped_at_document_end() {
        let text = numbered_words(10);
        let start = text.find("w9").unwrap();
        let window = context_window(&text, start, text.len(), 3);
        assert_eq!(window, "w6 w7 w8 w9");
    }

    #[test]
    fn multi_word_occurrence_is_kept_whole() {
        let text = "a b c Company: [COMPANY NAME] d e f";
        let start = text.find('[').unwrap();
        let end = text.find(']').unwrap() + 1;
        let window = context_window(text, start, end, 1);
        assert_eq!(window, "Company: [COMPANY NAME] d");
    }

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        let text = "one\n\ntwo\t [X]   three";
        let start = text.find('[').unwrap();
        let window = context_window(text, start, start + 3, 80);
        assert_eq!(window, "one two [X] three");
    }

    #[test]
    fn window_word_count_is_bounded() {
        let text = numbered_words(500);
        let start = text.find("w250").unwrap();
        let window = context_window(&text, start, start + 4, DEFAULT_RADIUS);
        assert_eq!(window.split(' ').count(), 2 * DEFAULT_RADIUS + 1);
    }

    #[test]
    fn token_glued_to_punctuation_counts_as_its_word() {
        let text = "dated [DATE OF SAFE].";
        let start = text.find('[').unwrap();
        let end = text.find(']').unwrap() + 1;
        assert_eq!(context_window(text, start, end, 0), "[DATE OF SAFE].");
    }
}
