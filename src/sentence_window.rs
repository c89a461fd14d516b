/*!
 * Sentence window extraction.
 *
 * Given timed caption chunks and a vocabulary word, this module finds the first
 * chunk containing the word as a whole token, grows the selection to the
 * surrounding sentence, and clamps the result to a bounded time window.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::caption_parser::Chunk;

/// Padding added on each side of the final window, in seconds
pub const WINDOW_PADDING_SECS: f64 = 0.5;

// @const: Whitespace collapse for assembled sentences
static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Shortest window a finder will produce, in seconds
pub const MIN_WINDOW_SECS: f64 = 1.0;

/// Float slack when comparing rounded spans against the bound
pub const SPAN_TOLERANCE: f64 = 1e-9;

const SENTENCE_TERMINALS: [char; 4] = ['.', '!', '?', '…'];

/// Time window and reconstructed sentence for one word
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    /// Window start in seconds, rounded to 2 decimals
    pub start: f64,
    /// Window end in seconds, rounded to 2 decimals
    pub end: f64,
    /// Chunk texts joined by single spaces
    pub sentence: String,
}

impl WindowResult {
    /// Span of the window in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Computes bounded sentence windows around a word
#[derive(Debug, Clone, Copy)]
pub struct WindowFinder {
    /// How many chunks to walk on either side looking for a sentence boundary
    max_expand: usize,
    /// Hard upper bound on the window span, in seconds
    max_duration: f64,
}

impl WindowFinder {
    /// `max_duration` below [`MIN_WINDOW_SECS`] (or NaN) is raised to it
    pub fn new(max_expand: usize, max_duration: f64) -> Self {
        Self {
            max_expand,
            max_duration: max_duration.max(MIN_WINDOW_SECS),
        }
    }

    pub fn max_expand(&self) -> usize {
        self.max_expand
    }

    pub fn max_duration(&self) -> f64 {
        self.max_duration
    }

    /// Find the window for `word`, or `None` when the word never appears as a
    /// whole token. Only the first occurrence is considered.
    pub fn find(&self, chunks: &[Chunk], word: &str) -> Option<WindowResult> {
        let matcher = WordMatcher::new(word)?;
        let hit = chunks.iter().position(|chunk| matcher.matches(&chunk.text))?;

        let (mut left, mut right) = self.expand_to_sentence(chunks, hit);

        let half = self.max_duration / 2.0;
        let clip_start = chunks[left].start.max(chunks[hit].start - half);
        let clip_end = clip_start + self.max_duration;

        while left < hit && chunks[left].start < clip_start {
            left += 1;
        }
        while right > hit && chunks[right].end > clip_end {
            right -= 1;
        }

        if chunks[right].end - chunks[left].start > self.max_duration {
            left = hit;
            right = hit;
        }

        let final_start = chunks[left].start;
        let final_end = chunks[right].end;

        let joined = chunks[left..=right]
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let sentence = WHITESPACE_REGEX.replace_all(&joined, " ").trim().to_string();

        let (start, end) = self.pad(final_start, final_end);
        Some(WindowResult {
            start,
            end,
            sentence,
        })
    }

    /// Walk outwards from the hit without crossing a finished sentence.
    ///
    /// Leftwards we stop before a chunk that closes the previous sentence;
    /// rightwards we stop on the first added chunk that closes a sentence.
    fn expand_to_sentence(&self, chunks: &[Chunk], hit: usize) -> (usize, usize) {
        let mut left = hit;
        while left > 0 && hit - left < self.max_expand {
            if ends_sentence(&chunks[left - 1].text) {
                break;
            }
            left -= 1;
        }

        let mut right = hit;
        while right + 1 < chunks.len() && right - hit < self.max_expand {
            right += 1;
            if ends_sentence(&chunks[right].text) {
                break;
            }
        }

        (left, right)
    }

    fn pad(&self, final_start: f64, final_end: f64) -> (f64, f64) {
        let pad_start = (final_start - WINDOW_PADDING_SECS).max(0.0);
        let mut pad_end = final_end + WINDOW_PADDING_SECS;
        if pad_end - pad_start > self.max_duration {
            pad_end = pad_start + self.max_duration;
        }

        let start = round2(pad_start);
        let mut end = round2(pad_end);
        // rounding both ends can add a hundredth to the span
        if end - start > self.max_duration + SPAN_TOLERANCE {
            end = floor2(start + self.max_duration);
        }
        (start, end)
    }
}

/// Case-insensitive whole-token matcher for a single word
#[derive(Debug, Clone)]
pub struct WordMatcher {
    pattern: Regex,
}

impl WordMatcher {
    /// `None` for a blank word
    pub fn new(word: &str) -> Option<Self> {
        let word = word.trim();
        if word.is_empty() {
            return None;
        }
        let pattern = Regex::new(&format!("(?i){}", regex::escape(word))).ok()?;
        Some(Self { pattern })
    }

    /// A token boundary is any non-word character or the edge of the text,
    /// so "art" does not match inside "start".
    pub fn matches(&self, text: &str) -> bool {
        let mut from = 0;
        while let Some(found) = self.pattern.find_at(text, from) {
            let before_ok = text[..found.start()]
                .chars()
                .next_back()
                .is_none_or(|c| !is_word_char(c));
            let after_ok = text[found.end()..]
                .chars()
                .next()
                .is_none_or(|c| !is_word_char(c));
            if before_ok && after_ok {
                return true;
            }
            // retry one character later so overlapping candidates are not skipped
            match text[found.start()..].chars().next() {
                Some(c) => from = found.start() + c.len_utf8(),
                None => break,
            }
        }
        false
    }
}

/// Convenience wrapper around [`WordMatcher`]
pub fn contains_whole_word(text: &str, word: &str) -> bool {
    WordMatcher::new(word).is_some_and(|m| m.matches(text))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(SENTENCE_TERMINALS)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn floor2(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}
