//! Label-context heuristic for table and form layouts.
//!
//! Forms print a field label followed by its value on the same row, for
//! example `Father Name          KISHOR KUMAR`. Statistical recognizers
//! often miss such upper-case values, so this matcher captures the value
//! after a known label and reports only the value's range.

use super::deny::DenyList;
use super::{Category, DetectionSource, Span};
use once_cell::sync::Lazy;
use regex::Regex;

const LABEL_CONFIDENCE: f64 = 0.85;

/// Raw value length bounds (first letter plus 2–40 continuation chars).
const VALUE_MIN_CHARS: usize = 3;
const VALUE_MAX_CHARS: usize = 41;

/// Finds values that follow a person-related field label.
#[derive(Debug, Clone)]
pub struct LabelHeuristicMatcher<'a> {
    deny_list: &'a DenyList,
}

impl<'a> LabelHeuristicMatcher<'a> {
    pub fn new(deny_list: &'a DenyList) -> Self {
        Self { deny_list }
    }

    /// Label, optional qualifier, separators and the optional
    /// "as in Aadhaar" phrase. The value itself is scanned by hand since it
    /// has to stop in front of a double space.
    fn label_pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"(?ix)
                \b(?:name|student|father|mother|guardian|husband|wife)
                (?:\s+(?:name|of|student)\b)?
                [\s:\-.]+
                (?:as\s+in\s+aadhaar)?
                [\s:\-.]*",
            )
            .expect("Valid label regex pattern")
        });
        &PATTERN
    }

    /// Returns the end offset of the value starting at `start`, or `None`
    /// when no acceptable value begins there.
    fn scan_value(text: &str, start: usize) -> Option<usize> {
        let rest = &text[start..];
        let mut chars = rest.char_indices().peekable();

        match chars.peek() {
            Some((_, c)) if c.is_alphabetic() => {}
            _ => return None,
        }

        let mut count = 0;
        let mut end = start;
        while let Some((offset, c)) = chars.next() {
            let allowed = c.is_alphabetic() || c == '.' || c == ' ' || c == '\t';
            if !allowed {
                // Only a newline terminates cleanly; digits and punctuation
                // mean this is not a plain name value.
                return (c == '\n' || c == '\r').then_some(end);
            }
            if c.is_whitespace() && chars.peek().is_some_and(|(_, n)| n.is_whitespace()) {
                return Some(end);
            }
            count += 1;
            end = start + offset + c.len_utf8();
            if count == VALUE_MAX_CHARS {
                // At the cap: valid only if a terminator follows right here.
                let tail = &text[end..];
                let terminated = tail.is_empty()
                    || tail.starts_with('\n')
                    || tail.starts_with("\r\n")
                    || tail.chars().take(2).filter(|c| c.is_whitespace()).count() == 2;
                return terminated.then_some(end);
            }
        }

        Some(end)
    }

    fn accept(&self, value: &str) -> bool {
        let lower = value.to_lowercase();
        value.chars().count() >= 2
            && !self.deny_list.contains(&lower)
            && !lower.contains("id")
            && !lower.contains("number")
    }

    /// Scans `text` and returns one PERSON span per accepted label value.
    pub fn find(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut from = 0;

        while let Some(label) = Self::label_pattern().find_at(text, from) {
            from = label.end().max(label.start() + 1);

            let value_start = label.end();
            let Some(value_end) = Self::scan_value(text, value_start) else {
                continue;
            };
            if text[value_start..value_end].chars().count() < VALUE_MIN_CHARS {
                continue;
            }

            let raw = &text[value_start..value_end];
            let trimmed = raw.trim();
            let lead = raw.len() - raw.trim_start().len();
            let start = value_start + lead;
            let end = start + trimmed.len();

            if !self.accept(trimmed) {
                continue;
            }

            spans.extend(Span::from_range(
                text,
                start,
                end,
                Category::Person,
                LABEL_CONFIDENCE,
                DetectionSource::LabelHeuristic,
            ));
            from = value_end;
        }

        spans
    }
}
