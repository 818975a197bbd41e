//! User keyword matching: exact, fuzzy and regex modes.

use super::similarity::{partial_ratio, ratio};
use super::{Category, DetectionSource, MatchMode, Span};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Keywords longer than this also get a partial (substring) similarity check.
const PARTIAL_MIN_CHARS: usize = 4;

/// Matcher for user-supplied keyword and pattern lists.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }

    fn word_pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\w+").expect("Valid word token regex"));
        &PATTERN
    }

    /// Runs the matcher selected by `mode` over `text`.
    pub fn find(
        &self,
        text: &str,
        keywords: &[String],
        mode: MatchMode,
        fuzzy_threshold: u8,
    ) -> Vec<Span> {
        match mode {
            MatchMode::Exact => self.exact(text, keywords),
            MatchMode::Fuzzy => self.fuzzy(text, keywords, fuzzy_threshold),
            MatchMode::Regex => self.regex(text, keywords),
        }
    }

    /// Case-insensitive literal search reporting an occurrence at every
    /// distinct start offset, overlapping occurrences included.
    pub fn exact(&self, text: &str, keywords: &[String]) -> Vec<Span> {
        let mut spans = Vec::new();

        for keyword in keywords {
            let keyword = keyword.trim();
            if keyword.is_empty() {
                continue;
            }

            let needle = match RegexBuilder::new(&regex::escape(keyword))
                .case_insensitive(true)
                .build()
            {
                Ok(re) => re,
                Err(e) => {
                    warn!(keyword, error = %e, "keyword could not be compiled for exact search");
                    continue;
                }
            };

            let mut from = 0;
            while let Some(m) = needle.find_at(text, from) {
                spans.extend(Span::from_range(
                    text,
                    m.start(),
                    m.end(),
                    Category::CustomKeyword,
                    1.0,
                    DetectionSource::Exact,
                ));
                // Step one char past the start so overlapping hits are seen.
                from = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
                if from > text.len() {
                    break;
                }
            }
        }

        spans
    }

    /// Similarity match of every word token against the keywords.
    ///
    /// A token is reported at most once: the first keyword that clears the
    /// threshold wins, not the best-scoring one.
    pub fn fuzzy(&self, text: &str, keywords: &[String], threshold: u8) -> Vec<Span> {
        let threshold = f64::from(threshold.min(100));
        let keywords: Vec<&str> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        let mut spans = Vec::new();

        for token in Self::word_pattern().find_iter(text) {
            let word = token.as_str();

            for keyword in &keywords {
                let score = ratio(word, keyword);
                if score >= threshold {
                    spans.extend(Span::from_range(
                        text,
                        token.start(),
                        token.end(),
                        Category::CustomKeyword,
                        score / 100.0,
                        DetectionSource::Fuzzy,
                    ));
                    break;
                }

                if keyword.chars().count() > PARTIAL_MIN_CHARS {
                    let partial = partial_ratio(keyword, word);
                    if partial >= threshold {
                        spans.extend(Span::from_range(
                            text,
                            token.start(),
                            token.end(),
                            Category::CustomKeyword,
                            partial / 100.0,
                            DetectionSource::FuzzyPartial,
                        ));
                        break;
                    }
                }
            }
        }

        spans
    }

    /// Case-insensitive regex search. Patterns that fail to compile are
    /// logged and skipped; the remaining patterns still run.
    pub fn regex(&self, text: &str, patterns: &[String]) -> Vec<Span> {
        let mut spans = Vec::new();

        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }

            let re = match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => re,
                Err(e) => {
                    warn!(pattern, error = %e, "skipping invalid regex pattern");
                    continue;
                }
            };

            spans.extend(re.find_iter(text).filter_map(|m| {
                Span::from_range(
                    text,
                    m.start(),
                    m.end(),
                    Category::CustomPattern,
                    1.0,
                    DetectionSource::Regex,
                )
            }));
        }

        spans
    }
}
