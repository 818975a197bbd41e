//! Entity recognizer capability and the pattern-based production recognizer.

use super::{Category, DetectionSource, Span};
use crate::error::RedactorResult;
use once_cell::sync::Lazy;
use regex::Regex;

/// External named-entity recognizer.
///
/// Implementations must silently return no spans for categories they do not
/// support; an `Err` is reserved for the recognizer itself failing, and the
/// caller treats it as "no spans for this text unit".
pub trait EntityRecognizer: Send + Sync {
    fn analyze(
        &self,
        text: &str,
        categories: &[Category],
        min_confidence: f64,
    ) -> RedactorResult<Vec<Span>>;

    /// Human-readable name used in logs.
    fn name(&self) -> &str;
}

/// One compiled recognizer pattern.
struct PatternDef {
    category: Category,
    regex: Regex,
    score: f64,
    /// Lowercase words that raise the score when they appear nearby.
    context: &'static [&'static str],
    /// Extra check on the matched text.
    validate: Option<fn(&str) -> bool>,
}

/// Characters on either side of a hit searched for context words.
const CONTEXT_WINDOW: usize = 40;
const CONTEXT_BOOST: f64 = 0.1;

fn def(
    category: Category,
    pattern: &str,
    score: f64,
    context: &'static [&'static str],
) -> PatternDef {
    PatternDef {
        category,
        regex: Regex::new(pattern).expect("Valid recognizer regex pattern"),
        score,
        context,
        validate: None,
    }
}

static PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![
        def(
            Category::EmailAddress,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            1.0,
            &[],
        ),
        def(
            Category::PhoneNumber,
            r"(?:\+?\b1[-.\s]?)?\(?\b[2-9]\d{2}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
            0.7,
            &["phone", "mobile", "tel", "contact"],
        ),
        def(
            Category::PhoneNumber,
            r"\+91[-\s]?[6-9]\d{9}\b",
            0.75,
            &["phone", "mobile", "contact"],
        ),
        PatternDef {
            validate: Some(luhn_valid as fn(&str) -> bool),
            ..def(
                Category::CreditCard,
                r"\b(?:\d{4}[-\s]?){3}\d{4}\b",
                0.8,
                &["card", "credit", "visa", "mastercard"],
            )
        },
        def(
            Category::UsSsn,
            r"\b\d{3}-\d{2}-\d{4}\b",
            0.85,
            &["ssn", "social security"],
        ),
        def(
            Category::IpAddress,
            r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
            0.85,
            &["ip"],
        ),
        def(
            Category::Url,
            r#"\bhttps?://[^\s<>"]+|\bwww\.[^\s<>"]+"#,
            0.85,
            &[],
        ),
        def(
            Category::IbanCode,
            r"\b[A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){2,7}(?:\s?[A-Z0-9]{1,3})?\b",
            0.75,
            &["iban", "bank", "account"],
        ),
        def(
            Category::DateTime,
            r"(?i)\b(?:\d{1,2}[-/.]\d{1,2}[-/.](?:19|20)\d{2}|(?:19|20)\d{2}-\d{2}-\d{2}|\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(?:19|20)\d{2})\b",
            0.6,
            &["dob", "birth", "date"],
        ),
        def(
            Category::AadhaarIn,
            r"\b\d{4}[- ]?\d{4}[- ]?\d{4}\b",
            0.85,
            &["aadhaar", "uid", "uidai", "unique identification"],
        ),
        def(
            Category::PanIn,
            r"\b[A-Z]{5}[0-9]{4}[A-Z]\b",
            0.85,
            &["pan", "permanent account number", "income tax"],
        ),
    ]
});

/// Luhn checksum over the digits of `candidate`.
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Byte range reaching `CONTEXT_WINDOW` chars either side of a hit.
fn window_bounds(text: &str, start: usize, end: usize) -> (usize, usize) {
    let before = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_WINDOW - 1)
        .map_or(0, |(i, _)| i);
    let after = text[end..]
        .char_indices()
        .nth(CONTEXT_WINDOW)
        .map_or(text.len(), |(i, _)| end + i);
    (before, after)
}

/// Regex-backed recognizer for the structured categories.
///
/// Categories that need a statistical language model (PERSON, LOCATION,
/// NRP, US_PASSPORT, MEDICAL_LICENSE) are accepted and produce nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternRecognizer;

impl PatternRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl EntityRecognizer for PatternRecognizer {
    fn analyze(
        &self,
        text: &str,
        categories: &[Category],
        min_confidence: f64,
    ) -> RedactorResult<Vec<Span>> {
        let mut spans = Vec::new();

        for pattern in PATTERNS.iter().filter(|p| categories.contains(&p.category)) {
            for m in pattern.regex.find_iter(text) {
                if pattern.validate.is_some_and(|check| !check(m.as_str())) {
                    continue;
                }

                let mut score = pattern.score;
                if !pattern.context.is_empty() {
                    let (lo, hi) = window_bounds(text, m.start(), m.end());
                    let window = text[lo..hi].to_lowercase();
                    if pattern.context.iter().any(|word| window.contains(word)) {
                        score = (score + CONTEXT_BOOST).min(1.0);
                    }
                }

                if score < min_confidence {
                    continue;
                }

                spans.extend(Span::from_range(
                    text,
                    m.start(),
                    m.end(),
                    pattern.category,
                    score,
                    DetectionSource::Recognizer,
                ));
            }
        }

        Ok(spans)
    }

    fn name(&self) -> &str {
        "PatternRecognizer"
    }
}
