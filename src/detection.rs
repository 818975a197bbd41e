//! Hybrid span detection: recognizer, keyword and label layers merged into
//! one overlap-free, noise-filtered span list.

use crate::domain::{
    Category, DenyList, DenyListFilter, EntityRecognizer, KeywordMatcher, LabelHeuristicMatcher,
    MatchMode, OverlapResolver, PatternRecognizer, Span,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default minimum recognizer confidence.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

/// Default fuzzy similarity threshold (0–100).
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 85;

/// Detection engine combining every detector layer.
///
/// # Examples
///
/// ```
/// use piiredact::{Category, HybridDetector, MatchMode};
///
/// let detector = HybridDetector::with_pattern_recognizer();
/// let spans = detector.detect(
///     "Father Name  KISHOR KUMAR",
///     None,
///     MatchMode::Exact,
///     85,
///     Some(&[Category::Person]),
/// );
/// assert_eq!(spans.len(), 1);
/// assert_eq!(spans[0].text, "KISHOR KUMAR");
/// ```
pub struct HybridDetector {
    recognizer: Box<dyn EntityRecognizer>,
    enabled_categories: Vec<Category>,
    min_confidence: f64,
    deny_list: DenyList,
    keywords: KeywordMatcher,
}

impl HybridDetector {
    /// Creates a detector around the given recognizer with default
    /// categories and the standard deny list.
    pub fn new(recognizer: Box<dyn EntityRecognizer>) -> Self {
        Self {
            recognizer,
            enabled_categories: Category::defaults(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            deny_list: DenyList::standard().clone(),
            keywords: KeywordMatcher::new(),
        }
    }

    /// Creates a detector backed by the built-in [`PatternRecognizer`].
    pub fn with_pattern_recognizer() -> Self {
        Self::new(Box::new(PatternRecognizer::new()))
    }

    /// Sets the categories used when a call does not choose its own.
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.enabled_categories = categories;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_deny_list(mut self, deny_list: DenyList) -> Self {
        self.deny_list = deny_list;
        self
    }

    /// Runs every detector layer over `text`.
    ///
    /// `enabled_categories`: `None` uses the detector's configured set, an
    /// empty slice disables the recognizer layer. The keyword layer runs only
    /// when keywords are given; the label heuristic always runs.
    pub fn detect(
        &self,
        text: &str,
        keywords: Option<&[String]>,
        mode: MatchMode,
        fuzzy_threshold: u8,
        enabled_categories: Option<&[Category]>,
    ) -> Vec<Span> {
        let categories = enabled_categories.unwrap_or(&self.enabled_categories);
        let mut candidates = Vec::new();

        if !categories.is_empty() {
            candidates.extend(self.recognize(text, categories));
        }

        if let Some(keywords) = keywords.filter(|k| !k.is_empty()) {
            let found = self.keywords.find(text, keywords, mode, fuzzy_threshold);
            debug!(count = found.len(), ?mode, "keyword layer");
            candidates.extend(found);
        }

        let labelled = LabelHeuristicMatcher::new(&self.deny_list).find(text);
        debug!(count = labelled.len(), "label heuristic layer");
        candidates.extend(labelled);

        let total = candidates.len();
        let resolved = OverlapResolver::new().resolve(candidates);
        let accepted = DenyListFilter::new(&self.deny_list).filter(resolved);
        debug!(candidates = total, accepted = accepted.len(), "detection finished");

        accepted
    }

    fn recognize(&self, text: &str, categories: &[Category]) -> Vec<Span> {
        let mut requested = categories.to_vec();
        for extra in Category::LOCALE_EXTENSIONS {
            if !requested.contains(&extra) {
                requested.push(extra);
            }
        }

        match self
            .recognizer
            .analyze(text, &requested, self.min_confidence)
        {
            Ok(spans) => {
                let spans: Vec<Span> = spans
                    .into_iter()
                    .filter(|s| s.confidence >= self.min_confidence)
                    .collect();
                debug!(recognizer = self.recognizer.name(), count = spans.len(), "recognizer layer");
                spans
            }
            Err(e) => {
                warn!(recognizer = self.recognizer.name(), error = %e, "recognizer failed, continuing without its spans");
                Vec::new()
            }
        }
    }

    /// Distinct span texts in first-seen order.
    pub fn unique_terms(spans: &[Span]) -> Vec<String> {
        let mut seen = HashSet::new();
        spans
            .iter()
            .filter(|s| seen.insert(s.text.as_str()))
            .map(|s| s.text.clone())
            .collect()
    }
}

impl Default for HybridDetector {
    fn default() -> Self {
        Self::with_pattern_recognizer()
    }
}
