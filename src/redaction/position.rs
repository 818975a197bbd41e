//! Maps accepted terms back to regions on a page's vector text layer.
//!
//! Resolution is a short-circuiting cascade: each strategy is tried in
//! order and the first one producing any rectangle wins.

use super::document::{RedactableDocument, Rect, TextLayer, TextLine};
use super::strategy::Region;
use crate::domain::similarity::ratio;
use crate::error::RedactorResult;
use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

/// Position search strategies, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Backend search for the term as given
    Native,
    /// Backend search for the lowercased, then uppercased term
    CaseVariants,
    /// Search over lines rebuilt from their layout spans
    CharacterLevel,
    /// Word similarity against the layout spans (needs a threshold)
    Fuzzy,
}

const CASCADE: [SearchStrategy; 4] = [
    SearchStrategy::Native,
    SearchStrategy::CaseVariants,
    SearchStrategy::CharacterLevel,
    SearchStrategy::Fuzzy,
];

/// One page seen by the resolver, with its text layer fetched lazily and
/// at most once.
pub struct PageView<'d, D: RedactableDocument + ?Sized> {
    document: &'d D,
    page: usize,
    layer: OnceCell<Option<TextLayer>>,
}

impl<'d, D: RedactableDocument + ?Sized> PageView<'d, D> {
    pub fn new(document: &'d D, page: usize) -> Self {
        Self {
            document,
            page,
            layer: OnceCell::new(),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    fn text_layer(&self) -> Option<&TextLayer> {
        self.layer
            .get_or_init(|| match self.document.text_layer(self.page) {
                Ok(layer) => Some(layer),
                Err(e) => {
                    warn!(page = self.page + 1, error = %e, "text layer unavailable");
                    None
                }
            })
            .as_ref()
    }

    fn search(&self, needle: &str) -> RedactorResult<Vec<Rect>> {
        self.document.search(self.page, needle)
    }
}

/// Resolves terms to page regions through the strategy cascade.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionResolver;

impl PositionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Regions for `term` on the viewed page; empty means unresolved.
    pub fn locate<D: RedactableDocument + ?Sized>(
        &self,
        view: &PageView<'_, D>,
        term: &str,
        fuzzy_threshold: Option<u8>,
    ) -> Vec<Region> {
        match self.locate_with_strategy(view, term, fuzzy_threshold) {
            Some((strategy, rects)) => {
                debug!(page = view.page + 1, term, ?strategy, hits = rects.len(), "term resolved");
                rects
                    .into_iter()
                    .map(|rect| Region {
                        page: view.page,
                        rect,
                        term: term.to_string(),
                    })
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Like [`locate`](Self::locate), also reporting the winning strategy.
    pub fn locate_with_strategy<D: RedactableDocument + ?Sized>(
        &self,
        view: &PageView<'_, D>,
        term: &str,
        fuzzy_threshold: Option<u8>,
    ) -> Option<(SearchStrategy, Vec<Rect>)> {
        if term.trim().is_empty() {
            return None;
        }

        CASCADE.iter().find_map(|&strategy| {
            let rects = match strategy {
                SearchStrategy::Native => Self::native(view, term),
                SearchStrategy::CaseVariants => Self::case_variants(view, term),
                SearchStrategy::CharacterLevel => view
                    .text_layer()
                    .map(|layer| character_level_search(layer, term))
                    .unwrap_or_default(),
                SearchStrategy::Fuzzy => match (fuzzy_threshold, view.text_layer()) {
                    (Some(threshold), Some(layer)) => fuzzy_search(layer, term, threshold),
                    _ => Vec::new(),
                },
            };
            (!rects.is_empty()).then_some((strategy, rects))
        })
    }

    fn native<D: RedactableDocument + ?Sized>(view: &PageView<'_, D>, term: &str) -> Vec<Rect> {
        view.search(term).unwrap_or_else(|e| {
            warn!(page = view.page + 1, term, error = %e, "native search failed");
            Vec::new()
        })
    }

    fn case_variants<D: RedactableDocument + ?Sized>(
        view: &PageView<'_, D>,
        term: &str,
    ) -> Vec<Rect> {
        for variant in [term.to_lowercase(), term.to_uppercase()] {
            if variant == term {
                continue;
            }
            let rects = Self::native(view, &variant);
            if !rects.is_empty() {
                return rects;
            }
        }
        Vec::new()
    }
}

/// One-to-one lowercase mapping so char offsets stay aligned.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Rebuilds each line from its spans and searches it case-insensitively.
/// A hit covering several spans yields the union of their boxes.
pub(crate) fn character_level_search(layer: &TextLayer, term: &str) -> Vec<Rect> {
    let needle: Vec<char> = term.chars().map(fold).collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut rects = Vec::new();
    for line in &layer.lines {
        rects.extend(search_line(line, &needle));
    }
    rects
}

fn search_line(line: &TextLine, needle: &[char]) -> Vec<Rect> {
    let mut text: Vec<char> = Vec::new();
    let mut ranges = Vec::with_capacity(line.spans.len());
    for span in &line.spans {
        let start = text.len();
        text.extend(span.text.chars().map(fold));
        ranges.push((start, text.len(), span.bbox));
    }

    if text.len() < needle.len() {
        return Vec::new();
    }

    (0..=text.len() - needle.len())
        .filter(|&at| text[at..at + needle.len()] == *needle)
        .filter_map(|at| union_for_range(&ranges, at, at + needle.len()))
        .collect()
}

fn union_for_range(ranges: &[(usize, usize, Rect)], start: usize, end: usize) -> Option<Rect> {
    ranges
        .iter()
        .filter(|(span_start, span_end, _)| *span_end > start && *span_start < end)
        .map(|(_, _, bbox)| *bbox)
        .reduce(|acc, bbox| acc.union(&bbox))
}

/// Whole-span boxes of spans holding a word similar to `term`.
pub(crate) fn fuzzy_search(layer: &TextLayer, term: &str, threshold: u8) -> Vec<Rect> {
    let threshold = f64::from(threshold.min(100));
    layer
        .lines
        .iter()
        .flat_map(|line| line.spans.iter())
        .filter(|span| {
            span.text
                .split_whitespace()
                .any(|word| ratio(word, term) >= threshold)
        })
        .map(|span| span.bbox)
        .collect()
}
