//! Merges candidates from every detector into an overlap-free list.

use super::Span;
use std::cmp::Ordering;

/// Greedy left-to-right interval selection.
///
/// Candidates are ordered by start offset, then by descending confidence;
/// a candidate is kept when it starts at or after the end of the last kept
/// span. This is not a globally optimal cover: a long early span can shadow
/// several later higher-confidence ones, which is accepted behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapResolver;

impl OverlapResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, mut spans: Vec<Span>) -> Vec<Span> {
        // Vec::sort_by is stable: equal keys keep detector order.
        spans.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        });

        let mut accepted: Vec<Span> = Vec::with_capacity(spans.len());
        let mut last_end = 0;

        for span in spans {
            if span.start >= last_end {
                last_end = span.end;
                accepted.push(span);
            }
        }

        accepted
    }
}
