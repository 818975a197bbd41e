//! Deny list of structural tokens (table headers, field labels).

use super::Span;
use once_cell::sync::Lazy;
use std::collections::HashSet;

const STANDARD_ENTRIES: &[&str] = &[
    "name",
    "student",
    "father",
    "mother",
    "guardian",
    "aadhaar",
    "caste",
    "category",
    "income",
    "board",
    "university",
    "college",
    "course",
    "seat",
    "type",
    "quota",
    "number",
    "id",
    "date",
    "year",
    "branch",
    "discipline",
    "attestation",
    "submitted",
    "considered",
    "eligible",
    "details",
    "status",
    "bank",
    "district",
];

/// Fixed set of lowercase tokens that are layout noise rather than PII.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyList {
    entries: HashSet<String>,
}

impl DenyList {
    /// Builds a deny list from arbitrary entries, normalized to lowercase.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// The process-wide standard list.
    pub fn standard() -> &'static DenyList {
        static STANDARD: Lazy<DenyList> = Lazy::new(|| DenyList::new(STANDARD_ENTRIES));
        &STANDARD
    }

    /// `token` must already be lowercased and trimmed.
    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Final pass dropping spans that are header noise.
#[derive(Debug, Clone, Copy)]
pub struct DenyListFilter<'a> {
    deny_list: &'a DenyList,
}

impl<'a> DenyListFilter<'a> {
    pub fn new(deny_list: &'a DenyList) -> Self {
        Self { deny_list }
    }

    /// True if the span should be dropped.
    pub fn is_noise(&self, span: &Span) -> bool {
        let lower = span.text.trim().to_lowercase();
        if self.deny_list.contains(&lower) {
            return true;
        }
        // "Father Name" and similar headers leaking through a detector.
        lower.contains("name") && lower.split_whitespace().count() <= 2
    }

    pub fn filter(&self, spans: Vec<Span>) -> Vec<Span> {
        spans.into_iter().filter(|s| !self.is_noise(s)).collect()
    }
}
