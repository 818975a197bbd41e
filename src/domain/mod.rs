//! Domain models and detection logic.
//!
//! This module contains the span model shared by every detector and the
//! detectors themselves: keyword matching, the label-context heuristic, the
//! pattern-based entity recognizer, plus the overlap and deny-list passes
//! that turn raw candidates into an accepted term list.

pub mod deny;
pub mod keyword;
pub mod label;
pub mod overlap;
pub mod recognizer;
pub mod similarity;

pub use deny::{DenyList, DenyListFilter};
pub use keyword::KeywordMatcher;
pub use label::LabelHeuristicMatcher;
pub use overlap::OverlapResolver;
pub use recognizer::{EntityRecognizer, PatternRecognizer};

use crate::error::RedactorError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of sensitive information a span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Person,
    EmailAddress,
    PhoneNumber,
    CreditCard,
    UsSsn,
    UsPassport,
    Location,
    DateTime,
    IpAddress,
    IbanCode,
    Nrp,
    MedicalLicense,
    Url,
    AadhaarIn,
    PanIn,
    CustomKeyword,
    CustomPattern,
}

impl Category {
    /// Categories a recognizer may be asked for.
    pub const RECOGNIZER: [Category; 15] = [
        Category::Person,
        Category::EmailAddress,
        Category::PhoneNumber,
        Category::CreditCard,
        Category::UsSsn,
        Category::UsPassport,
        Category::Location,
        Category::DateTime,
        Category::IpAddress,
        Category::IbanCode,
        Category::Nrp,
        Category::MedicalLicense,
        Category::Url,
        Category::AadhaarIn,
        Category::PanIn,
    ];

    /// Locale-specific categories appended to every recognizer request.
    pub const LOCALE_EXTENSIONS: [Category; 2] = [Category::AadhaarIn, Category::PanIn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Person => "PERSON",
            Category::EmailAddress => "EMAIL_ADDRESS",
            Category::PhoneNumber => "PHONE_NUMBER",
            Category::CreditCard => "CREDIT_CARD",
            Category::UsSsn => "US_SSN",
            Category::UsPassport => "US_PASSPORT",
            Category::Location => "LOCATION",
            Category::DateTime => "DATE_TIME",
            Category::IpAddress => "IP_ADDRESS",
            Category::IbanCode => "IBAN_CODE",
            Category::Nrp => "NRP",
            Category::MedicalLicense => "MEDICAL_LICENSE",
            Category::Url => "URL",
            Category::AadhaarIn => "AADHAAR_IN",
            Category::PanIn => "PAN_IN",
            Category::CustomKeyword => "CUSTOM_KEYWORD",
            Category::CustomPattern => "CUSTOM_PATTERN",
        }
    }

    /// Human-readable label, `None` for the user-keyword categories.
    pub fn label(&self) -> Option<&'static str> {
        CATEGORY_LABELS.get(self).copied()
    }

    /// Categories enabled when the caller does not choose any.
    pub fn defaults() -> Vec<Category> {
        Self::RECOGNIZER
            .iter()
            .copied()
            .filter(|c| !Self::LOCALE_EXTENSIONS.contains(c))
            .collect()
    }
}

static CATEGORY_LABELS: Lazy<BTreeMap<Category, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (Category::Person, "Names"),
        (Category::EmailAddress, "Email Addresses"),
        (Category::PhoneNumber, "Phone Numbers"),
        (Category::CreditCard, "Credit Card Numbers"),
        (Category::UsSsn, "Social Security Numbers (US)"),
        (Category::UsPassport, "Passport Numbers (US)"),
        (Category::Location, "Locations/Addresses"),
        (Category::DateTime, "Dates & Times"),
        (Category::IpAddress, "IP Addresses"),
        (Category::IbanCode, "Bank Account Numbers (IBAN)"),
        (Category::Nrp, "National IDs"),
        (Category::MedicalLicense, "Medical License Numbers"),
        (Category::Url, "URLs/Web Addresses"),
        (Category::AadhaarIn, "Aadhaar Numbers (India)"),
        (Category::PanIn, "PAN Numbers (India)"),
    ])
});

/// Label table for every category that has a display label.
pub fn category_labels() -> &'static BTreeMap<Category, &'static str> {
    &CATEGORY_LABELS
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RedactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::RECOGNIZER
            .iter()
            .chain([Category::CustomKeyword, Category::CustomPattern].iter())
            .find(|c| c.as_str() == wanted)
            .copied()
            .ok_or_else(|| RedactorError::InvalidInput {
                parameter: "category".to_string(),
                reason: format!("unknown category '{}'", s),
            })
    }
}

/// Which detector produced a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Recognizer,
    Exact,
    Fuzzy,
    FuzzyPartial,
    Regex,
    LabelHeuristic,
}

/// How user-supplied keywords are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive literal match
    #[default]
    Exact,
    /// Similarity match tolerant of typos and OCR noise
    Fuzzy,
    /// Keywords are regular expressions
    Regex,
}

impl FromStr for MatchMode {
    type Err = RedactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "fuzzy" => Ok(MatchMode::Fuzzy),
            "regex" => Ok(MatchMode::Regex),
            other => Err(RedactorError::InvalidInput {
                parameter: "match_mode".to_string(),
                reason: format!("unknown match mode '{}'", other),
            }),
        }
    }
}

/// A detected candidate PII occurrence.
///
/// Offsets are byte offsets into the exact text the span was produced from,
/// always on char boundaries, so `&text[span.start..span.end] == span.text`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub text: String,
    pub category: Category,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    pub source: DetectionSource,
}

impl Span {
    /// Builds a span over `source_text[start..end]`.
    ///
    /// Returns `None` for empty ranges or ranges off char boundaries.
    pub fn from_range(
        source_text: &str,
        start: usize,
        end: usize,
        category: Category,
        confidence: f64,
        source: DetectionSource,
    ) -> Option<Self> {
        if start >= end {
            return None;
        }
        let text = source_text.get(start..end)?;
        Some(Self {
            text: text.to_string(),
            category,
            start,
            end,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        })
    }

    /// True when the two half-open ranges share at least one byte.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}
