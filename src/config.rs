//! Pipeline configuration, loadable from JSON.

use crate::detection::{DEFAULT_FUZZY_THRESHOLD, DEFAULT_MIN_CONFIDENCE};
use crate::domain::{Category, MatchMode};
use crate::error::{RedactorError, RedactorResult};
use crate::redaction::secure::DEFAULT_MAX_HITS;
use crate::redaction::strategy::{RedactionMethod, DEFAULT_REPLACEMENT_TEXT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options for one detection and redaction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub method: RedactionMethod,
    pub replacement_text: String,
    /// Keywords or, in regex mode, patterns supplied by the user
    pub keywords: Vec<String>,
    pub match_mode: MatchMode,
    /// Similarity threshold 0-100 for fuzzy matching
    pub fuzzy_threshold: u8,
    /// Recognizer categories; `None` uses the defaults, empty disables the
    /// recognizer
    pub enabled_categories: Option<Vec<Category>>,
    pub min_confidence: f64,
    pub tesseract_path: PathBuf,
    /// Native search hits per term and page
    pub max_search_hits: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            method: RedactionMethod::default(),
            replacement_text: DEFAULT_REPLACEMENT_TEXT.to_string(),
            keywords: Vec::new(),
            match_mode: MatchMode::default(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            enabled_categories: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            tesseract_path: PathBuf::from("tesseract"),
            max_search_hits: DEFAULT_MAX_HITS,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> RedactorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    pub fn from_json_file(path: &Path) -> RedactorResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| RedactorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_fuzzy_threshold(mut self, threshold: u32) -> Self {
        self.fuzzy_threshold = clamp_threshold(threshold);
        self
    }

    /// Threshold handed to position and raster resolution; only fuzzy mode
    /// uses one.
    pub fn pdf_fuzzy_threshold(&self) -> Option<u8> {
        (self.match_mode == MatchMode::Fuzzy).then_some(self.fuzzy_threshold)
    }

    fn normalized(mut self) -> Self {
        self.fuzzy_threshold = clamp_threshold(u32::from(self.fuzzy_threshold));
        self.min_confidence = self.min_confidence.clamp(0.0, 1.0);
        self.max_search_hits = self.max_search_hits.max(1);
        if self.replacement_text.is_empty() {
            self.replacement_text = DEFAULT_REPLACEMENT_TEXT.to_string();
        }
        self
    }
}

/// Clamps a user-supplied similarity threshold into `0..=100`.
pub fn clamp_threshold(threshold: u32) -> u8 {
    threshold.min(100) as u8
}
