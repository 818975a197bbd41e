//! Redaction methods, instructions and result statistics.

use super::document::Rect;
use crate::error::RedactorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default text drawn by [`RedactionMethod::Replace`].
pub const DEFAULT_REPLACEMENT_TEXT: &str = "[REDACTED]";

/// How a resolved region is redacted. Semantics are identical for the text
/// layer and the raster layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMethod {
    /// Remove the content and leave a plain white area
    #[default]
    #[serde(alias = "full_redact")]
    Erase,
    /// Opaque black box, no text
    #[serde(alias = "obfuscate")]
    Mask,
    /// White box containing the replacement text
    Replace,
}

impl RedactionMethod {
    /// Fill colour as RGB components in `0.0..=1.0`.
    pub fn fill_rgb(&self) -> [f32; 3] {
        match self {
            RedactionMethod::Mask => [0.0, 0.0, 0.0],
            RedactionMethod::Erase | RedactionMethod::Replace => [1.0, 1.0, 1.0],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionMethod::Erase => "erase",
            RedactionMethod::Mask => "mask",
            RedactionMethod::Replace => "replace",
        }
    }
}

impl fmt::Display for RedactionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedactionMethod {
    type Err = RedactorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "erase" | "full_redact" => Ok(RedactionMethod::Erase),
            "mask" | "obfuscate" => Ok(RedactionMethod::Mask),
            "replace" => Ok(RedactionMethod::Replace),
            other => Err(RedactorError::InvalidInput {
                parameter: "method".to_string(),
                reason: format!("unknown redaction method '{}'", other),
            }),
        }
    }
}

/// A resolved area of one page belonging to one accepted term.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub page: usize,
    pub rect: Rect,
    pub term: String,
}

/// A single redaction to draw; applying it mutates the page exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct RedactionInstruction {
    pub region: Region,
    pub method: RedactionMethod,
    pub replacement_text: Option<String>,
}

impl RedactionInstruction {
    pub fn new(region: Region, method: RedactionMethod, replacement_text: &str) -> Self {
        let replacement_text = match method {
            RedactionMethod::Replace => Some(replacement_text.to_string()),
            RedactionMethod::Erase | RedactionMethod::Mask => None,
        };
        Self {
            region,
            method,
            replacement_text,
        }
    }
}

/// A term that no strategy could place on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageGap {
    pub page: usize,
    pub term: String,
}

/// Statistics about a redaction run over one document.
#[derive(Debug, Clone, Default)]
pub struct RedactionResult {
    /// Number of text-layer regions redacted
    pub instances_redacted: usize,

    /// Pages processed
    pub pages_processed: usize,

    /// Pages with text-layer redactions
    pub pages_modified: usize,

    /// Distinct embedded images inspected
    pub images_processed: usize,

    /// Images replaced with a redacted copy
    pub images_modified: usize,

    /// Terms left unresolved on a page's text layer
    pub unresolved: Vec<CoverageGap>,

    /// Images skipped because OCR, decoding or replacement failed
    pub image_failures: Vec<String>,
}

impl RedactionResult {
    /// Creates a result indicating no redactions were needed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if anything was redacted on either layer.
    pub fn has_redactions(&self) -> bool {
        self.instances_redacted > 0 || self.images_modified > 0
    }
}
