//! PII detection and secure PDF redaction.
//!
//! Finds personally identifiable information in document text with three
//! layers (a pattern-based entity recognizer, user keywords, and a
//! label-context heuristic for names on identity documents), then removes
//! every accepted term from both the vector text layer and the text baked
//! into embedded images.
//!
//! # Features
//!
//! - **Secure Redaction**: Text is physically removed with MuPDF, not just covered
//! - **Hybrid Detection**: Recognizer, exact/fuzzy/regex keywords and label heuristics
//! - **Position Cascade**: Native, case-variant, character-level and fuzzy search
//! - **Image Redaction**: OCR word boxes are erased, masked or replaced
//! - **Metadata Scrubbing**: Info dictionary and XMP stream are dropped
//!
//! # Architecture
//!
//! - [`domain`]: Span model and the individual detectors
//! - [`detection`]: The hybrid detector merging every layer
//! - [`redaction`]: Position resolution, raster redaction and the applier
//! - [`config`]: JSON-loadable pipeline options
//! - [`error`]: Error handling
//!
//! # Quick Start
//!
//! ```no_run
//! use piiredact::{PipelineConfig, RedactionService};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = RedactionService::from_config(PipelineConfig::default());
//!
//! let report = service.redact_document(
//!     Path::new("aadhaar.pdf"),
//!     Path::new("aadhaar_redacted.pdf"),
//! )?;
//! println!("{} regions redacted", report.result.instances_redacted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Detection only
//!
//! ```
//! use piiredact::{Category, HybridDetector, MatchMode};
//!
//! let detector = HybridDetector::with_pattern_recognizer();
//! let spans = detector.detect(
//!     "PAN: ABCDE1234F",
//!     None,
//!     MatchMode::Exact,
//!     85,
//!     Some(&[Category::EmailAddress]),
//! );
//! assert_eq!(spans[0].category, Category::PanIn);
//! ```

pub mod config;
pub mod detection;
pub mod domain;
pub mod error;
pub mod logging;
pub mod redaction;

pub use config::PipelineConfig;
pub use detection::HybridDetector;
pub use domain::{Category, DetectionSource, MatchMode, Span};
pub use error::{RedactorError, RedactorResult};
pub use redaction::{
    BatchEntry, DocumentReport, RedactableDocument, RedactionApplier, RedactionMethod,
    RedactionResult, RedactionService, SecurePdfDocument,
};
