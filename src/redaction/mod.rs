//! Document redaction: position resolution, raster redaction, the two-pass
//! applier and the service tying detection to it.

pub mod applier;
pub mod document;
mod finalize;
mod glyphs;
pub mod position;
pub mod raster;
pub mod secure;
pub mod strategy;

pub use applier::RedactionApplier;
pub use document::{
    EmbeddedImage, ImageId, LayoutSpan, PageImages, RedactableDocument, Rect, SkippedImage, TextLayer,
    TextLine,
};
pub use position::{PageView, PositionResolver, SearchStrategy};
pub use raster::{OcrEngine, OcrWord, RasterRedactor, RedactedImage, TesseractOcr};
pub use secure::SecurePdfDocument;
pub use strategy::{
    CoverageGap, RedactionInstruction, RedactionMethod, RedactionResult, Region,
    DEFAULT_REPLACEMENT_TEXT,
};

use crate::config::PipelineConfig;
use crate::detection::HybridDetector;
use crate::domain::Span;
use crate::error::{RedactorError, RedactorResult};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Outcome of detecting and redacting one document.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    /// Accepted spans of the extracted text
    pub spans: Vec<Span>,
    /// Distinct span texts handed to the applier
    pub terms: Vec<String>,
    pub result: RedactionResult,
}

/// One input of a batch run.
#[derive(Debug)]
pub struct BatchEntry {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: RedactorResult<DocumentReport>,
}

/// Redaction service coordinating detection and application.
///
/// Holds no per-document state, so one service can process many
/// documents, including in parallel.
pub struct RedactionService {
    detector: HybridDetector,
    ocr: Box<dyn OcrEngine>,
    config: PipelineConfig,
}

impl RedactionService {
    pub fn new(detector: HybridDetector, ocr: Box<dyn OcrEngine>, config: PipelineConfig) -> Self {
        Self {
            detector,
            ocr,
            config,
        }
    }

    /// Service with the pattern recognizer and the tesseract engine named
    /// by `config`.
    pub fn from_config(config: PipelineConfig) -> Self {
        let mut detector = HybridDetector::with_pattern_recognizer().with_min_confidence(config.min_confidence);
        if let Some(categories) = &config.enabled_categories {
            detector = detector.with_categories(categories.clone());
        }
        let ocr = TesseractOcr::new().with_binary(config.tesseract_path.clone());
        Self::new(detector, Box::new(ocr), config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs detection over `text` with the configured keywords and mode.
    pub fn detect(&self, text: &str) -> Vec<Span> {
        let keywords = (!self.config.keywords.is_empty()).then_some(self.config.keywords.as_slice());
        self.detector.detect(
            text,
            keywords,
            self.config.match_mode,
            self.config.fuzzy_threshold,
            None,
        )
    }

    /// Extracts page text and image OCR text from a PDF.
    pub fn extract_text(&self, input: &Path) -> RedactorResult<String> {
        ensure_exists(input)?;
        let mut document = self.open(input)?;
        RedactionApplier::new(self.ocr.as_ref()).extract_text(&mut document)
    }

    /// Detects PII in `input` and writes the redacted PDF to `output`.
    pub fn redact_document(&self, input: &Path, output: &Path) -> RedactorResult<DocumentReport> {
        ensure_exists(input)?;
        info!(input = %input.display(), output = %output.display(), "redacting document");
        self.process(|| self.open(input), output)
    }

    /// Detection and redaction over any document backend. `open` is called
    /// twice: once for text extraction, once for redaction.
    pub fn process<D, F>(&self, mut open: F, output: &Path) -> RedactorResult<DocumentReport>
    where
        D: RedactableDocument,
        F: FnMut() -> RedactorResult<D>,
    {
        let applier = RedactionApplier::new(self.ocr.as_ref());

        let text = applier.extract_text(&mut open()?)?;
        let spans = self.detect(&text);
        let terms = HybridDetector::unique_terms(&spans);
        info!(spans = spans.len(), terms = terms.len(), "detection finished");

        let mut document = open()?;
        let result = applier.redact(
            &mut document,
            &terms,
            self.config.method,
            &self.config.replacement_text,
            self.config.pdf_fuzzy_threshold(),
            output,
        )?;

        Ok(DocumentReport {
            spans,
            terms,
            result,
        })
    }

    /// Redacts every input into `output_dir` as `<stem>_redacted.pdf`.
    ///
    /// Documents are processed in parallel; each entry carries its own
    /// outcome.
    pub fn redact_batch(&self, inputs: &[PathBuf], output_dir: &Path) -> RedactorResult<Vec<BatchEntry>> {
        std::fs::create_dir_all(output_dir).map_err(|e| RedactorError::Io {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

        let entries: Vec<BatchEntry> = inputs
            .par_iter()
            .map(|input| {
                let output = batch_output_path(input, output_dir);
                let outcome = self.redact_document(input, &output);
                if let Err(e) = &outcome {
                    error!(input = %input.display(), error = %e, "document failed");
                }
                BatchEntry {
                    input: input.clone(),
                    output,
                    outcome,
                }
            })
            .collect();
        Ok(entries)
    }

    fn open(&self, input: &Path) -> RedactorResult<SecurePdfDocument> {
        Ok(SecurePdfDocument::open(input)?.with_max_hits(self.config.max_search_hits))
    }
}

/// `<output_dir>/<stem>_redacted.pdf`
pub fn batch_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_dir.join(format!("{}_redacted.pdf", stem))
}

fn ensure_exists(input: &Path) -> RedactorResult<()> {
    if input.exists() {
        return Ok(());
    }
    Err(RedactorError::Io {
        path: input.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "Input file does not exist"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_output_path() {
        assert_eq!(
            batch_output_path(Path::new("/in/aadhaar card.pdf"), Path::new("/out")),
            PathBuf::from("/out/aadhaar card_redacted.pdf")
        );
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let service = RedactionService::from_config(PipelineConfig::default());
        let err = service
            .redact_document(Path::new("/nonexistent/in.pdf"), Path::new("/tmp/out.pdf"))
            .unwrap_err();
        assert!(matches!(err, RedactorError::Io { .. }));
    }
}
