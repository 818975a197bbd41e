//! Error types for the detection and redaction pipeline.
//!
//! Errors are categorized by their source. Detector-layer failures are
//! normally logged and degraded to "fewer spans found" by the callers; only
//! structural failures (opening or saving a document) surface to the user.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type RedactorResult<T> = Result<T, RedactorError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error type for all detection and redaction operations.
#[derive(Debug, Error)]
pub enum RedactorError {
    /// Error occurred while reading or writing files
    #[error("IO error for path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error occurred during PDF processing
    #[error("PDF processing error{}: {message}", page.map(|p| format!(" on page {}", p)).unwrap_or_default())]
    PdfProcessing {
        message: String,
        page: Option<usize>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Pattern matching or regex compilation error
    #[error("Pattern error for '{pattern}': {reason}")]
    PatternError { pattern: String, reason: String },

    /// Text extraction failed
    #[error("Text extraction failed for '{}': {reason}", path.display())]
    TextExtraction { path: PathBuf, reason: String },

    /// Invalid configuration or parameters
    #[error("Invalid input for '{parameter}': {reason}")]
    InvalidInput { parameter: String, reason: String },

    /// The entity recognizer could not analyze a text unit
    #[error("Recognizer '{recognizer}' failed: {reason}")]
    Recognizer { recognizer: String, reason: String },

    /// The OCR engine could not process an image
    #[error("OCR engine '{engine}' failed: {reason}")]
    Ocr { engine: String, reason: String },

    /// An image could not be decoded or re-encoded
    #[error("Image error: {message}")]
    Image {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Backend-specific error (MuPDF, lopdf, etc.)
    #[error("{backend} backend error: {message}")]
    BackendError {
        backend: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl RedactorError {
    /// Shorthand for a MuPDF backend failure.
    pub(crate) fn mupdf(message: impl Into<String>, source: mupdf::Error) -> Self {
        Self::BackendError {
            backend: "MuPDF".to_string(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<io::Error> for RedactorError {
    fn from(err: io::Error) -> Self {
        Self::BackendError {
            backend: "std::io".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<regex::Error> for RedactorError {
    fn from(err: regex::Error) -> Self {
        Self::PatternError {
            pattern: "<unknown>".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<lopdf::Error> for RedactorError {
    fn from(err: lopdf::Error) -> Self {
        Self::BackendError {
            backend: "lopdf".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<image::ImageError> for RedactorError {
    fn from(err: image::ImageError) -> Self {
        Self::Image {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for RedactorError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput {
            parameter: "config".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for RedactorError {
    fn from(err: anyhow::Error) -> Self {
        Self::BackendError {
            backend: "anyhow".to_string(),
            message: err.to_string(),
            source: None,
        }
    }
}
