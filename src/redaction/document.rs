//! Document access abstraction used by the resolvers and the applier.
//!
//! The rendering library is treated as a black box: the applier only needs
//! page enumeration, a text layer with layout boxes, native text search,
//! redaction drawing and committing, embedded image access, and saving.

use super::strategy::RedactionInstruction;
use crate::error::RedactorResult;
use std::path::Path;

/// Axis-aligned rectangle in page space (origin top-left, y grows down).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest rectangle enclosing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// A run of text laid out as one unit, with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSpan {
    pub text: String,
    pub bbox: Rect,
}

/// One line of the text layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLine {
    pub spans: Vec<LayoutSpan>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Structured text of one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLayer {
    pub lines: Vec<TextLine>,
}

impl TextLayer {
    /// Plain text, one line per [`TextLine`].
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text());
            out.push('\n');
        }
        out
    }
}

/// Opaque identifier of an embedded image, unique within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

/// Encoded bytes of an image embedded in a page.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub id: ImageId,
    pub bytes: Vec<u8>,
}

/// An image found on a page whose samples could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub id: ImageId,
    pub reason: String,
}

/// Images drawn on one page, directly or through form XObjects.
#[derive(Debug, Clone, Default)]
pub struct PageImages {
    pub images: Vec<EmbeddedImage>,
    pub skipped: Vec<SkippedImage>,
}

/// Document capabilities the redaction pipeline relies on.
///
/// Page indices are zero-based.
pub trait RedactableDocument {
    fn page_count(&self) -> RedactorResult<usize>;

    /// Lines and layout spans of a page's vector text.
    fn text_layer(&self, page: usize) -> RedactorResult<TextLayer>;

    /// Native search for a literal string; one rectangle per hit.
    fn search(&self, page: usize, needle: &str) -> RedactorResult<Vec<Rect>>;

    /// Marks a region for redaction; nothing changes until
    /// [`apply_redactions`](Self::apply_redactions).
    fn add_redaction(&mut self, page: usize, instruction: &RedactionInstruction)
        -> RedactorResult<()>;

    /// Commits every pending redaction of a page.
    fn apply_redactions(&mut self, page: usize) -> RedactorResult<()>;

    /// Images drawn on a page, with the ones that cannot be decoded listed
    /// apart. Must only be called once every page's text redactions have
    /// been applied.
    fn images(&mut self, page: usize) -> RedactorResult<PageImages>;

    fn replace_image(&mut self, id: ImageId, bytes: &[u8]) -> RedactorResult<()>;

    /// Removes document-level metadata.
    fn clear_metadata(&mut self) -> RedactorResult<()>;

    /// Writes the document, dropping unused objects.
    fn save(&mut self, output: &Path) -> RedactorResult<()>;
}
