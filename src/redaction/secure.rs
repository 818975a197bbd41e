//! PDF backend that physically removes redacted text with MuPDF.
//!
//! The text pass runs on a MuPDF document: matched text is removed with
//! `pdf_redact_page`, so it cannot be recovered from the output. The first
//! image, metadata or save call hands the document to the object-level
//! stage, which paints the visible boxes and handles embedded images.
//!
//! Every MuPDF call made here holds one process-wide lock, so documents
//! opened on different threads never run MuPDF concurrently. Pages and text
//! pages are dropped before the lock is released.

use super::document::{ImageId, LayoutSpan, PageImages, RedactableDocument, Rect, TextLayer, TextLine};
use super::finalize::ObjectStage;
use super::strategy::RedactionInstruction;
use crate::error::{RedactorError, RedactorResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use mupdf::pdf::{PdfAnnotationType, PdfDocument, PdfPage};
use mupdf::{Page, Quad, Rect as MuRect, TextPageOptions};

/// Default maximum search hits per term and page.
pub const DEFAULT_MAX_HITS: u32 = 100;

/// Serializes MuPDF work across the process.
static MUPDF_LOCK: Mutex<()> = Mutex::new(());

fn mupdf_lock() -> MutexGuard<'static, ()> {
    MUPDF_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

enum Stage {
    Text(PdfDocument),
    Objects(ObjectStage),
    Closed,
}

/// A PDF opened for secure redaction.
///
/// **Security**: text under a redaction is removed from the content
/// streams, not merely covered.
pub struct SecurePdfDocument {
    path: PathBuf,
    max_hits: u32,
    stage: Stage,
    /// Instructions waiting for `apply_redactions`, by page
    pending: BTreeMap<usize, Vec<RedactionInstruction>>,
    /// Applied instructions, painted when the object stage starts
    overlays: Vec<RedactionInstruction>,
}

impl SecurePdfDocument {
    /// Opens a PDF with MuPDF.
    pub fn open(path: &Path) -> RedactorResult<Self> {
        let path_str = utf8_path(path, "input")?;
        let _mupdf = mupdf_lock();
        let doc = PdfDocument::open(path_str).map_err(|e| RedactorError::PdfProcessing {
            message: format!("Failed to open '{}' with MuPDF", path.display()),
            page: None,
            source: Some(Box::new(e)),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            max_hits: DEFAULT_MAX_HITS,
            stage: Stage::Text(doc),
            pending: BTreeMap::new(),
            overlays: Vec::new(),
        })
    }

    /// Sets the maximum number of search hits per term and page.
    pub fn with_max_hits(mut self, max_hits: u32) -> Self {
        self.max_hits = max_hits.max(1);
        self
    }

    fn text_doc(&self) -> RedactorResult<&PdfDocument> {
        match &self.stage {
            Stage::Text(doc) => Ok(doc),
            Stage::Objects(_) | Stage::Closed => Err(RedactorError::BackendError {
                backend: "MuPDF".to_string(),
                message: "text layer is closed once image processing has started".to_string(),
                source: None,
            }),
        }
    }

    fn load_page(&self, page: usize) -> RedactorResult<Page> {
        self.text_doc()?
            .load_page(page as i32)
            .map_err(|e| RedactorError::PdfProcessing {
                message: format!("Failed to load page {}", page + 1),
                page: Some(page + 1),
                source: Some(Box::new(e)),
            })
    }

    /// Hands the text-redacted document over to the object stage through a
    /// scratch file.
    fn objects(&mut self) -> RedactorResult<&mut ObjectStage> {
        if let Stage::Text(doc) = &self.stage {
            let _mupdf = mupdf_lock();
            let scratch = tempfile::Builder::new()
                .prefix("piiredact-")
                .suffix(".pdf")
                .tempfile()?;
            let scratch_str = utf8_path(scratch.path(), "scratch file")?;
            doc.save(scratch_str)
                .map_err(|e| RedactorError::mupdf("Failed to save text-pass output", e))?;

            let mut stage = ObjectStage::load(scratch.path())?;
            stage.paint_overlays(&self.overlays)?;
            debug!(overlays = self.overlays.len(), "object stage started");
            self.stage = Stage::Objects(stage);
        }

        match &mut self.stage {
            Stage::Objects(stage) => Ok(stage),
            Stage::Text(_) | Stage::Closed => Err(RedactorError::BackendError {
                backend: "lopdf".to_string(),
                message: "object stage unavailable".to_string(),
                source: None,
            }),
        }
    }
}

impl RedactableDocument for SecurePdfDocument {
    fn page_count(&self) -> RedactorResult<usize> {
        match &self.stage {
            Stage::Text(doc) => {
                let _mupdf = mupdf_lock();
                doc.page_count()
                    .map(|n| n.max(0) as usize)
                    .map_err(|e| RedactorError::mupdf("Failed to get page count", e))
            }
            Stage::Objects(stage) => Ok(stage.page_count()),
            Stage::Closed => Ok(0),
        }
    }

    fn text_layer(&self, page: usize) -> RedactorResult<TextLayer> {
        let _mupdf = mupdf_lock();
        let text_page = self
            .load_page(page)
            .and_then(|p| {
                p.to_text_page(TextPageOptions::empty())
                    .map_err(|e| RedactorError::mupdf("Failed to build text page", e))
            })
            .map_err(|e| RedactorError::TextExtraction {
                path: self.path.clone(),
                reason: format!("page {}: {}", page + 1, e),
            })?;

        let mut lines = Vec::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let mut builder = SpanBuilder::default();
                for ch in line.chars() {
                    if let Some(c) = ch.char() {
                        builder.push(c, quad_rect(&ch.quad()), ch.size());
                    }
                }
                let spans = builder.finish();
                if !spans.is_empty() {
                    lines.push(TextLine { spans });
                }
            }
        }
        Ok(TextLayer { lines })
    }

    fn search(&self, page: usize, needle: &str) -> RedactorResult<Vec<Rect>> {
        let _mupdf = mupdf_lock();
        let hits = self
            .load_page(page)?
            .search(needle, self.max_hits)
            .map_err(|e| RedactorError::mupdf(format!("Search failed for '{}'", needle), e))?;

        let mut rects = Vec::new();
        for quad in hits.iter() {
            rects.push(quad_rect(quad));
        }
        Ok(rects)
    }

    fn add_redaction(&mut self, page: usize, instruction: &RedactionInstruction) -> RedactorResult<()> {
        self.text_doc()?;
        self.pending.entry(page).or_default().push(instruction.clone());
        Ok(())
    }

    fn apply_redactions(&mut self, page: usize) -> RedactorResult<()> {
        let Some(instructions) = self.pending.remove(&page) else {
            return Ok(());
        };
        let _mupdf = mupdf_lock();

        let mut pdf_page = match PdfPage::try_from(self.load_page(page)?) {
            Ok(p) => p,
            Err(_) => {
                return Err(RedactorError::PdfProcessing {
                    message: "Page is not a PDF page".to_string(),
                    page: Some(page + 1),
                    source: None,
                })
            }
        };

        for instruction in &instructions {
            let annot = pdf_page
                .create_annotation(PdfAnnotationType::Redact)
                .map_err(|e| RedactorError::PdfProcessing {
                    message: "Failed to create redaction annotation".to_string(),
                    page: Some(page + 1),
                    source: Some(Box::new(e)),
                })?;

            let rect = instruction.region.rect;
            unsafe {
                ffi::set_annotation_rect(
                    &annot,
                    MuRect {
                        x0: rect.x0,
                        y0: rect.y0,
                        x1: rect.x1,
                        y1: rect.y1,
                    },
                );
            }
        }

        pdf_page.redact().map_err(|e| RedactorError::PdfProcessing {
            message: format!("Failed to apply redactions on page {}", page + 1),
            page: Some(page + 1),
            source: Some(Box::new(e)),
        })?;

        debug!(page = page + 1, count = instructions.len(), "text redactions applied");
        self.overlays.extend(instructions);
        Ok(())
    }

    fn images(&mut self, page: usize) -> RedactorResult<PageImages> {
        self.objects()?.images(page)
    }

    fn replace_image(&mut self, id: ImageId, bytes: &[u8]) -> RedactorResult<()> {
        self.objects()?.replace_image(id, bytes)
    }

    fn clear_metadata(&mut self) -> RedactorResult<()> {
        self.objects()?.clear_metadata()
    }

    fn save(&mut self, output: &Path) -> RedactorResult<()> {
        self.objects()?.save(output)
    }
}

impl Drop for SecurePdfDocument {
    fn drop(&mut self) {
        if matches!(self.stage, Stage::Text(_)) {
            let _mupdf = mupdf_lock();
            self.stage = Stage::Closed;
        }
    }
}

fn utf8_path<'p>(path: &'p Path, parameter: &str) -> RedactorResult<&'p str> {
    path.to_str().ok_or_else(|| RedactorError::InvalidInput {
        parameter: parameter.to_string(),
        reason: "Path contains invalid UTF-8".to_string(),
    })
}

fn quad_rect(quad: &Quad) -> Rect {
    Rect::new(
        quad.ul.x.min(quad.ll.x).min(quad.ur.x).min(quad.lr.x),
        quad.ul.y.min(quad.ll.y).min(quad.ur.y).min(quad.lr.y),
        quad.ul.x.max(quad.ll.x).max(quad.ur.x).max(quad.lr.x),
        quad.ul.y.max(quad.ll.y).max(quad.ur.y).max(quad.lr.y),
    )
}

/// Groups the characters of a line into layout spans: runs of one font
/// size, with every whitespace character a span of its own.
#[derive(Default)]
struct SpanBuilder {
    spans: Vec<LayoutSpan>,
    current: Option<(LayoutSpan, f32)>,
}

impl SpanBuilder {
    fn push(&mut self, c: char, bbox: Rect, size: f32) {
        if c.is_whitespace() {
            self.flush();
            self.spans.push(LayoutSpan {
                text: c.to_string(),
                bbox,
            });
            return;
        }

        match &mut self.current {
            Some((span, current_size)) if (*current_size - size).abs() < 0.01 => {
                span.text.push(c);
                span.bbox = span.bbox.union(&bbox);
            }
            _ => {
                self.flush();
                self.current = Some((
                    LayoutSpan {
                        text: c.to_string(),
                        bbox,
                    },
                    size,
                ));
            }
        }
    }

    fn flush(&mut self) {
        if let Some((span, _)) = self.current.take() {
            self.spans.push(span);
        }
    }

    fn finish(mut self) -> Vec<LayoutSpan> {
        self.flush();
        self.spans
    }
}

/// FFI helpers for MuPDF annotation operations.
mod ffi {
    use mupdf::pdf::PdfAnnotation;
    use mupdf::{Context, Rect};

    /// Sets the rectangle of a redaction annotation via FFI, using the
    /// calling thread's MuPDF context.
    ///
    /// # Safety
    /// Uses MuPDF's C API directly. The annotation must be valid, belong to
    /// a live page, and have been created on the calling thread.
    pub unsafe fn set_annotation_rect(annot: &PdfAnnotation, rect: Rect) {
        #[repr(C)]
        struct PdfAnnotRaw {
            inner: *mut mupdf_sys::pdf_annot,
        }

        #[repr(C)]
        struct ContextRaw {
            inner: *mut mupdf_sys::fz_context,
        }

        let annot_raw = std::mem::transmute::<&PdfAnnotation, &PdfAnnotRaw>(annot);
        let context = Context::get();
        let ctx = std::mem::transmute::<&Context, &ContextRaw>(&context).inner;
        if ctx.is_null() || annot_raw.inner.is_null() {
            return;
        }

        let fz_rect = mupdf_sys::fz_rect {
            x0: rect.x0,
            y0: rect.y0,
            x1: rect.x1,
            y1: rect.y1,
        };
        mupdf_sys::pdf_set_annot_rect(ctx, annot_raw.inner, fz_rect);
    }
}
