//! Deterministic stand-ins for the recognizer, OCR engine and document
//! backend.

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use piiredact::domain::EntityRecognizer;
use piiredact::redaction::{
    EmbeddedImage, ImageId, LayoutSpan, OcrEngine, OcrWord, PageImages, RedactableDocument,
    RedactionInstruction, Rect, SkippedImage, TextLayer, TextLine,
};
use piiredact::{Category, DetectionSource, RedactorError, RedactorResult, Span};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Recognizer reporting configured substrings as entities.
#[derive(Default)]
pub struct FakeRecognizer {
    entities: Vec<(String, Category, f64)>,
    failing: bool,
}

impl FakeRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every occurrence of `text` is reported as `category`.
    pub fn with_entity(mut self, text: &str, category: Category, confidence: f64) -> Self {
        self.entities.push((text.to_string(), category, confidence));
        self
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self {
            entities: Vec::new(),
            failing: true,
        }
    }
}

impl EntityRecognizer for FakeRecognizer {
    fn analyze(&self, text: &str, categories: &[Category], _min_confidence: f64) -> RedactorResult<Vec<Span>> {
        if self.failing {
            return Err(RedactorError::Recognizer {
                recognizer: "fake".to_string(),
                reason: "model unavailable".to_string(),
            });
        }

        let mut spans = Vec::new();
        for (needle, category, confidence) in &self.entities {
            if !categories.contains(category) {
                continue;
            }
            for (start, _) in text.match_indices(needle.as_str()) {
                spans.extend(Span::from_range(
                    text,
                    start,
                    start + needle.len(),
                    *category,
                    *confidence,
                    DetectionSource::Recognizer,
                ));
            }
        }
        Ok(spans)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// OCR engine returning configured words, keyed by image width.
#[derive(Default)]
pub struct FakeOcr {
    words: HashMap<u32, Vec<OcrWord>>,
    failing_widths: HashSet<u32>,
    calls: AtomicUsize,
}

impl FakeOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_words(mut self, width: u32, words: Vec<OcrWord>) -> Self {
        self.words.insert(width, words);
        self
    }

    /// Recognition fails for images of this width.
    pub fn failing_for(mut self, width: u32) -> Self {
        self.failing_widths.insert(width);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, image: &DynamicImage) -> RedactorResult<Vec<OcrWord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_widths.contains(&image.width()) {
            return Err(RedactorError::Ocr {
                engine: "fake".to_string(),
                reason: "engine crashed".to_string(),
            });
        }
        Ok(self.words.get(&image.width()).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn ocr_word(text: &str, x: u32, y: u32, w: u32, h: u32) -> OcrWord {
    OcrWord {
        text: text.to_string(),
        confidence: 90.0,
        x,
        y,
        w,
        h,
        line: 0,
    }
}

/// PNG bytes of a solid image.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("PNG encoding of a solid image");
    out.into_inner()
}

/// Builds one text line from `(text, x0, x1)` spans at a fixed height.
pub fn line(spans: &[(&str, f32, f32)], y: f32) -> TextLine {
    TextLine {
        spans: spans
            .iter()
            .map(|(text, x0, x1)| LayoutSpan {
                text: text.to_string(),
                bbox: Rect::new(*x0, y, *x1, y + 10.0),
            })
            .collect(),
    }
}

/// Document calls, in the order they were made.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    TextLayer(usize),
    Search(usize, String),
    AddRedaction(usize, String),
    ApplyRedactions(usize),
    Images(usize),
    ReplaceImage(ImageId),
    ClearMetadata,
    Save(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub layer: TextLayer,
    pub images: PageImages,
}

impl FakePage {
    pub fn with_lines(lines: Vec<TextLine>) -> Self {
        Self {
            layer: TextLayer { lines },
            images: PageImages::default(),
        }
    }

    pub fn with_image(mut self, id: u64, bytes: Vec<u8>) -> Self {
        self.images.images.push(EmbeddedImage { id: ImageId(id), bytes });
        self
    }

    /// An image the backend found but could not decode.
    pub fn with_skipped_image(mut self, id: u64, reason: &str) -> Self {
        self.images.skipped.push(SkippedImage {
            id: ImageId(id),
            reason: reason.to_string(),
        });
        self
    }
}

/// In-memory document. Native search is case-sensitive and only finds
/// needles lying inside a single layout span.
#[derive(Debug, Default)]
pub struct FakeDocument {
    pub pages: Vec<FakePage>,
    pub calls: RefCell<Vec<Call>>,
    pub applied: Vec<RedactionInstruction>,
    pub replaced: HashMap<ImageId, Vec<u8>>,
    pending: Vec<RedactionInstruction>,
    pub reject_replacements: bool,
}

impl FakeDocument {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn page(&self, page: usize) -> RedactorResult<&FakePage> {
        self.pages.get(page).ok_or_else(|| RedactorError::PdfProcessing {
            message: "no such page".to_string(),
            page: Some(page + 1),
            source: None,
        })
    }
}

impl RedactableDocument for FakeDocument {
    fn page_count(&self) -> RedactorResult<usize> {
        Ok(self.pages.len())
    }

    fn text_layer(&self, page: usize) -> RedactorResult<TextLayer> {
        self.record(Call::TextLayer(page));
        Ok(self.page(page)?.layer.clone())
    }

    fn search(&self, page: usize, needle: &str) -> RedactorResult<Vec<Rect>> {
        self.record(Call::Search(page, needle.to_string()));
        Ok(self
            .page(page)?
            .layer
            .lines
            .iter()
            .flat_map(|l| l.spans.iter())
            .filter(|s| s.text.contains(needle))
            .map(|s| s.bbox)
            .collect())
    }

    fn add_redaction(&mut self, page: usize, instruction: &RedactionInstruction) -> RedactorResult<()> {
        self.record(Call::AddRedaction(page, instruction.region.term.clone()));
        self.pending.push(instruction.clone());
        Ok(())
    }

    fn apply_redactions(&mut self, page: usize) -> RedactorResult<()> {
        self.record(Call::ApplyRedactions(page));
        self.applied.append(&mut self.pending);
        Ok(())
    }

    fn images(&mut self, page: usize) -> RedactorResult<PageImages> {
        self.record(Call::Images(page));
        Ok(self.page(page)?.images.clone())
    }

    fn replace_image(&mut self, id: ImageId, bytes: &[u8]) -> RedactorResult<()> {
        self.record(Call::ReplaceImage(id));
        if self.reject_replacements {
            return Err(RedactorError::BackendError {
                backend: "fake".to_string(),
                message: "read-only image".to_string(),
                source: None,
            });
        }
        self.replaced.insert(id, bytes.to_vec());
        Ok(())
    }

    fn clear_metadata(&mut self) -> RedactorResult<()> {
        self.record(Call::ClearMetadata);
        Ok(())
    }

    fn save(&mut self, output: &Path) -> RedactorResult<()> {
        self.record(Call::Save(output.to_path_buf()));
        Ok(())
    }
}
