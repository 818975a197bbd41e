//! Two-pass application of accepted terms to a document.
//!
//! Pass 1 resolves and removes terms on the text layer of every page. Pass 2
//! starts only after that, and OCR-redacts each embedded image once.

use super::document::RedactableDocument;
use super::position::{PageView, PositionResolver};
use super::raster::{OcrEngine, RasterRedactor};
use super::strategy::{CoverageGap, RedactionInstruction, RedactionMethod, RedactionResult};
use crate::error::RedactorResult;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Applies redactions to both layers of a document.
pub struct RedactionApplier<'a> {
    resolver: PositionResolver,
    raster: RasterRedactor<'a>,
}

impl<'a> RedactionApplier<'a> {
    pub fn new(ocr: &'a dyn OcrEngine) -> Self {
        Self {
            resolver: PositionResolver::new(),
            raster: RasterRedactor::new(ocr),
        }
    }

    /// Redacts `terms` throughout `document`, clears its metadata and saves
    /// it to `output`.
    pub fn redact<D: RedactableDocument>(
        &self,
        document: &mut D,
        terms: &[String],
        method: RedactionMethod,
        replacement_text: &str,
        fuzzy_threshold: Option<u8>,
        output: &Path,
    ) -> RedactorResult<RedactionResult> {
        let terms: Vec<String> = terms.iter().filter(|t| !t.trim().is_empty()).cloned().collect();
        let mut result = RedactionResult::none();

        self.text_pass(document, &terms, method, replacement_text, fuzzy_threshold, &mut result)?;
        self.image_pass(document, &terms, method, replacement_text, fuzzy_threshold, &mut result)?;

        document.clear_metadata()?;
        document.save(output)?;

        info!(
            pages = result.pages_processed,
            text_redactions = result.instances_redacted,
            images_modified = result.images_modified,
            unresolved = result.unresolved.len(),
            "document redacted"
        );
        Ok(result)
    }

    fn text_pass<D: RedactableDocument>(
        &self,
        document: &mut D,
        terms: &[String],
        method: RedactionMethod,
        replacement_text: &str,
        fuzzy_threshold: Option<u8>,
        result: &mut RedactionResult,
    ) -> RedactorResult<()> {
        let page_count = document.page_count()?;
        result.pages_processed = page_count;

        for page in 0..page_count {
            let mut regions = Vec::new();
            {
                let view = PageView::new(&*document, page);
                for term in terms {
                    let found = self.resolver.locate(&view, term, fuzzy_threshold);
                    if found.is_empty() {
                        debug!(page = page + 1, term = %term, "term not found on text layer");
                        result.unresolved.push(CoverageGap {
                            page,
                            term: term.clone(),
                        });
                    }
                    regions.extend(found);
                }
            }

            if regions.is_empty() {
                continue;
            }

            for region in regions {
                let instruction = RedactionInstruction::new(region, method, replacement_text);
                document.add_redaction(page, &instruction)?;
                result.instances_redacted += 1;
            }
            document.apply_redactions(page)?;
            result.pages_modified += 1;
        }

        debug!(
            redacted = result.instances_redacted,
            unresolved = result.unresolved.len(),
            "text pass finished"
        );
        Ok(())
    }

    fn image_pass<D: RedactableDocument>(
        &self,
        document: &mut D,
        terms: &[String],
        method: RedactionMethod,
        replacement_text: &str,
        fuzzy_threshold: Option<u8>,
        result: &mut RedactionResult,
    ) -> RedactorResult<()> {
        if terms.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for page in 0..result.pages_processed {
            let images = match document.images(page) {
                Ok(images) => images,
                Err(e) => {
                    warn!(page = page + 1, error = %e, "could not list images");
                    result.image_failures.push(format!("page {}: {}", page + 1, e));
                    continue;
                }
            };

            for skipped in images.skipped {
                if seen.insert(skipped.id) {
                    warn!(page = page + 1, image = skipped.id.0, reason = %skipped.reason, "image not decodable");
                    result
                        .image_failures
                        .push(format!("page {} image {}: {}", page + 1, skipped.id.0, skipped.reason));
                }
            }

            for image in images.images {
                if !seen.insert(image.id) {
                    continue;
                }
                result.images_processed += 1;

                let redacted = match self.raster.redact_image(
                    &image.bytes,
                    terms,
                    method,
                    replacement_text,
                    fuzzy_threshold,
                ) {
                    Ok(redacted) => redacted,
                    Err(e) => {
                        warn!(page = page + 1, image = image.id.0, error = %e, "skipping image");
                        result.image_failures.push(format!("page {} image {}: {}", page + 1, image.id.0, e));
                        continue;
                    }
                };

                if redacted.words_redacted == 0 {
                    continue;
                }
                match document.replace_image(image.id, &redacted.bytes) {
                    Ok(()) => {
                        debug!(page = page + 1, image = image.id.0, words = redacted.words_redacted, "image redacted");
                        result.images_modified += 1;
                    }
                    Err(e) => {
                        warn!(page = page + 1, image = image.id.0, error = %e, "could not replace image");
                        result.image_failures.push(format!("page {} image {}: {}", page + 1, image.id.0, e));
                    }
                }
            }
        }
        Ok(())
    }

    /// Text of every page followed by the OCR text of its images, each
    /// section under a header. Pages without text get no header. OCR
    /// failures are logged and skipped.
    pub fn extract_text<D: RedactableDocument>(&self, document: &mut D) -> RedactorResult<String> {
        let page_count = document.page_count()?;
        let mut pages = Vec::with_capacity(page_count);
        for page in 0..page_count {
            let text = document.text_layer(page)?.plain_text();
            pages.push((!text.trim().is_empty()).then(|| format!("\n--- Page {} ---\n{}", page + 1, text)));
        }

        let mut out = String::new();
        for (page, text) in pages.into_iter().enumerate() {
            if let Some(text) = text {
                out.push_str(&text);
            }
            let images = document.images(page).unwrap_or_else(|e| {
                warn!(page = page + 1, error = %e, "could not list images");
                Default::default()
            });
            for skipped in &images.skipped {
                debug!(page = page + 1, image = skipped.id.0, reason = %skipped.reason, "image not decodable");
            }
            for image in images.images {
                match self.raster.ocr_text(&image.bytes) {
                    Ok(ocr) if !ocr.trim().is_empty() => {
                        out.push_str(&format!("\n--- Image OCR on Page {} ---\n{}", page + 1, ocr));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(page = page + 1, image = image.id.0, error = %e, "OCR failed"),
                }
            }
        }
        Ok(out)
    }
}
