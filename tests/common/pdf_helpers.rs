//! PDF manipulation and inspection helpers.

use anyhow::Result;
use std::path::Path;

/// Extracts text from a PDF safely, returning an error instead of panicking.
pub fn extract_text(pdf_path: &Path) -> Result<String> {
    let bytes = std::fs::read(pdf_path)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| anyhow::anyhow!("Failed to extract text: {}", e))
}

/// Counts occurrences of a pattern in a PDF.
pub fn count_pattern_in_pdf(pdf_path: &Path, pattern: &str) -> Result<usize> {
    let text = extract_text(pdf_path)?;
    Ok(text.matches(pattern).count())
}

/// Validates that a PDF is loadable and has basic structure.
pub fn is_valid_pdf(pdf_path: &Path) -> bool {
    ::lopdf::Document::load(pdf_path).is_ok()
}

/// True when the trailer has an Info dictionary or the catalog an XMP
/// stream.
pub fn has_metadata(pdf_path: &Path) -> Result<bool> {
    let doc = ::lopdf::Document::load(pdf_path)?;
    let info = doc.trailer.get(b"Info").is_ok();
    let xmp = doc
        .catalog()
        .map(|catalog| catalog.get(b"Metadata").is_ok())
        .unwrap_or(false);
    Ok(info || xmp)
}

/// `(width, height, colour space)` of every image XObject in the file.
pub fn image_objects(pdf_path: &Path) -> Result<Vec<(i64, i64, String)>> {
    let doc = ::lopdf::Document::load(pdf_path)?;
    let mut images = Vec::new();
    for object in doc.objects.values() {
        let Ok(stream) = object.as_stream() else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(|o| o.as_name())
            .map(|n| n == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        let width = stream.dict.get(b"Width").and_then(|o| o.as_i64())?;
        let height = stream.dict.get(b"Height").and_then(|o| o.as_i64())?;
        let colour = stream
            .dict
            .get(b"ColorSpace")
            .and_then(|o| o.as_name())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        images.push((width, height, colour));
    }
    Ok(images)
}
