//! Custom assertions for PDF redaction testing.
//!
//! Provides domain-specific assertions that make tests more readable
//! and provide better error messages.

use super::fakes::Call;
use super::pdf_helpers::extract_text;
use std::path::Path;

/// Asserts that a pattern has been successfully redacted from a PDF.
///
/// # Panics
/// Panics if the pattern is still found in the PDF text.
pub fn assert_redacted(pdf_path: &Path, pattern: &str) {
    let text = extract_text_or_panic(pdf_path);
    assert!(
        !text.contains(pattern),
        "Pattern '{}' should be redacted but was found in output PDF at '{}'.\nExtracted text length: {} chars",
        pattern,
        pdf_path.display(),
        text.len()
    );
}

/// Asserts that a pattern has been preserved (not redacted) in a PDF.
///
/// # Panics
/// Panics if the pattern is not found in the PDF.
pub fn assert_preserved(pdf_path: &Path, pattern: &str) {
    let text = extract_text_or_panic(pdf_path);
    assert!(
        text.contains(pattern),
        "Pattern '{}' should be preserved but was not found in PDF at '{}'",
        pattern,
        pdf_path.display()
    );
}

/// Asserts that every text-layer call precedes the first image call.
///
/// # Panics
/// Panics if a page's text was searched or redacted after images were
/// requested.
pub fn assert_text_pass_first(calls: &[Call]) {
    let Some(first_image) = calls.iter().position(|c| matches!(c, Call::Images(_))) else {
        return;
    };
    let late: Vec<&Call> = calls[first_image..]
        .iter()
        .filter(|c| {
            matches!(
                c,
                Call::Search(..) | Call::AddRedaction(..) | Call::ApplyRedactions(_) | Call::TextLayer(_)
            )
        })
        .collect();
    assert!(
        late.is_empty(),
        "Text-layer calls happened after image processing began: {:?}",
        late
    );
}

fn extract_text_or_panic(pdf_path: &Path) -> String {
    extract_text(pdf_path)
        .unwrap_or_else(|e| panic!("Failed to extract text from PDF '{}': {}", pdf_path.display(), e))
}
