//! Raster redaction through the public API.

mod common;
use common::*;

use piiredact::redaction::{RasterRedactor, RedactionMethod};

fn decode(bytes: &[u8]) -> image::RgbImage {
    image::load_from_memory(bytes).unwrap().to_rgb8()
}

#[test]
fn test_replace_draws_label_on_white() {
    let ocr = FakeOcr::new().with_words(120, vec![ocr_word("SHARMA", 10, 10, 100, 30)]);
    let png = solid_png(120, 50, [180, 180, 180]);

    let redacted = RasterRedactor::new(&ocr)
        .redact_image(&png, &["SHARMA".to_string()], RedactionMethod::Replace, "[REDACTED]", None)
        .unwrap();
    assert_eq!(redacted.words_redacted, 1);

    let img = decode(&redacted.bytes);
    let mut dark = 0;
    let mut light = 0;
    for y in 10..40 {
        for x in 10..110 {
            match img.get_pixel(x, y).0 {
                [0, 0, 0] => dark += 1,
                [255, 255, 255] => light += 1,
                _ => {}
            }
        }
    }
    assert!(dark > 0, "replacement text was not drawn");
    assert!(light > dark);
    assert_eq!(img.get_pixel(5, 5).0, [180, 180, 180]);
}

#[test]
fn test_erase_leaves_white_box() {
    let ocr = FakeOcr::new().with_words(60, vec![ocr_word("ravi.sharma@example.com", 0, 0, 30, 10)]);
    let png = solid_png(60, 20, [10, 10, 10]);

    let redacted = RasterRedactor::new(&ocr)
        .redact_image(&png, &["ravi.sharma@example.com".to_string()], RedactionMethod::Erase, "", None)
        .unwrap();

    let img = decode(&redacted.bytes);
    assert_eq!(img.get_pixel(15, 5).0, [255, 255, 255]);
    assert_eq!(img.get_pixel(45, 15).0, [10, 10, 10]);
}

#[test]
fn test_unmatched_words_untouched() {
    let ocr = FakeOcr::new().with_words(30, vec![ocr_word("GOVERNMENT", 0, 0, 30, 10)]);
    let png = solid_png(30, 10, [10, 10, 10]);

    let redacted = RasterRedactor::new(&ocr)
        .redact_image(&png, &["RAVI".to_string()], RedactionMethod::Mask, "", Some(90))
        .unwrap();

    assert_eq!(redacted.words_redacted, 0);
    assert_eq!(decode(&redacted.bytes).get_pixel(0, 0).0, [10, 10, 10]);
}
