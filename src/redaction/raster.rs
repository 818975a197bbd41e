//! OCR-driven redaction of embedded images.

use super::glyphs::draw_text;
use super::strategy::RedactionMethod;
use crate::domain::similarity::{partial_ratio, ratio};
use crate::error::{RedactorError, RedactorResult};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// A word recognised in an image, with its pixel box.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    /// Words sharing this value were read as one line.
    pub line: usize,
}

/// Optical character recognition over a decoded image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> RedactorResult<Vec<OcrWord>>;

    fn name(&self) -> &str;
}

/// Runs the `tesseract` executable, feeding PNG through stdin and reading
/// TSV from stdout.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn error(reason: impl Into<String>) -> RedactorError {
        RedactorError::Ocr {
            engine: "tesseract".to_string(),
            reason: reason.into(),
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &DynamicImage) -> RedactorResult<Vec<OcrWord>> {
        let png = encode_png(&image.to_rgb8())?;

        let mut child = Command::new(&self.binary)
            .args([
                "stdin",
                "stdout",
                "--oem",
                "3",
                "--psm",
                "6",
                "-c",
                "preserve_interword_spaces=1",
                "tsv",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::error(format!("failed to start {}: {}", self.binary.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&png) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(Self::error(format!("failed to send image: {}", e)));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Self::error(e.to_string()))?;
        if !output.status.success() {
            return Err(Self::error(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Word rows of tesseract's TSV output. Rows without text are skipped.
pub(crate) fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();
    let mut current_line: Option<(u32, u32, u32)> = None;
    let mut line = 0usize;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<u32>().ok();
        let (Some(block), Some(par), Some(line_num)) = (num(2), num(3), num(4)) else {
            continue;
        };
        let (Some(x), Some(y), Some(w), Some(h)) = (num(6), num(7), num(8), num(9)) else {
            continue;
        };

        let key = (block, par, line_num);
        match current_line {
            Some(prev) if prev == key => {}
            Some(_) => {
                line += 1;
                current_line = Some(key);
            }
            None => current_line = Some(key),
        }

        words.push(OcrWord {
            text: text.to_string(),
            confidence: cols[10].trim().parse().unwrap_or(-1.0),
            x,
            y,
            w,
            h,
            line,
        });
    }
    words
}

/// Output of a raster redaction.
#[derive(Debug, Clone)]
pub struct RedactedImage {
    /// PNG encoding of the processed image
    pub bytes: Vec<u8>,
    /// Words painted over
    pub words_redacted: usize,
}

/// Finds terms among OCR words and paints over their boxes.
pub struct RasterRedactor<'a> {
    ocr: &'a dyn OcrEngine,
}

impl<'a> RasterRedactor<'a> {
    pub fn new(ocr: &'a dyn OcrEngine) -> Self {
        Self { ocr }
    }

    pub fn redact_image(
        &self,
        image_bytes: &[u8],
        terms: &[String],
        method: RedactionMethod,
        replacement_text: &str,
        fuzzy_threshold: Option<u8>,
    ) -> RedactorResult<RedactedImage> {
        let decoded = image::load_from_memory(image_bytes)?;
        let words = self.ocr.recognize(&decoded)?;
        let mut canvas = decoded.to_rgb8();

        let mut words_redacted = 0;
        for word in &words {
            let Some(term) = matching_term(&word.text, terms, fuzzy_threshold) else {
                continue;
            };
            let Some((x, y, w, h)) = clamp_box(word, canvas.width(), canvas.height()) else {
                continue;
            };
            debug!(word = %word.text, term, x, y, w, h, "redacting image word");
            paint(&mut canvas, x, y, w, h, method, replacement_text);
            words_redacted += 1;
        }

        Ok(RedactedImage {
            bytes: encode_png(&canvas)?,
            words_redacted,
        })
    }

    /// Recognised text, one output line per OCR line.
    pub fn ocr_text(&self, image_bytes: &[u8]) -> RedactorResult<String> {
        let decoded = image::load_from_memory(image_bytes)?;
        let words = self.ocr.recognize(&decoded)?;

        let mut out = String::new();
        let mut last_line = None;
        for word in words.iter().filter(|w| !w.text.trim().is_empty()) {
            match last_line {
                Some(line) if line == word.line => out.push(' '),
                Some(_) => out.push('\n'),
                None => {}
            }
            out.push_str(word.text.trim());
            last_line = Some(word.line);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }
}

/// The first term the word qualifies for.
pub fn matching_term<'t>(
    word: &str,
    terms: &'t [String],
    fuzzy_threshold: Option<u8>,
) -> Option<&'t str> {
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    let lowered = word.to_lowercase();

    terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find(|term| {
            if lowered.contains(&term.to_lowercase()) {
                return true;
            }
            match fuzzy_threshold {
                Some(threshold) => {
                    let threshold = f64::from(threshold.min(100));
                    ratio(word, term) >= threshold
                        || (term.chars().count() > 4 && partial_ratio(term, word) >= threshold)
                }
                None => false,
            }
        })
        .map(String::as_str)
}

fn clamp_box(word: &OcrWord, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    if word.x >= width || word.y >= height {
        return None;
    }
    let w = word.w.min(width - word.x);
    let h = word.h.min(height - word.y);
    (w > 0 && h > 0).then_some((word.x, word.y, w, h))
}

fn paint(
    canvas: &mut RgbImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    method: RedactionMethod,
    replacement_text: &str,
) {
    let [r, g, b] = method.fill_rgb().map(|c| (c * 255.0).round() as u8);
    let fill = Rgb([r, g, b]);
    for py in y..y + h {
        for px in x..x + w {
            canvas.put_pixel(px, py, fill);
        }
    }
    if method == RedactionMethod::Replace {
        draw_text(canvas, replacement_text, x, y, w, h, Rgb([0, 0, 0]));
    }
}

fn encode_png(img: &RgbImage) -> RedactorResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone()).write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOcr(Vec<OcrWord>);

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _image: &DynamicImage) -> RedactorResult<Vec<OcrWord>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn word(text: &str, x: u32, y: u32, w: u32, h: u32, line: usize) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            confidence: 90.0,
            x,
            y,
            w,
            h,
            line,
        }
    }

    fn blank_png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb([200, 200, 200]))).unwrap()
    }

    #[test]
    fn test_matching_term_rules() {
        let terms = vec!["JOHN".to_string()];
        assert_eq!(matching_term("Mr.John,", &terms, None), Some("JOHN"));
        assert_eq!(matching_term("J0HN", &terms, Some(85)), Some("JOHN"));
        assert_eq!(matching_term("J0HN", &terms, Some(100)), None);
        assert_eq!(matching_term("J0HN", &terms, None), None);
        assert_eq!(matching_term("   ", &terms, Some(0)), None);
    }

    #[test]
    fn test_partial_only_for_long_terms() {
        let long = vec!["SHARMA".to_string()];
        assert_eq!(matching_term("SHARNA1", &long, Some(80)), Some("SHARMA"));
        let short = vec!["RAVI".to_string()];
        assert_eq!(matching_term("xxRAV1xx", &short, Some(80)), None);
    }

    #[test]
    fn test_mask_paints_black_box() {
        let ocr = FixedOcr(vec![word("J0HN", 2, 3, 10, 5, 0), word("other", 20, 3, 10, 5, 0)]);
        let redactor = RasterRedactor::new(&ocr);
        let out = redactor
            .redact_image(&blank_png(40, 20), &["JOHN".to_string()], RedactionMethod::Mask, "", Some(85))
            .unwrap();
        assert_eq!(out.words_redacted, 1);

        let img = image::load_from_memory(&out.bytes).unwrap().to_rgb8();
        assert_eq!(*img.get_pixel(5, 5), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(25, 5), Rgb([200, 200, 200]));
    }

    #[test]
    fn test_box_clamped_to_image() {
        let ocr = FixedOcr(vec![word("secret", 30, 15, 100, 100, 0)]);
        let redactor = RasterRedactor::new(&ocr);
        let out = redactor
            .redact_image(&blank_png(40, 20), &["secret".to_string()], RedactionMethod::Erase, "", None)
            .unwrap();
        let img = image::load_from_memory(&out.bytes).unwrap().to_rgb8();
        assert_eq!(*img.get_pixel(39, 19), Rgb([255, 255, 255]));
        assert_eq!(*img.get_pixel(29, 19), Rgb([200, 200, 200]));
    }

    #[test]
    fn test_undecodable_image_is_error() {
        let ocr = FixedOcr(Vec::new());
        let redactor = RasterRedactor::new(&ocr);
        assert!(redactor
            .redact_image(b"not an image", &[], RedactionMethod::Erase, "", None)
            .is_err());
    }

    #[test]
    fn test_ocr_text_groups_lines() {
        let ocr = FixedOcr(vec![
            word("Name:", 0, 0, 1, 1, 0),
            word("RAVI", 0, 0, 1, 1, 0),
            word("PAN", 0, 0, 1, 1, 1),
        ]);
        let redactor = RasterRedactor::new(&ocr);
        assert_eq!(redactor.ocr_text(&blank_png(4, 4)).unwrap(), "Name: RAVI\nPAN\n");
    }

    #[test]
    fn test_parse_tsv() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   4\t1\t1\t1\t1\t0\t10\t10\t100\t20\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t10\t10\t40\t20\t91.5\tName\n\
                   5\t1\t1\t1\t1\t2\t60\t10\t50\t20\t88\tRAVI\n\
                   5\t1\t1\t1\t2\t1\t10\t40\t30\t20\t95\tPAN\n";
        let words = parse_tsv(tsv);
        assert_eq!(words.len(), 3);
        assert_eq!(words[1].text, "RAVI");
        assert_eq!((words[1].x, words[1].w), (60, 50));
        assert_eq!(words[0].line, words[1].line);
        assert_ne!(words[1].line, words[2].line);
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_exiting_before_reading_is_error() {
        // `true` never reads stdin, so an image larger than a pipe buffer
        // cannot be written in full.
        let mut seed = 0x2545_f491_u32;
        let noise = RgbImage::from_fn(400, 400, |_, _| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [_, r, g, b] = seed.to_le_bytes();
            Rgb([r, g, b])
        });

        let err = TesseractOcr::new()
            .with_binary("true")
            .recognize(&DynamicImage::ImageRgb8(noise))
            .unwrap_err();
        match err {
            RedactorError::Ocr { reason, .. } => assert!(reason.contains("failed to send image"), "{}", reason),
            other => panic!("Expected Ocr, got {:?}", other),
        }
    }
}
