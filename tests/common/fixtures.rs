//! Test fixtures and PDF builders.
//!
//! Provides builders for creating test PDFs with specific content,
//! following the Builder pattern for clean test setup.

use anyhow::{anyhow, Result};
use lopdf::{dictionary, Stream};
use printpdf::*;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Builder for creating test PDFs with custom content.
///
/// Each call to [`with_line`](Self::with_line) places one line of
/// Helvetica text; [`new_page`](Self::new_page) starts another page.
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    title: String,
    pages: Vec<Vec<String>>,
    page_width: Mm,
    page_height: Mm,
}

impl TestPdfBuilder {
    /// Creates a new test PDF builder with default settings.
    pub fn new() -> Self {
        Self {
            title: "Test Document".to_string(),
            pages: vec![Vec::new()],
            page_width: Mm(210.0),  // A4 width
            page_height: Mm(297.0), // A4 height
        }
    }

    /// Sets the document title (also written into the Info dictionary).
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Adds a line of text to the current page.
    pub fn with_line(mut self, line: &str) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.push(line.to_string());
        }
        self
    }

    /// Starts a new page.
    pub fn new_page(mut self) -> Self {
        self.pages.push(Vec::new());
        self
    }

    /// Builds the PDF and writes it to the specified path.
    pub fn build(self, output_path: &Path) -> Result<PathBuf> {
        let (doc, page1, layer1) =
            PdfDocument::new(&self.title, self.page_width, self.page_height, "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;

        for (i, lines) in self.pages.iter().enumerate() {
            let layer = if i == 0 {
                doc.get_page(page1).get_layer(layer1)
            } else {
                let (page, layer) = doc.add_page(self.page_width, self.page_height, "Layer 1");
                doc.get_page(page).get_layer(layer)
            };

            for (n, line) in lines.iter().enumerate() {
                let y = 270.0 - 10.0 * n as f32;
                layer.use_text(line.as_str(), 12.0, Mm(20.0), Mm(y), &font);
            }
        }

        doc.save(&mut BufWriter::new(fs::File::create(output_path)?))?;
        Ok(output_path.to_path_buf())
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws a solid, uncompressed RGB image on the first page of an existing
/// PDF.
pub fn add_rgb_image(path: &Path, width: u32, height: u32, rgb: [u8; 3]) -> Result<()> {
    let samples: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
    let image = Stream::new(image_dict(width, height, "DeviceRGB".into()), samples);
    draw_image(path, image, width, height)
}

/// Draws a solid RGB image tagged with an ICC profile and stored
/// Flate-compressed.
pub fn add_icc_rgb_image(path: &Path, width: u32, height: u32, rgb: [u8; 3]) -> Result<()> {
    let mut doc = lopdf::Document::load(path)?;
    let profile_id = doc.add_object(Stream::new(dictionary! { "N" => 3 }, b"icc profile".to_vec()));
    doc.save(path)?;

    let samples: Vec<u8> = (0..width * height).flat_map(|_| rgb).collect();
    let colour_space = lopdf::Object::Array(vec![
        lopdf::Object::Name(b"ICCBased".to_vec()),
        lopdf::Object::Reference(profile_id),
    ]);
    let mut image = Stream::new(image_dict(width, height, colour_space), samples);
    image.compress()?;
    draw_image(path, image, width, height)
}

/// Draws an image whose samples use a bilevel codec.
pub fn add_jbig2_image(path: &Path, width: u32, height: u32) -> Result<()> {
    let mut dict = image_dict(width, height, "DeviceGray".into());
    dict.set("BitsPerComponent", 1);
    dict.set("Filter", "JBIG2Decode");
    draw_image(path, Stream::new(dict, vec![0u8; 16]), width, height)
}

fn image_dict(width: u32, height: u32, colour_space: lopdf::Object) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => colour_space,
        "BitsPerComponent" => 8_i64,
    }
}

fn draw_image(path: &Path, image: Stream, width: u32, height: u32) -> Result<()> {
    let mut doc = lopdf::Document::load(path)?;
    let page_id = *doc
        .get_pages()
        .get(&1)
        .ok_or_else(|| anyhow!("PDF has no pages"))?;

    let name = format!("ImTest{}", doc.max_id + 1);
    let image_id = doc.add_object(image);
    doc.add_xobject(page_id, name.as_str(), image_id)?;

    let mut content = doc.get_page_content(page_id)?;
    content.extend_from_slice(format!("\nq {} 0 0 {} 100 300 cm /{} Do Q\n", width, height, name).as_bytes());
    doc.change_page_content(page_id, content)?;
    doc.save(path)?;
    Ok(())
}

/// An identity-card style document.
pub fn create_id_card(path: &Path) -> Result<PathBuf> {
    TestPdfBuilder::new()
        .with_title("Identity Card")
        .with_line("GOVERNMENT OF INDIA")
        .with_line("Name: RAVI SHARMA")
        .with_line("Father Name  KISHOR KUMAR")
        .with_line("Email: ravi.sharma@example.com")
        .with_line("Issued at Mangalore")
        .build(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let builder = TestPdfBuilder::new()
            .with_title("Test")
            .with_line("one")
            .new_page()
            .with_line("two");

        assert_eq!(builder.title, "Test");
        assert_eq!(builder.pages.len(), 2);
    }
}
