//! Object-level pass over a document whose text layer has been redacted.
//!
//! Paints the visible redaction boxes, exposes and swaps embedded images,
//! strips metadata and writes the pruned, compressed result.

use super::document::{EmbeddedImage, ImageId, PageImages, Rect, SkippedImage};
use super::strategy::RedactionInstruction;
use crate::error::{RedactorError, RedactorResult};
use image::{DynamicImage, GrayImage, ImageOutputFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Resource name of the font used for replacement text.
const OVERLAY_FONT: &str = "PiiRedactHelv";

/// Page boxes may be inherited through at most this many parents.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Form XObjects are followed this many levels deep.
const MAX_FORM_DEPTH: usize = 8;

/// Bilevel and wavelet codecs the image crate cannot read.
const UNDECODABLE_FILTERS: [&str; 3] = ["CCITTFaxDecode", "JBIG2Decode", "JPXDecode"];

/// Colour spaces whose samples can be turned into grey or RGB pixels.
#[derive(Debug, Clone, PartialEq)]
enum ColourSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Samples index `palette`, which holds base-space components.
    Indexed { base: Box<ColourSpace>, palette: Vec<u8> },
}

impl ColourSpace {
    fn components(&self) -> usize {
        match self {
            ColourSpace::Gray | ColourSpace::Indexed { .. } => 1,
            ColourSpace::Rgb => 3,
            ColourSpace::Cmyk => 4,
        }
    }
}

pub(crate) struct ObjectStage {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl ObjectStage {
    pub(crate) fn load(path: &Path) -> RedactorResult<Self> {
        Ok(Self::from_document(Document::load(path)?))
    }

    pub(crate) fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages();
        Self { doc, pages }
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_id(&self, page: usize) -> RedactorResult<ObjectId> {
        self.pages
            .get(&(page as u32 + 1))
            .copied()
            .ok_or_else(|| RedactorError::PdfProcessing {
                message: "page not found".to_string(),
                page: Some(page + 1),
                source: None,
            })
    }

    /// Draws the fill (and replacement text) of every instruction on top of
    /// the existing page content.
    pub(crate) fn paint_overlays(&mut self, overlays: &[RedactionInstruction]) -> RedactorResult<()> {
        let mut by_page: BTreeMap<usize, Vec<&RedactionInstruction>> = BTreeMap::new();
        for overlay in overlays {
            by_page.entry(overlay.region.page).or_default().push(overlay);
        }
        if by_page.is_empty() {
            return Ok(());
        }

        let font_id = self.doc.add_object(lopdf::dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        for (page, instructions) in by_page {
            let page_id = self.page_id(page)?;
            let page_box = self.page_box(page_id);

            let mut operations = Vec::new();
            let mut needs_font = false;
            for instruction in instructions {
                needs_font |= instruction.replacement_text.is_some();
                operations.extend(overlay_operations(instruction, page_box));
            }

            let existing = self.doc.get_page_content(page_id)?;
            let overlay = Content { operations }.encode()?;

            let mut content = Vec::with_capacity(existing.len() + overlay.len() + 8);
            content.extend_from_slice(b"q\n");
            content.extend_from_slice(&existing);
            content.extend_from_slice(b"\nQ\n");
            content.extend_from_slice(&overlay);
            self.doc.change_page_content(page_id, content)?;

            if needs_font {
                self.install_font(page_id, font_id)?;
            }
            debug!(page = page + 1, "overlays painted");
        }
        Ok(())
    }

    /// CropBox, else MediaBox, as `[x0, y0, x1, y1]` in PDF user space.
    fn page_box(&self, page_id: ObjectId) -> [f32; 4] {
        for key in [b"CropBox".as_slice(), b"MediaBox".as_slice()] {
            if let Some(found) = self.inherited(page_id, key).and_then(|o| rect_of(&self.doc, o)) {
                return found;
            }
        }
        [0.0, 0.0, 612.0, 792.0]
    }

    /// Looks `key` up on the page, then on its ancestors.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    /// Effective resources of a page, resolved and cloned.
    fn resources(&self, page_id: ObjectId) -> Dictionary {
        self.inherited(page_id, b"Resources")
            .and_then(|o| resolve_dict(&self.doc, o))
            .cloned()
            .unwrap_or_default()
    }

    fn install_font(&mut self, page_id: ObjectId, font_id: ObjectId) -> RedactorResult<()> {
        let mut resources = self.resources(page_id);
        let mut fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|o| resolve_dict(&self.doc, o))
            .cloned()
            .unwrap_or_default();
        fonts.set(OVERLAY_FONT, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        self.doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// Image XObjects drawn by a page, including those inside its form
    /// XObjects.
    fn image_ids(&self, page: usize) -> RedactorResult<Vec<ObjectId>> {
        let page_id = self.page_id(page)?;
        let resources = self.resources(page_id);
        let mut visited = HashSet::new();
        let mut ids = Vec::new();
        self.collect_images(&resources, 0, &mut visited, &mut ids);
        Ok(ids)
    }

    fn collect_images(
        &self,
        resources: &Dictionary,
        depth: usize,
        visited: &mut HashSet<ObjectId>,
        ids: &mut Vec<ObjectId>,
    ) {
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| resolve_dict(&self.doc, o))
        else {
            return;
        };

        for (_, value) in xobjects.iter() {
            let Ok(id) = value.as_reference() else {
                continue;
            };
            if !visited.insert(id) {
                continue;
            }
            let Ok(stream) = self.doc.get_object(id).and_then(Object::as_stream) else {
                continue;
            };
            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => ids.push(id),
                Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                    if let Some(inner) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| resolve_dict(&self.doc, o))
                    {
                        self.collect_images(inner, depth + 1, visited, ids);
                    }
                }
                _ => {}
            }
        }
    }

    pub(crate) fn images(&self, page: usize) -> RedactorResult<PageImages> {
        let mut found = PageImages::default();
        for id in self.image_ids(page)? {
            match self.encoded_image(id) {
                Ok(bytes) => found.images.push(EmbeddedImage {
                    id: image_id(id),
                    bytes,
                }),
                Err(e) => {
                    warn!(page = page + 1, object = id.0, error = %e, "skipping undecodable image");
                    found.skipped.push(SkippedImage {
                        id: image_id(id),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(found)
    }

    /// JPEG streams are handed out as-is; other rasters are unpacked to
    /// 8-bit grey or RGB and wrapped as PNG.
    fn encoded_image(&self, id: ObjectId) -> RedactorResult<Vec<u8>> {
        let stream = self.doc.get_object(id)?.as_stream()?;
        let dict = &stream.dict;
        let filters = filter_names(dict);

        if let Some(filter) = filters.iter().find(|f| UNDECODABLE_FILTERS.contains(&f.as_str())) {
            return Err(unsupported(id, &format!("{} samples", filter)));
        }
        if filters.iter().any(|f| f == "DCTDecode") {
            if filters.len() == 1 {
                return Ok(stream.content.clone());
            }
            return Err(unsupported(id, "chained DCTDecode"));
        }

        let raw = if filters.is_empty() {
            stream.content.clone()
        } else if filters.iter().all(|f| f == "FlateDecode" || f == "LZWDecode") {
            image_samples(stream)?
        } else {
            return Err(unsupported(id, &filters.join(",")));
        };

        let width = dimension(dict, b"Width").ok_or_else(|| unsupported(id, "width"))?;
        let height = dimension(dict, b"Height").ok_or_else(|| unsupported(id, "height"))?;

        let stencil = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
        let (space, bits) = if stencil {
            (ColourSpace::Gray, 1)
        } else {
            let space = dict
                .get(b"ColorSpace")
                .map_err(|_| unsupported(id, "missing colour space"))
                .and_then(|o| {
                    self.colour_space(o)
                        .map_err(|family| unsupported(id, &format!("colour space '{}'", family)))
                })?;
            let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
            (space, bits)
        };
        let bits = match bits {
            1 | 2 | 4 | 8 | 16 => bits as usize,
            other => return Err(unsupported(id, &format!("{} bits per component", other))),
        };

        let invert = !matches!(space, ColourSpace::Indexed { .. }) && decode_inverted(dict);
        let decoded = unpack_samples(&raw, width as usize, height as usize, space.components(), bits)
            .and_then(|samples| rasterize(&space, &samples, bits, invert, width, height))
            .ok_or_else(|| unsupported(id, "truncated sample data"))?;

        let mut out = Cursor::new(Vec::new());
        decoded.write_to(&mut out, ImageOutputFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Resolves an image colour space. The error carries the family name.
    fn colour_space(&self, object: &Object) -> Result<ColourSpace, String> {
        match self.deref(object) {
            Object::Name(name) => device_space(name).ok_or_else(|| String::from_utf8_lossy(name).into_owned()),
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .ok_or_else(|| "unnamed array".to_string())?;
                match family {
                    b"ICCBased" => {
                        let components = items
                            .get(1)
                            .and_then(|o| self.deref(o).as_stream().ok())
                            .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok());
                        match components {
                            Some(1) => Ok(ColourSpace::Gray),
                            Some(3) => Ok(ColourSpace::Rgb),
                            Some(4) => Ok(ColourSpace::Cmyk),
                            _ => Err("ICCBased".to_string()),
                        }
                    }
                    b"CalGray" => Ok(ColourSpace::Gray),
                    b"CalRGB" => Ok(ColourSpace::Rgb),
                    b"Indexed" | b"I" => {
                        let base = items
                            .get(1)
                            .ok_or_else(|| "Indexed".to_string())
                            .and_then(|o| self.colour_space(o))?;
                        if matches!(base, ColourSpace::Indexed { .. }) {
                            return Err("Indexed".to_string());
                        }
                        let palette = match items.get(3).map(|o| self.deref(o)) {
                            Some(Object::String(bytes, _)) => bytes.clone(),
                            Some(Object::Stream(lookup)) => lookup
                                .decompressed_content()
                                .unwrap_or_else(|_| lookup.content.clone()),
                            _ => return Err("Indexed".to_string()),
                        };
                        Ok(ColourSpace::Indexed {
                            base: Box::new(base),
                            palette,
                        })
                    }
                    other => Err(String::from_utf8_lossy(other).into_owned()),
                }
            }
            _ => Err("malformed".to_string()),
        }
    }

    fn deref<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    /// Swaps the samples of an image object for the decoded `bytes`,
    /// stored as 8-bit RGB.
    pub(crate) fn replace_image(&mut self, id: ImageId, bytes: &[u8]) -> RedactorResult<()> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        let object_id = object_id(id);

        let stream = self.doc.get_object_mut(object_id)?.as_stream_mut()?;
        stream.dict.set("Width", Object::Integer(i64::from(rgb.width())));
        stream.dict.set("Height", Object::Integer(i64::from(rgb.height())));
        stream.dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        stream.dict.set("BitsPerComponent", Object::Integer(8));
        stream.dict.remove(b"Filter");
        stream.dict.remove(b"DecodeParms");
        stream.dict.remove(b"Decode");
        stream.dict.remove(b"ImageMask");
        stream.set_content(rgb.into_raw());
        Ok(())
    }

    /// Drops the Info dictionary and the catalog's XMP stream.
    pub(crate) fn clear_metadata(&mut self) -> RedactorResult<()> {
        self.doc.trailer.remove(b"Info");
        let root = self.doc.trailer.get(b"Root").and_then(Object::as_reference)?;
        self.doc.get_object_mut(root)?.as_dict_mut()?.remove(b"Metadata");
        Ok(())
    }

    pub(crate) fn save(&mut self, output: &Path) -> RedactorResult<()> {
        let pruned = self.doc.prune_objects();
        self.doc.delete_zero_length_streams();
        self.doc.compress();
        debug!(pruned = pruned.len(), "unused objects pruned");

        self.doc.save(output).map_err(|e| RedactorError::PdfProcessing {
            message: format!("failed to write '{}': {}", output.display(), e),
            page: None,
            source: None,
        })?;
        Ok(())
    }
}

fn image_id(id: ObjectId) -> ImageId {
    ImageId((u64::from(id.0) << 16) | u64::from(id.1))
}

fn object_id(id: ImageId) -> ObjectId {
    ((id.0 >> 16) as u32, (id.0 & 0xFFFF) as u16)
}

/// Decompressed samples of an image stream. lopdf only decompresses
/// streams that are not images, so a copy without the subtype is decoded.
fn image_samples(stream: &Stream) -> RedactorResult<Vec<u8>> {
    let mut copy = stream.clone();
    copy.dict.remove(b"Subtype");
    Ok(copy.decompressed_content()?)
}

fn device_space(name: &[u8]) -> Option<ColourSpace> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Some(ColourSpace::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(ColourSpace::Rgb),
        b"DeviceCMYK" | b"CMYK" => Some(ColourSpace::Cmyk),
        _ => None,
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
}

/// True when the Decode array maps the first component high to low.
fn decode_inverted(dict: &Dictionary) -> bool {
    let Ok(decode) = dict.get(b"Decode").and_then(Object::as_array) else {
        return false;
    };
    match (decode.first().and_then(number), decode.get(1).and_then(number)) {
        (Some(d0), Some(d1)) => d0 > d1,
        _ => false,
    }
}

/// Splits rows of packed samples into one value per component. Rows are
/// padded to whole bytes; 16-bit samples are big-endian.
fn unpack_samples(raw: &[u8], width: usize, height: usize, components: usize, bits: usize) -> Option<Vec<u16>> {
    let per_row = width.checked_mul(components)?;
    let row_bytes = per_row.checked_mul(bits)?.checked_add(7)? / 8;
    if row_bytes == 0 || raw.len() < row_bytes.checked_mul(height)? {
        return None;
    }

    let mut samples = Vec::with_capacity(per_row * height);
    for row in raw.chunks_exact(row_bytes).take(height) {
        match bits {
            8 => samples.extend(row[..per_row].iter().map(|&b| u16::from(b))),
            16 => samples.extend(
                row.chunks_exact(2)
                    .take(per_row)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
            ),
            1 | 2 | 4 => {
                let per_byte = 8 / bits;
                let mask = (1u16 << bits) - 1;
                samples.extend((0..per_row).map(|i| {
                    let shift = 8 - bits * (i % per_byte + 1);
                    (u16::from(row[i / per_byte]) >> shift) & mask
                }));
            }
            _ => return None,
        }
    }
    Some(samples)
}

/// Scales a sample of `bits` width to 0..=255.
fn level(sample: u16, bits: usize) -> u8 {
    match bits {
        16 => (sample >> 8) as u8,
        8 => sample as u8,
        _ => (u32::from(sample) * 255 / ((1u32 << bits) - 1)) as u8,
    }
}

fn device_rgb(space: &ColourSpace, pixel: &[u8]) -> [u8; 3] {
    match (space, pixel) {
        (ColourSpace::Gray, [g, ..]) => [*g; 3],
        (ColourSpace::Rgb, [r, g, b, ..]) => [*r, *g, *b],
        (ColourSpace::Cmyk, [c, m, y, k, ..]) => {
            let k = u16::from(*k);
            [*c, *m, *y].map(|v| (255 - (u16::from(v) + k).min(255)) as u8)
        }
        _ => [0; 3],
    }
}

fn rasterize(
    space: &ColourSpace,
    samples: &[u16],
    bits: usize,
    invert: bool,
    width: u32,
    height: u32,
) -> Option<DynamicImage> {
    let scaled = |v: u16| {
        let v = level(v, bits);
        if invert {
            255 - v
        } else {
            v
        }
    };

    match space {
        ColourSpace::Gray => {
            let pixels = samples.iter().map(|&v| scaled(v)).collect();
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        ColourSpace::Indexed { base, palette } => {
            let n = base.components();
            let mut pixels = Vec::with_capacity(samples.len() * 3);
            for &index in samples {
                let start = usize::from(index) * n;
                let rgb = palette
                    .get(start..start + n)
                    .map(|entry| device_rgb(base, entry))
                    .unwrap_or([0; 3]);
                pixels.extend(rgb);
            }
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        _ => {
            let levels: Vec<u8> = samples.iter().map(|&v| scaled(v)).collect();
            let pixels = levels
                .chunks_exact(space.components())
                .flat_map(|pixel| device_rgb(space, pixel))
                .collect();
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
    }
}

fn unsupported(id: ObjectId, what: &str) -> RedactorError {
    RedactorError::Image {
        message: format!("image object {} uses unsupported {}", id.0, what),
        source: None,
    }
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    let name = |o: &Object| o.as_name().ok().map(|n| String::from_utf8_lossy(n).into_owned());
    match dict.get(b"Filter") {
        Ok(Object::Array(items)) => items.iter().filter_map(name).collect(),
        Ok(other) => name(other).into_iter().collect(),
        Err(_) => Vec::new(),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn rect_of(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let array = match object {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        other => other.as_array().ok()?,
    };
    let values: Vec<f32> = array.iter().filter_map(number).collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some([x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)]),
        _ => None,
    }
}

/// Maps a top-left-origin rectangle onto PDF user space of `page_box`.
fn to_user_space(rect: &Rect, page_box: [f32; 4]) -> (f32, f32, f32, f32) {
    let [bx0, _, _, by1] = page_box;
    (rect.x0 + bx0, by1 - rect.y1, rect.width(), rect.height())
}

fn overlay_operations(instruction: &RedactionInstruction, page_box: [f32; 4]) -> Vec<Operation> {
    let (x, y, w, h) = to_user_space(&instruction.region.rect, page_box);
    let [r, g, b] = instruction.method.fill_rgb();

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
        Operation::new("re", vec![Object::Real(x), Object::Real(y), Object::Real(w), Object::Real(h)]),
        Operation::new("f", vec![]),
    ];

    if let Some(text) = instruction.replacement_text.as_deref().filter(|t| !t.is_empty()) {
        // Helvetica averages roughly half an em per glyph.
        let fit_width = w / (0.5 * text.chars().count() as f32);
        let size = (h * 0.8).min(fit_width).max(1.0);
        let baseline = y + (h - size) / 2.0 + size * 0.2;
        ops.extend([
            Operation::new("rg", vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(OVERLAY_FONT.as_bytes().to_vec()), Object::Real(size)]),
            Operation::new("Td", vec![Object::Real(x + 1.0), Object::Real(baseline)]),
            Operation::new("Tj", vec![Object::string_literal(latin1(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    ops.push(Operation::new("Q", vec![]));
    ops
}

/// WinAnsi-compatible bytes; anything outside Latin-1 becomes '?'.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
