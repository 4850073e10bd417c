use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::sync::Arc;

use fixed::types::I32F32;
use image::GenericImageView;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::block::Bitmap;
use crate::canvas::{Command, Document, FONT_REGULAR, Page};
use crate::debug::DebugLogger;
use crate::types::{Color, Mm, Size};

#[derive(Debug, Clone)]
pub struct PdfOptions {
    // When true, identical image bytes registered under different resource ids
    // are embedded once and reused via a single XObject.
    pub reuse_xobjects: bool,
    pub document_title: Option<String>,
    pub producer: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            reuse_xobjects: true,
            document_title: None,
            producer: concat!("valuation-report ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

const PDF_CATALOG_ID: usize = 1;
const PDF_PAGES_ID: usize = 2;
const PDF_RESOURCES_ID: usize = 3;

pub(crate) struct PdfStreamWriter<'a, W: Write> {
    writer: &'a mut W,
    offset: usize,
    offsets: Vec<usize>, // index by object id; 0 is the free object.
    next_id: usize,
    page_size: Size,
    options: PdfOptions,
    debug: Option<Arc<DebugLogger>>,

    // font name -> (resource name, object id); objects are written in `finish`.
    fonts: BTreeMap<String, (String, usize)>,
    next_font_resource: usize,

    image_resources: Vec<(String, usize)>,
    image_name_map: HashMap<String, Option<String>>,
    image_content_map: HashMap<[u8; 32], String>,
    next_image_index: usize,
    image_bytes_total: usize,

    page_ids: Vec<usize>,
}

impl<'a, W: Write> PdfStreamWriter<'a, W> {
    pub(crate) fn new(
        writer: &'a mut W,
        page_size: Size,
        options: PdfOptions,
        debug: Option<Arc<DebugLogger>>,
    ) -> io::Result<Self> {
        let mut offset: usize = 0;
        write_bytes(writer, b"%PDF-1.7\n", &mut offset)?;
        write_bytes(writer, b"%\xE2\xE3\xCF\xD3\n", &mut offset)?;
        Ok(Self {
            writer,
            offset,
            offsets: vec![0; PDF_RESOURCES_ID + 1],
            next_id: PDF_RESOURCES_ID + 1,
            page_size,
            options,
            debug,
            fonts: BTreeMap::new(),
            next_font_resource: 1,
            image_resources: Vec::new(),
            image_name_map: HashMap::new(),
            image_content_map: HashMap::new(),
            next_image_index: 1,
            image_bytes_total: 0,
            page_ids: Vec::new(),
        })
    }

    pub(crate) fn add_document(&mut self, document: &Document) -> io::Result<()> {
        if document.page_size != self.page_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "document page size differs from the writer's",
            ));
        }
        for page in &document.pages {
            self.add_page(page, &document.images)?;
        }
        Ok(())
    }

    fn add_page(&mut self, page: &Page, images: &BTreeMap<String, Bitmap>) -> io::Result<()> {
        let start = self.alloc_ids(2);
        let content_id = start;
        let page_id = start + 1;

        let content_stream = self.render_commands(&page.commands, images)?;
        self.write_object(content_id, &stream_object(&content_stream))?;
        let page_obj = format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
            PDF_PAGES_ID,
            fmt_mm(self.page_size.width),
            fmt_mm(self.page_size.height),
            PDF_RESOURCES_ID,
            content_id,
        );
        self.write_object(page_id, &page_obj)?;
        self.page_ids.push(page_id);
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> io::Result<usize> {
        let fonts = std::mem::take(&mut self.fonts);
        for (name, (_, obj_id)) in &fonts {
            self.write_object(*obj_id, &font_object(name))?;
        }

        let font_entries: Vec<(String, usize)> = fonts.values().cloned().collect();
        let resources = format!(
            "<< /ProcSet [/PDF /Text /ImageB /ImageC] /Font {} /XObject {} >>",
            resource_dict(&font_entries),
            resource_dict(&self.image_resources),
        );
        self.write_object(PDF_RESOURCES_ID, &resources)?;

        let kids = self
            .page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        let pages = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            self.page_ids.len()
        );
        self.write_object(PDF_PAGES_ID, &pages)?;

        let info_id = self.alloc_ids(1);
        let info = info_object(
            self.options.document_title.as_deref(),
            &self.options.producer,
        );
        self.write_object(info_id, &info)?;

        let mut catalog = format!("<< /Type /Catalog /Pages {} 0 R", PDF_PAGES_ID);
        if self.options.document_title.is_some() {
            catalog.push_str(" /ViewerPreferences << /DisplayDocTitle true >>");
        }
        catalog.push_str(" >>");
        self.write_object(PDF_CATALOG_ID, &catalog)?;

        let total_objects = self.next_id.saturating_sub(1);
        let xref_start = self.offset;
        write_str(
            self.writer,
            &format!("xref\n0 {}\n", total_objects + 1),
            &mut self.offset,
        )?;
        write_bytes(self.writer, b"0000000000 65535 f \n", &mut self.offset)?;
        for id in 1..=total_objects {
            let obj_offset = self.offsets.get(id).copied().unwrap_or(0);
            write_str(
                self.writer,
                &format!("{:010} 00000 n \n", obj_offset),
                &mut self.offset,
            )?;
        }
        let trailer = format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
            total_objects + 1,
            PDF_CATALOG_ID,
            info_id,
            xref_start
        );
        write_str(self.writer, &trailer, &mut self.offset)?;

        let bytes_written = self.offset;
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(json!({
                "type": "pdf.link",
                "bytes": bytes_written,
                "pages": self.page_ids.len(),
                "fonts": fonts.len(),
                "images": self.image_resources.len(),
                "image_bytes": self.image_bytes_total,
            }));
        }
        Ok(bytes_written)
    }

    fn render_commands(
        &mut self,
        commands: &[Command],
        images: &BTreeMap<String, Bitmap>,
    ) -> io::Result<String> {
        let page_height = self.page_size.height;
        let mut out = String::new();
        let mut font_stack: Vec<(String, Mm)> = Vec::new();
        let mut current_font_name = FONT_REGULAR.to_string();
        let mut current_font_size = Mm::from_f32(3.5);

        for cmd in commands {
            match cmd {
                Command::SaveState => {
                    font_stack.push((current_font_name.clone(), current_font_size));
                    out.push_str("q\n");
                }
                Command::RestoreState => {
                    if let Some((name, size)) = font_stack.pop() {
                        current_font_name = name;
                        current_font_size = size;
                    }
                    out.push_str("Q\n");
                }
                Command::Meta { .. } => {}
                Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
                Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
                Command::SetLineWidth(width) => {
                    out.push_str(&format!("{} w\n", fmt_mm(*width)));
                }
                Command::SetFontName(name) => current_font_name = name.clone(),
                Command::SetFontSize(size) => current_font_size = *size,
                Command::ClipRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    out.push_str(&format!(
                        "{} {} {} {} re\nW n\n",
                        fmt_mm(*x),
                        fmt_mm(page_height - *y - *height),
                        fmt_mm(*width),
                        fmt_mm(*height)
                    ));
                }
                Command::DrawRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    out.push_str(&format!(
                        "{} {} {} {} re\nf\n",
                        fmt_mm(*x),
                        fmt_mm(page_height - *y - *height),
                        fmt_mm(*width),
                        fmt_mm(*height)
                    ));
                }
                Command::StrokeRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    out.push_str(&format!(
                        "{} {} {} {} re\nS\n",
                        fmt_mm(*x),
                        fmt_mm(page_height - *y - *height),
                        fmt_mm(*width),
                        fmt_mm(*height)
                    ));
                }
                Command::DrawString { x, y, text } => {
                    let resource = self.ensure_font(&current_font_name);
                    let encoded = encode_winansi_pdf_string(text);
                    if encoded.replaced > 0 {
                        if let Some(logger) = self.debug.as_deref() {
                            logger.log_event(json!({
                                "type": "pdf.winansi.lossy",
                                "font": current_font_name,
                                "replaced": encoded.replaced,
                                "sample": truncate_preview(text, 80),
                            }));
                            logger.increment("pdf.winansi.lossy", encoded.replaced as u64);
                        }
                    }
                    out.push_str("BT\n");
                    out.push_str(&format!("/{} {} Tf\n", resource, fmt_mm(current_font_size)));
                    out.push_str(&format!(
                        "{} {} Td\n",
                        fmt_mm(*x),
                        fmt_mm(page_height - *y)
                    ));
                    out.push_str(&format!("({}) Tj\nET\n", encoded.text));
                }
                Command::DrawImage {
                    x,
                    y,
                    width,
                    height,
                    resource_id,
                } => {
                    if *width <= Mm::ZERO || *height <= Mm::ZERO {
                        continue;
                    }
                    if let Some(name) = self.ensure_image(resource_id, images)? {
                        out.push_str("q\n");
                        out.push_str(&format!(
                            "{} 0 0 {} {} {} cm\n",
                            fmt_mm(*width),
                            fmt_mm(*height),
                            fmt_mm(*x),
                            fmt_mm(page_height - *y - *height)
                        ));
                        out.push_str(&format!("/{} Do\n", name));
                        out.push_str("Q\n");
                    }
                }
            }
        }
        Ok(out)
    }

    fn alloc_ids(&mut self, count: usize) -> usize {
        let start = self.next_id;
        self.next_id = self.next_id.saturating_add(count);
        if self.offsets.len() < self.next_id {
            self.offsets.resize(self.next_id, 0);
        }
        start
    }

    fn write_object(&mut self, obj_id: usize, body: &str) -> io::Result<()> {
        write_pdf_object(
            self.writer,
            &mut self.offset,
            &mut self.offsets,
            obj_id,
            body,
        )
    }

    fn ensure_font(&mut self, name: &str) -> String {
        if let Some((resource, _)) = self.fonts.get(name) {
            return resource.clone();
        }
        let resource = format!("F{}", self.next_font_resource);
        self.next_font_resource += 1;
        let obj_id = self.alloc_ids(1);
        self.fonts
            .insert(name.to_string(), (resource.clone(), obj_id));
        resource
    }

    fn ensure_image(
        &mut self,
        resource_id: &str,
        images: &BTreeMap<String, Bitmap>,
    ) -> io::Result<Option<String>> {
        if let Some(name) = self.image_name_map.get(resource_id) {
            return Ok(name.clone());
        }
        let Some(bitmap) = images.get(resource_id) else {
            self.image_missing(resource_id, "unregistered resource");
            self.image_name_map.insert(resource_id.to_string(), None);
            return Ok(None);
        };

        let hash: [u8; 32] = Sha256::digest(bitmap.data()).into();
        if self.options.reuse_xobjects {
            if let Some(name) = self.image_content_map.get(&hash) {
                self.image_name_map
                    .insert(resource_id.to_string(), Some(name.clone()));
                return Ok(Some(name.clone()));
            }
        }

        let Some(image) = decode_image_bytes(bitmap.data()) else {
            self.image_missing(resource_id, "undecodable image");
            self.image_name_map.insert(resource_id.to_string(), None);
            return Ok(None);
        };

        let smask_id = image.alpha.as_ref().map(|_| self.alloc_ids(1));
        let obj_id = self.alloc_ids(1);
        let name = format!("Im{}", self.next_image_index);
        self.next_image_index += 1;

        self.image_bytes_total += image.data.len();
        if let (Some(alpha), Some(mask_id)) = (image.alpha.as_ref(), smask_id) {
            self.image_bytes_total += alpha.data.len();
            self.write_object(mask_id, &image_smask_object(alpha))?;
        }
        self.write_object(obj_id, &image_object(&image, smask_id))?;
        self.image_resources.push((name.clone(), obj_id));
        self.image_name_map
            .insert(resource_id.to_string(), Some(name.clone()));
        if self.options.reuse_xobjects {
            self.image_content_map.insert(hash, name.clone());
        }
        Ok(Some(name))
    }

    fn image_missing(&self, resource_id: &str, reason: &str) {
        tracing::warn!(resource = resource_id, reason, "image left out of the PDF");
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(json!({
                "type": "pdf.image.missing",
                "resource": resource_id,
                "reason": reason,
            }));
        }
    }
}

/// Serializes a composed document into PDF bytes.
pub fn document_to_pdf(document: &Document, options: &PdfOptions) -> io::Result<Vec<u8>> {
    document_to_pdf_with_logs(document, options, None)
}

pub(crate) fn document_to_pdf_with_logs(
    document: &Document,
    options: &PdfOptions,
    debug: Option<Arc<DebugLogger>>,
) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut writer = PdfStreamWriter::new(&mut out, document.page_size, options.clone(), debug)?;
    writer.add_document(document)?;
    writer.finish()?;
    Ok(out)
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    alpha: Option<AlphaData>,
}

struct AlphaData {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

fn decode_image_bytes(data: &[u8]) -> Option<ImageData> {
    let format = image::guess_format(data).ok()?;
    let decoded = image::load_from_memory_with_format(data, format).ok()?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    if format == image::ImageFormat::Jpeg {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Some(ImageData {
            width,
            height,
            color_space,
            filter: "/DCTDecode",
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);
    let mut alpha = Vec::with_capacity((width as usize) * (height as usize));
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let alpha = has_alpha.then(|| AlphaData {
        width,
        height,
        data: flate_compress(&alpha),
    });
    Some(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: "/FlateDecode",
        data: flate_compress(&rgb),
        alpha,
    })
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        "/DCTDecode" => "[/ASCIIHexDecode /DCTDecode]",
        _ => "[/ASCIIHexDecode /FlateDecode]",
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        filters,
        smask,
        stream_data
    )
}

fn image_smask_object(alpha: &AlphaData) -> String {
    let stream_data = encode_stream_data(&alpha.data);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        alpha.width,
        alpha.height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if cleaned.is_empty() {
        FONT_REGULAR.to_string()
    } else {
        cleaned
    }
}

fn resource_dict(entries: &[(String, usize)]) -> String {
    let body = entries
        .iter()
        .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<< {} >>", body)
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn info_object(title: Option<&str>, producer: &str) -> String {
    let mut entries = Vec::new();
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi_pdf_string(title).text));
    }
    entries.push(format!("/Producer ({})", encode_winansi_pdf_string(producer).text));
    format!("<< {} >>", entries.join(" "))
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &str,
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{} 0 obj\n", obj_id), offset)?;
    write_bytes(writer, body.as_bytes(), offset)?;
    write_bytes(writer, b"\nendobj\n", offset)?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

/// Whether the standard Type1 fonts can show `text` without replacements.
pub(crate) fn winansi_encodable(text: &str) -> bool {
    encode_winansi_pdf_string(text).replaced == 0
}

/// Escaped PDF literal string in WinAnsi (cp1252). Characters outside the
/// code page become `?`.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            _ => {
                replaced += 1;
                b'?'
            }
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn truncate_preview(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

/// Millimetres as PDF points.
fn fmt_mm(value: Mm) -> String {
    fmt(value.to_pt())
}

fn color_to_pdf_fill(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}
