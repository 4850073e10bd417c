use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::charts::ChartSpec;
use crate::error::RenderError;
use crate::records::PropertyImage;
use crate::types::Mm;

/// Text direction of an HTML fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// A chart placeholder inside an HTML block. The HTML carries
/// `<!--chart:ID-->` where the rendered chart goes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSlot {
    pub id: String,
    pub spec: ChartSpec,
}

impl ChartSlot {
    pub fn new(id: impl Into<String>, spec: ChartSpec) -> Self {
        Self {
            id: id.into(),
            spec,
        }
    }

    pub fn marker(&self) -> String {
        chart_marker(&self.id)
    }
}

pub fn chart_marker(id: &str) -> String {
    format!("<!--chart:{id}-->")
}

#[derive(Debug, Clone, PartialEq)]
pub struct HtmlBlock {
    pub html: String,
    pub charts: Vec<ChartSlot>,
    pub direction: Direction,
    pub watermark: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GallerySpec {
    pub title: String,
    pub images: Vec<PropertyImage>,
    pub per_row: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderSpec {
    Html(HtmlBlock),
    Gallery(GallerySpec),
}

/// A named unit of report content, produced by the planner and consumed
/// once by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub name: String,
    pub spec: RenderSpec,
}

impl ContentBlock {
    pub fn html(name: impl Into<String>, block: HtmlBlock) -> Self {
        Self {
            name: name.into(),
            spec: RenderSpec::Html(block),
        }
    }

    pub fn gallery(name: impl Into<String>, spec: GallerySpec) -> Self {
        Self {
            name: name.into(),
            spec: RenderSpec::Gallery(spec),
        }
    }

    pub fn as_html(&self) -> Option<&HtmlBlock> {
        match &self.spec {
            RenderSpec::Html(block) => Some(block),
            RenderSpec::Gallery(_) => None,
        }
    }

    pub fn is_gallery(&self) -> bool {
        matches!(self.spec, RenderSpec::Gallery(_))
    }
}

/// Rendered form of a block: an encoded PNG or JPEG plus its intrinsic
/// pixel size. Placement scales the width to the page content width; only
/// the height varies between blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width_px: u32,
    pub height_px: u32,
    data: Arc<Vec<u8>>,
}

impl Bitmap {
    pub fn new(width_px: u32, height_px: u32, data: Vec<u8>) -> Self {
        Self {
            width_px,
            height_px,
            data: Arc::new(data),
        }
    }

    pub fn from_pixmap(pixmap: &tiny_skia::Pixmap) -> Result<Self, RenderError> {
        let png = pixmap
            .encode_png()
            .map_err(|err| RenderError::InvalidBitmap(err.to_string()))?;
        Ok(Self::new(pixmap.width(), pixmap.height(), png))
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self, RenderError> {
        let (width, height) = image.dimensions();
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| RenderError::InvalidBitmap(err.to_string()))?;
        Ok(Self::new(width, height, png))
    }

    /// Wraps already-encoded bytes, reading the dimensions from the image
    /// itself. Fails for anything the PDF writer could not embed.
    pub fn from_encoded(data: Vec<u8>) -> Result<Self, RenderError> {
        let format = image::guess_format(&data)
            .map_err(|err| RenderError::InvalidBitmap(err.to_string()))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(RenderError::InvalidBitmap(format!(
                "unsupported image format {format:?}"
            )));
        }
        let decoded = image::load_from_memory_with_format(&data, format)
            .map_err(|err| RenderError::InvalidBitmap(err.to_string()))?;
        let (width, height) = decoded.dimensions();
        let bitmap = Self::new(width, height, data);
        bitmap.validate()?;
        Ok(bitmap)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.data.is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        if self.width_px == 0 || self.height_px == 0 {
            return Err(RenderError::InvalidBitmap(format!(
                "zero-sized bitmap {}x{}",
                self.width_px, self.height_px
            )));
        }
        Ok(())
    }

    /// Height once the bitmap is scaled, aspect-locked, to `width`.
    pub fn scaled_height(&self, width: Mm) -> Mm {
        if self.width_px == 0 {
            return Mm::ZERO;
        }
        Mm::from_f64(self.height_px as f64 * width.to_f64() / self.width_px as f64)
    }

    pub fn mime_type(&self) -> &'static str {
        match image::guess_format(&self.data) {
            Ok(ImageFormat::Jpeg) => "image/jpeg",
            _ => "image/png",
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(self.data.as_slice())
        )
    }
}
