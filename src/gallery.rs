//! Grid layout for the property image gallery. The gallery draws straight
//! onto the compositor's canvas instead of going through a block bitmap.
//! Its own text (title and captions) is drawn as PDF text when the standard
//! fonts can encode it, and otherwise rendered by the block renderer.

use serde_json::json;

use crate::assets::decode_embeddable;
use crate::block::{Bitmap, ContentBlock, Direction, GallerySpec, HtmlBlock};
use crate::canvas::{Canvas, FONT_BOLD, FONT_REGULAR};
use crate::compositor::{BreakReason, Compositor, Placement, PlacementKind};
use crate::debug::DebugLogger;
use crate::metrics::GalleryStats;
use crate::pdf::winansi_encodable;
use crate::records::PropertyImage;
use crate::render::{BlockRenderer, ImageAssetResolver};
use crate::sections::escape_html;
use crate::types::{Color, Mm, Rect};

const GAP_MM: f32 = 5.0;
const CAPTION_MM: f32 = 8.0;
const ROW_SPACING_MM: f32 = 6.0;
const TITLE_MM: f32 = 10.0;
const SUMMARY_MM: f32 = 6.0;
const CAPTION_FONT_MM: f32 = 3.0;
const TITLE_FONT_MM: f32 = 5.0;

/// One gallery cell's content once its asset has been resolved.
pub(crate) type CellImage = Result<Bitmap, String>;

#[derive(Debug, Clone)]
pub(crate) enum GalleryLabel {
    Text(String),
    /// Pre-rendered text, right-aligned when `rtl`.
    Rendered { bitmap: Bitmap, rtl: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct GalleryLabels {
    title: GalleryLabel,
    /// One per image; `None` when the image has no caption of its own.
    captions: Vec<Option<GalleryLabel>>,
}

#[cfg(test)]
impl GalleryLabels {
    /// Every label as PDF text.
    pub(crate) fn plain(spec: &GallerySpec) -> Self {
        Self {
            title: GalleryLabel::Text(spec.title.clone()),
            captions: spec
                .images
                .iter()
                .map(|image| user_caption(image).map(|text| GalleryLabel::Text(text.to_string())))
                .collect(),
        }
    }
}

fn user_caption(image: &PropertyImage) -> Option<&str> {
    image
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn is_arabic(ch: char) -> bool {
    matches!(
        ch,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

async fn resolve_label(
    renderer: &dyn BlockRenderer,
    name: &str,
    class: &str,
    text: &str,
    font_size_mm: f32,
) -> GalleryLabel {
    if winansi_encodable(text) {
        return GalleryLabel::Text(text.to_string());
    }
    let rtl = text.chars().any(is_arabic) && !text.chars().any(|ch| ch.is_ascii_alphabetic());
    let (direction, dir) = if rtl {
        (Direction::Rtl, "rtl")
    } else {
        (Direction::Ltr, "auto")
    };
    let block = ContentBlock::html(
        format!("{name} {class}"),
        HtmlBlock {
            html: format!(
                "<div class=\"gallery-{class}\" dir=\"{dir}\" style=\"font-size:{font_size_mm}mm;white-space:nowrap\">{}</div>",
                escape_html(text)
            ),
            charts: Vec::new(),
            direction,
            watermark: None,
        },
    );
    let rendered = match renderer.render(&block).await {
        Ok(bitmap) => bitmap.validate().map(|()| bitmap),
        Err(err) => Err(err),
    };
    match rendered {
        Ok(bitmap) => GalleryLabel::Rendered { bitmap, rtl },
        Err(err) => {
            tracing::warn!(block = name, label = class, error = %err, "gallery label render failed; drawing as text");
            GalleryLabel::Text(text.to_string())
        }
    }
}

pub(crate) async fn resolve_gallery_labels(
    spec: &GallerySpec,
    renderer: &dyn BlockRenderer,
    name: &str,
) -> GalleryLabels {
    let title = resolve_label(renderer, name, "title", &spec.title, TITLE_FONT_MM).await;
    let mut captions = Vec::with_capacity(spec.images.len());
    for image in &spec.images {
        let caption = match user_caption(image) {
            Some(text) => Some(resolve_label(renderer, name, "caption", text, CAPTION_FONT_MM).await),
            None => None,
        };
        captions.push(caption);
    }
    GalleryLabels { title, captions }
}

pub(crate) async fn resolve_gallery_images(
    images: &[PropertyImage],
    resolver: &dyn ImageAssetResolver,
) -> Vec<CellImage> {
    let mut cells = Vec::with_capacity(images.len());
    for image in images {
        let cell = match resolver.to_embeddable(&image.url).await {
            None => Err("image unavailable".to_string()),
            Some(payload) => match decode_embeddable(&payload) {
                None => Err("invalid image data".to_string()),
                Some(bytes) => {
                    Bitmap::from_encoded(bytes).map_err(|err| format!("unreadable image: {err}"))
                }
            },
        };
        if let Err(reason) = &cell {
            tracing::warn!(url = %image.url, reason = %reason, "gallery image failed");
        }
        cells.push(cell);
    }
    cells
}

/// Resolves every image and label, then lays the gallery out on the
/// compositor.
pub(crate) async fn layout_gallery(
    compositor: &mut Compositor,
    name: &str,
    spec: &GallerySpec,
    resolver: &dyn ImageAssetResolver,
    renderer: &dyn BlockRenderer,
    debug: Option<&DebugLogger>,
) -> GalleryStats {
    let cells = resolve_gallery_images(&spec.images, resolver).await;
    let labels = resolve_gallery_labels(spec, renderer, name).await;
    let stats = place_gallery(compositor, name, spec, cells, labels);
    tracing::info!(
        total = stats.total,
        loaded = stats.loaded,
        failed = stats.failed,
        pages = stats.pages,
        "gallery laid out"
    );
    if let Some(logger) = debug {
        logger.log_event(json!({
            "type": "gallery.summary",
            "block": name,
            "total": stats.total,
            "loaded": stats.loaded,
            "failed": stats.failed,
            "per_row": stats.per_row,
            "pages": stats.pages,
        }));
        logger.increment("gallery.failed", stats.failed as u64);
    }
    stats
}

pub(crate) fn place_gallery(
    compositor: &mut Compositor,
    name: &str,
    spec: &GallerySpec,
    cells: Vec<CellImage>,
    labels: GalleryLabels,
) -> GalleryStats {
    let geometry = compositor.geometry().clone();
    let per_row = spec.per_row.max(1);
    let gap = Mm::from_f32(GAP_MM);
    let caption_h = Mm::from_f32(CAPTION_MM);
    let row_spacing = Mm::from_f32(ROW_SPACING_MM);
    let content_width = geometry.content_width();
    let cell_w = (content_width - gap * (per_row as i32 - 1)) / per_row as i32;
    let max_cell_h = (geometry.usable_height() - caption_h - row_spacing).max(Mm::ZERO);
    let cell_h = ((cell_w * 3) / 4).min(max_cell_h);
    let row_h = cell_h + caption_h + row_spacing;

    if !compositor.frame().is_empty() {
        compositor.start_new_page(name, BreakReason::Gallery);
    }
    let first_page = compositor.page_index();

    let title_y = compositor.frame().cursor();
    let canvas = compositor.canvas_mut();
    canvas.meta("gallery", name);
    canvas.set_fill_color(Color::from_rgb8(30, 41, 59));
    canvas.set_font_name(FONT_BOLD);
    canvas.set_font_size(Mm::from_f32(TITLE_FONT_MM));
    draw_label(
        canvas,
        labels.title,
        geometry.left(),
        title_y + Mm::from_f32(6.0),
        Mm::from_f32(TITLE_FONT_MM),
        content_width,
    );
    compositor.frame_mut().advance(Mm::from_f32(TITLE_MM), Mm::ZERO);
    let mut captions = labels.captions.into_iter();

    let mut stats = GalleryStats {
        total: cells.len(),
        per_row,
        ..GalleryStats::default()
    };

    let mut cells = cells.into_iter().zip(spec.images.iter()).enumerate().peekable();
    while cells.peek().is_some() {
        let frame = compositor.frame();
        if frame.cursor() + row_h > frame.limit() && !frame.is_empty() {
            compositor.start_new_page(name, BreakReason::Gallery);
        }
        let row_y = compositor.frame().cursor();
        for col in 0..per_row {
            let Some((index, (cell, image))) = cells.next() else {
                break;
            };
            let rect = Rect {
                x: geometry.left() + (cell_w + gap) * col as i32,
                y: row_y,
                width: cell_w,
                height: cell_h,
            };
            let caption = captions.next().flatten();
            let loaded = draw_cell(compositor, name, rect, caption_h, index, image, cell, caption);
            if loaded {
                stats.loaded += 1;
            } else {
                stats.failed += 1;
            }
        }
        compositor.frame_mut().advance(row_h, Mm::ZERO);
    }

    let summary_h = Mm::from_f32(SUMMARY_MM);
    if !compositor.frame().fits(summary_h) {
        compositor.start_new_page(name, BreakReason::Gallery);
    }
    let summary_y = compositor.frame().cursor();
    let canvas = compositor.canvas_mut();
    canvas.set_fill_color(Color::from_rgb8(100, 116, 139));
    canvas.set_font_name(FONT_REGULAR);
    canvas.set_font_size(Mm::from_f32(CAPTION_FONT_MM));
    canvas.draw_string(
        geometry.left(),
        summary_y + Mm::from_f32(4.0),
        summary_line(&stats),
    );
    compositor
        .frame_mut()
        .advance(summary_h, geometry.block_spacing);

    stats.pages = compositor.page_index() - first_page + 1;
    stats
}

fn summary_line(stats: &GalleryStats) -> String {
    if stats.failed == 0 {
        format!("{} of {} images shown", stats.loaded, stats.total)
    } else {
        format!(
            "{} of {} images shown, {} unavailable",
            stats.loaded, stats.total, stats.failed
        )
    }
}

/// Draws one cell; returns whether its image was shown.
#[allow(clippy::too_many_arguments)]
fn draw_cell(
    compositor: &mut Compositor,
    name: &str,
    rect: Rect,
    caption_h: Mm,
    index: usize,
    image: &PropertyImage,
    cell: CellImage,
    caption: Option<GalleryLabel>,
) -> bool {
    let page_index = compositor.page_index();
    let canvas = compositor.canvas_mut();
    canvas.save_state();
    canvas.set_stroke_color(Color::from_rgb8(203, 213, 225));
    canvas.set_line_width(Mm::from_f32(0.3));
    canvas.stroke_rect(rect);

    let (resource_id, caption) = match cell {
        Ok(bitmap) => {
            let fitted = fit_contain(rect, bitmap.width_px, bitmap.height_px);
            let id = canvas.register_image(bitmap);
            canvas.draw_image(fitted, id.as_str());
            let caption =
                caption.unwrap_or_else(|| GalleryLabel::Text(format!("Image {}", index + 1)));
            (Some(id), caption)
        }
        Err(reason) => {
            canvas.set_fill_color(Color::from_rgb8(241, 245, 249));
            canvas.draw_rect(rect);
            canvas.set_fill_color(Color::from_rgb8(148, 163, 184));
            canvas.set_font_name(FONT_REGULAR);
            canvas.set_font_size(Mm::from_f32(CAPTION_FONT_MM));
            canvas.draw_string(
                rect.x + Mm::from_f32(3.0),
                rect.y + rect.height / 2,
                "Image not available",
            );
            (
                None,
                GalleryLabel::Text(format!("Image {}: {reason}", index + 1)),
            )
        }
    };

    if image.is_primary && resource_id.is_some() {
        let badge = Rect {
            x: rect.x + Mm::from_f32(2.0),
            y: rect.y + Mm::from_f32(2.0),
            width: Mm::from_f32(18.0),
            height: Mm::from_f32(5.0),
        };
        canvas.set_fill_color(Color::from_rgb8(37, 99, 235));
        canvas.draw_rect(badge);
        canvas.set_fill_color(Color::WHITE);
        canvas.set_font_name(FONT_BOLD);
        canvas.set_font_size(Mm::from_f32(2.8));
        canvas.draw_string(badge.x + Mm::from_f32(1.5), badge.y + Mm::from_f32(3.7), "PRIMARY");
    }

    canvas.set_fill_color(Color::from_rgb8(51, 65, 85));
    canvas.set_font_name(FONT_REGULAR);
    canvas.set_font_size(Mm::from_f32(CAPTION_FONT_MM));
    let caption = match caption {
        GalleryLabel::Text(text) => GalleryLabel::Text(truncate_caption(&text, rect.width)),
        rendered => rendered,
    };
    draw_label(
        canvas,
        caption,
        rect.x,
        rect.y + rect.height + caption_h / 2 + Mm::from_f32(1.0),
        Mm::from_f32(CAPTION_FONT_MM),
        rect.width,
    );
    canvas.restore_state();

    let loaded = resource_id.is_some();
    compositor.record(Placement {
        block: name.to_string(),
        page_index,
        kind: PlacementKind::GalleryCell,
        rect,
        source_offset: Mm::ZERO,
        source_height: rect.height,
        resource_id,
    });
    loaded
}

/// Draws `label` on the line whose baseline is `baseline`, within `max_width`.
fn draw_label(
    canvas: &mut Canvas,
    label: GalleryLabel,
    x: Mm,
    baseline: Mm,
    font_size: Mm,
    max_width: Mm,
) {
    match label {
        GalleryLabel::Text(text) => canvas.draw_string(x, baseline, text),
        GalleryLabel::Rendered { bitmap, rtl } => {
            let line = Rect {
                x,
                y: baseline - font_size,
                width: max_width,
                height: font_size * 3 / 2,
            };
            let mut fitted = fit_contain(line, bitmap.width_px, bitmap.height_px);
            fitted.x = if rtl {
                x + max_width - fitted.width
            } else {
                x
            };
            let id = canvas.register_image(bitmap);
            canvas.draw_image(fitted, id);
        }
    }
}

/// Largest rect with the image's aspect ratio that fits `cell`, centred.
fn fit_contain(cell: Rect, width_px: u32, height_px: u32) -> Rect {
    if width_px == 0 || height_px == 0 {
        return cell;
    }
    let scale = (cell.width.to_f64() / width_px as f64).min(cell.height.to_f64() / height_px as f64);
    let width = Mm::from_f64(width_px as f64 * scale).min(cell.width);
    let height = Mm::from_f64(height_px as f64 * scale).min(cell.height);
    Rect {
        x: cell.x + (cell.width - width) / 2,
        y: cell.y + (cell.height - height) / 2,
        width,
        height,
    }
}

/// Approximate fit for Helvetica at the caption size.
fn truncate_caption(text: &str, width: Mm) -> String {
    let max_chars = (width.to_f32() / (CAPTION_FONT_MM * 0.5)).floor().max(4.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}
