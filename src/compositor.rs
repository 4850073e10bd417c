//! Page compositor: packs rendered block bitmaps onto fixed-size pages.
//!
//! Every content placement satisfies `y + height <= max_content_height`.
//! Blocks are never reordered; a split block's pieces are contiguous.

use std::sync::Arc;

use serde_json::json;

use crate::block::Bitmap;
use crate::canvas::{Canvas, Document, FONT_REGULAR};
use crate::debug::DebugLogger;
use crate::frame::Frame;
use crate::page_template::PageGeometry;
use crate::render::placeholder_bitmap;
use crate::types::{Color, Mm, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    Whole,
    /// Top slice of a split block, filling the rest of a page.
    Head,
    /// Remainder of a split block at the top of the following page.
    Tail,
    Chunk(usize),
    Placeholder,
    GalleryCell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub block: String,
    pub page_index: usize,
    pub kind: PlacementKind,
    /// Visible area on the page.
    pub rect: Rect,
    /// Distance from the top of the scaled bitmap to the visible slice.
    pub source_offset: Mm,
    /// Full scaled height of the bitmap the slice is cut from.
    pub source_height: Mm,
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    /// The block did not fit in the remaining room.
    Overflow,
    /// Too little room left to start a split block.
    FreshPageForSplit,
    /// Continuation of a split block.
    SplitContinuation,
    Gallery,
}

impl BreakReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakReason::Overflow => "overflow",
            BreakReason::FreshPageForSplit => "fresh_page_for_split",
            BreakReason::SplitContinuation => "split_continuation",
            BreakReason::Gallery => "gallery",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageBreak {
    pub block: String,
    pub from_page: usize,
    pub to_page: usize,
    pub reason: BreakReason,
}

/// Content dropped by the single clip fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRecord {
    pub block: String,
    pub page_index: usize,
    pub kept: Mm,
    pub dropped: Mm,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddOutcome {
    Placed,
    MovedToNextPage,
    Split { pieces: usize },
    Clipped { dropped: Mm },
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub page_count: usize,
    pub placements: Vec<Placement>,
    pub page_breaks: Vec<PageBreak>,
    pub clips: Vec<ClipRecord>,
}

impl Layout {
    /// Block names in placement order, one entry per block.
    pub fn block_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        for placement in &self.placements {
            if order.last() != Some(&placement.block.as_str()) {
                order.push(&placement.block);
            }
        }
        order
    }

    pub fn placements_for<'a>(&'a self, block: &'a str) -> impl Iterator<Item = &'a Placement> {
        self.placements.iter().filter(move |p| p.block == block)
    }

    pub fn clipped_total(&self) -> Mm {
        self.clips.iter().map(|clip| clip.dropped).sum()
    }
}

pub struct Compositor {
    geometry: PageGeometry,
    canvas: Canvas,
    frame: Frame,
    layout: Layout,
    debug: Option<Arc<DebugLogger>>,
}

impl Compositor {
    pub fn new(geometry: PageGeometry) -> Self {
        let canvas = Canvas::new(geometry.page_size);
        let frame = geometry.instantiate_frame();
        Self {
            geometry,
            canvas,
            frame,
            layout: Layout::default(),
            debug: None,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    pub fn page_index(&self) -> usize {
        self.canvas.page_index()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn scaled_height(&self, bitmap: &Bitmap) -> Mm {
        bitmap.scaled_height(self.geometry.content_width())
    }

    /// Places one rendered block: on the current page when it fits, whole on
    /// a fresh page when it fits an empty one, otherwise split across two
    /// pages with the remainder clipped to a single page.
    pub fn add_block(&mut self, name: &str, bitmap: Bitmap) -> AddOutcome {
        let height = self.scaled_height(&bitmap);
        let resource = self.canvas.register_image(bitmap);

        if self.frame.fits(height) {
            self.place_whole(name, &resource, height, PlacementKind::Whole);
            return AddOutcome::Placed;
        }
        let near_top = self.frame.is_near_top(self.geometry.small_page_threshold);
        if !near_top && height <= self.geometry.whole_block_limit() {
            self.start_new_page(name, BreakReason::Overflow);
            self.place_whole(name, &resource, height, PlacementKind::Whole);
            return AddOutcome::MovedToNextPage;
        }
        self.split_across_pages(name, &resource, height)
    }

    /// Places one window of a chunk-rendered block. Windows are sized to fit
    /// an empty page, so this never splits unless a renderer returned more
    /// than it was asked for.
    pub fn add_chunk(&mut self, name: &str, index: usize, bitmap: Bitmap) -> AddOutcome {
        let height = self.scaled_height(&bitmap);
        let resource = self.canvas.register_image(bitmap);
        let kind = PlacementKind::Chunk(index);

        if self.frame.fits(height) {
            self.place_whole(name, &resource, height, kind);
            return AddOutcome::Placed;
        }
        if height <= self.geometry.usable_height() {
            self.start_new_page(name, BreakReason::Overflow);
            self.place_whole(name, &resource, height, kind);
            return AddOutcome::MovedToNextPage;
        }
        tracing::warn!(block = name, chunk = index, "chunk taller than a page");
        self.split_across_pages(name, &resource, height)
    }

    /// Stands in for a block that failed to render: a blank panel at the
    /// configured placeholder height with a caption.
    pub fn add_placeholder(&mut self, name: &str, caption: &str) -> AddOutcome {
        let height = self.geometry.placeholder_height;
        let width_px = 720u32;
        let height_px = ((height.to_f64() / self.geometry.content_width().to_f64())
            * width_px as f64)
            .round()
            .max(1.0) as u32;
        let resource = match placeholder_bitmap(width_px, height_px) {
            Ok(bitmap) => Some(self.canvas.register_image(bitmap)),
            Err(err) => {
                tracing::warn!(block = name, error = %err, "placeholder bitmap unavailable");
                None
            }
        };

        let outcome = if self.frame.fits(height) {
            AddOutcome::Placed
        } else {
            self.start_new_page(name, BreakReason::Overflow);
            AddOutcome::MovedToNextPage
        };
        let rect = self.content_rect(height);
        match resource.as_deref() {
            Some(id) => self.canvas.draw_image(rect, id),
            None => {
                self.canvas.set_stroke_color(Color::from_rgb8(180, 180, 186));
                self.canvas.stroke_rect(rect);
            }
        }
        self.canvas.save_state();
        self.canvas.set_fill_color(Color::from_rgb8(110, 110, 120));
        self.canvas.set_font_name(FONT_REGULAR);
        self.canvas.set_font_size(Mm::from_f32(3.5));
        self.canvas
            .draw_string(rect.x + Mm::from_f32(4.0), rect.y + height / 2, caption);
        self.canvas.restore_state();
        self.record(Placement {
            block: name.to_string(),
            page_index: self.page_index(),
            kind: PlacementKind::Placeholder,
            rect,
            source_offset: Mm::ZERO,
            source_height: height,
            resource_id: resource,
        });
        self.frame.advance(height, self.geometry.block_spacing);
        outcome
    }

    pub fn start_new_page(&mut self, block: &str, reason: BreakReason) {
        let from_page = self.page_index();
        self.canvas.show_page();
        self.frame.reset();
        let to_page = self.page_index();
        tracing::debug!(block, from_page, to_page, reason = reason.as_str(), "page break");
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(json!({
                "type": "compositor.page_break",
                "block": block,
                "reason": reason.as_str(),
                "from_page": from_page + 1,
                "to_page": to_page + 1,
            }));
            logger.increment("compositor.page_break", 1);
        }
        self.layout.page_breaks.push(PageBreak {
            block: block.to_string(),
            from_page,
            to_page,
            reason,
        });
    }

    pub(crate) fn record(&mut self, placement: Placement) {
        debug_assert!(
            placement.rect.bottom() <= self.geometry.max_content_height(),
            "placement overflows the content area"
        );
        self.layout.placements.push(placement);
    }

    fn content_rect(&self, height: Mm) -> Rect {
        Rect {
            x: self.geometry.left(),
            y: self.frame.cursor(),
            width: self.geometry.content_width(),
            height,
        }
    }

    fn place_whole(&mut self, name: &str, resource: &str, height: Mm, kind: PlacementKind) {
        let rect = self.content_rect(height);
        self.canvas.draw_image(rect, resource);
        self.record(Placement {
            block: name.to_string(),
            page_index: self.page_index(),
            kind,
            rect,
            source_offset: Mm::ZERO,
            source_height: height,
            resource_id: Some(resource.to_string()),
        });
        self.frame.advance(height, self.geometry.block_spacing);
    }

    /// Draws `[offset, offset + visible)` of the scaled bitmap at the cursor.
    /// The full bitmap is drawn shifted up and clipped, so every slice shares
    /// one embedded image.
    fn place_slice(
        &mut self,
        name: &str,
        resource: &str,
        full_height: Mm,
        offset: Mm,
        visible: Mm,
        kind: PlacementKind,
    ) -> Rect {
        let rect = self.content_rect(visible);
        self.canvas.save_state();
        self.canvas.clip_rect(rect);
        self.canvas.draw_image(
            Rect {
                x: rect.x,
                y: rect.y - offset,
                width: rect.width,
                height: full_height,
            },
            resource,
        );
        self.canvas.restore_state();
        self.record(Placement {
            block: name.to_string(),
            page_index: self.page_index(),
            kind,
            rect,
            source_offset: offset,
            source_height: full_height,
            resource_id: Some(resource.to_string()),
        });
        rect
    }

    fn split_across_pages(&mut self, name: &str, resource: &str, height: Mm) -> AddOutcome {
        let mut moved = false;
        if self.frame.remaining_height() < self.geometry.min_split_band && !self.frame.is_empty() {
            self.start_new_page(name, BreakReason::FreshPageForSplit);
            moved = true;
        }
        if self.frame.fits(height) {
            self.place_whole(name, resource, height, PlacementKind::Whole);
            return if moved {
                AddOutcome::MovedToNextPage
            } else {
                AddOutcome::Placed
            };
        }

        let head = self.frame.remaining_height();
        self.place_slice(name, resource, height, Mm::ZERO, head, PlacementKind::Head);
        self.frame.advance(head, Mm::ZERO);
        self.start_new_page(name, BreakReason::SplitContinuation);

        let tail = height - head;
        let room = self.frame.remaining_height();
        let outcome = if tail <= room {
            self.place_slice(name, resource, height, head, tail, PlacementKind::Tail);
            self.frame.advance(tail, self.geometry.block_spacing);
            AddOutcome::Split { pieces: 2 }
        } else {
            self.place_slice(name, resource, height, head, room, PlacementKind::Tail);
            self.frame.advance(room, self.geometry.block_spacing);
            let dropped = tail - room;
            let page_index = self.page_index();
            tracing::warn!(
                block = name,
                page = page_index + 1,
                dropped_mm = dropped.to_f32(),
                "block taller than two pages; remainder clipped"
            );
            if let Some(logger) = self.debug.as_deref() {
                logger.log_event(json!({
                    "type": "compositor.known_loss",
                    "code": "BLOCK_CLIPPED",
                    "block": name,
                    "page": page_index + 1,
                    "kept_mm": (head + room).to_f32(),
                    "dropped_mm": dropped.to_f32(),
                }));
                logger.increment("compositor.known_loss", 1);
            }
            self.layout.clips.push(ClipRecord {
                block: name.to_string(),
                page_index,
                kept: head + room,
                dropped,
            });
            AddOutcome::Clipped { dropped }
        };
        if let Some(logger) = self.debug.as_deref() {
            logger.log_event(json!({
                "type": "compositor.split",
                "block": name,
                "head_mm": head.to_f32(),
                "height_mm": height.to_f32(),
            }));
            logger.increment("compositor.split", 1);
        }
        outcome
    }

    pub fn finish(self) -> (Document, Layout) {
        let document = self.canvas.finish();
        let mut layout = self.layout;
        layout.page_count = document.pages.len();
        (document, layout)
    }
}
