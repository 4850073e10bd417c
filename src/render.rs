//! Seams to the rendering collaborators and the helpers the pipeline wraps
//! around them.

use async_trait::async_trait;
use tiny_skia::{Paint, PathBuilder, Pixmap, Rect as SkRect, Stroke, Transform};

use crate::block::{Bitmap, ContentBlock, HtmlBlock};
use crate::charts::ChartSpec;
use crate::error::RenderError;

/// Result of an off-screen layout pass, in the renderer's layout units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutExtent {
    pub width_px: u32,
    pub height_px: u32,
}

/// A horizontal band of a block's source layout, `[offset_px, offset_px + height_px)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderWindow {
    pub index: usize,
    pub offset_px: u32,
    pub height_px: u32,
}

/// Converts one HTML block into a bitmap. Implementations own whatever
/// off-screen surface they need and must release it on every path; the
/// pipeline never holds one across an await.
#[async_trait]
pub trait BlockRenderer: Send + Sync {
    /// Estimates the rendered extent without producing a bitmap. `None`
    /// means the renderer cannot measure and the block is rendered whole.
    async fn measure(&self, _block: &ContentBlock) -> Result<Option<LayoutExtent>, RenderError> {
        Ok(None)
    }

    async fn render(&self, block: &ContentBlock) -> Result<Bitmap, RenderError>;

    /// Renders one window of the block's layout on its own.
    async fn render_window(
        &self,
        _block: &ContentBlock,
        _window: RenderWindow,
    ) -> Result<Bitmap, RenderError> {
        Err(RenderError::Unsupported("render_window"))
    }
}

/// Draws a chart. `None` is an expected outcome: the chart is left out.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render_chart(&self, spec: &ChartSpec) -> Option<Bitmap>;
}

/// Turns an image reference into a base64 payload ready for embedding.
#[async_trait]
pub trait ImageAssetResolver: Send + Sync {
    async fn to_embeddable(&self, url: &str) -> Option<String>;
}

/// Fills chart markers with inline images, or removes them when the chart
/// renderer has nothing to draw.
pub(crate) async fn resolve_charts(
    block: &HtmlBlock,
    charts: &dyn ChartRenderer,
) -> (HtmlBlock, usize) {
    let mut html = block.html.clone();
    let mut embedded = 0usize;
    for slot in &block.charts {
        let marker = slot.marker();
        let replacement = match charts.render_chart(&slot.spec).await {
            Some(bitmap) if bitmap.validate().is_ok() => {
                embedded += 1;
                format!(
                    "<img class=\"chart\" data-chart=\"{}\" alt=\"{}\" src=\"{}\"/>",
                    slot.id,
                    crate::sections::escape_html(&slot.spec.title),
                    bitmap.to_data_uri()
                )
            }
            _ => {
                tracing::debug!(chart = %slot.id, "chart omitted: no image produced");
                String::new()
            }
        };
        html = html.replace(&marker, &replacement);
    }
    (
        HtmlBlock {
            html,
            charts: Vec::new(),
            direction: block.direction,
            watermark: block.watermark.clone(),
        },
        embedded,
    )
}

/// Stand-in bitmap for a block or chunk that failed to render: a light
/// panel with a border. The caption is drawn by the compositor as text.
pub fn placeholder_bitmap(width_px: u32, height_px: u32) -> Result<Bitmap, RenderError> {
    let width_px = width_px.max(16);
    let height_px = height_px.max(8);
    let mut pixmap = Pixmap::new(width_px, height_px)
        .ok_or_else(|| RenderError::InvalidBitmap("placeholder surface".to_string()))?;
    pixmap.fill(tiny_skia::Color::from_rgba8(244, 244, 246, 255));

    let mut border = Paint::default();
    border.set_color_rgba8(180, 180, 186, 255);
    border.anti_alias = true;
    let stroke = Stroke {
        width: 2.0,
        ..Stroke::default()
    };
    if let Some(rect) = SkRect::from_xywh(
        1.0,
        1.0,
        width_px as f32 - 2.0,
        height_px as f32 - 2.0,
    ) {
        let path = PathBuilder::from_rect(rect);
        pixmap.stroke_path(&path, &border, &stroke, Transform::identity(), None);
    }
    Bitmap::from_pixmap(&pixmap)
}
