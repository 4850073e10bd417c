//! Splitting very tall blocks into independently rendered windows.

use crate::page_template::PageGeometry;
use crate::render::{LayoutExtent, RenderWindow};
use crate::types::Mm;

/// Height the extent would occupy once scaled to the content width.
pub fn estimated_height(extent: LayoutExtent, geometry: &PageGeometry) -> Mm {
    if extent.width_px == 0 {
        return Mm::ZERO;
    }
    Mm::from_f64(
        extent.height_px as f64 * geometry.content_width().to_f64() / extent.width_px as f64,
    )
}

pub fn should_chunk(extent: LayoutExtent, geometry: &PageGeometry) -> bool {
    let threshold = geometry.usable_height() * geometry.chunk_threshold_pages as i32;
    estimated_height(extent, geometry) > threshold
}

/// Window height in source pixels: the configured window, capped so one
/// window never scales past an empty page.
pub fn window_height_px(extent: LayoutExtent, geometry: &PageGeometry) -> u32 {
    let page_px = (geometry.usable_height().to_f64() * extent.width_px as f64
        / geometry.content_width().to_f64())
    .floor();
    let page_px = if page_px < 1.0 { 1 } else { page_px as u32 };
    geometry.chunk_window_px.min(page_px).max(1)
}

/// Consecutive windows covering `[0, extent.height_px)` exactly.
pub fn plan_windows(extent: LayoutExtent, geometry: &PageGeometry) -> Vec<RenderWindow> {
    let step = window_height_px(extent, geometry);
    let mut windows = Vec::new();
    let mut offset = 0u32;
    while offset < extent.height_px {
        let height_px = step.min(extent.height_px - offset);
        windows.push(RenderWindow {
            index: windows.len(),
            offset_px: offset,
            height_px,
        });
        offset += height_px;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width_px: u32, height_px: u32) -> LayoutExtent {
        LayoutExtent {
            width_px,
            height_px,
        }
    }

    #[test]
    fn chunking_starts_past_the_page_threshold() {
        let geometry = PageGeometry::default();
        // 900 px wide: 5 px per mm, three pages = 786 mm = 3930 px.
        assert!(!should_chunk(extent(900, 3930), &geometry));
        assert!(should_chunk(extent(900, 3931), &geometry));
        assert!(!should_chunk(extent(0, 100_000), &geometry));
    }

    #[test]
    fn windows_cover_the_extent_and_fit_a_page() {
        let geometry = PageGeometry::default();
        for (width, height) in [(900u32, 10_000u32), (2000, 12_345), (300, 4000), (900, 1)] {
            let extent = extent(width, height);
            let windows = plan_windows(extent, &geometry);
            let total: u32 = windows.iter().map(|w| w.height_px).sum();
            assert_eq!(total, height);
            let mut expected_offset = 0;
            for (i, window) in windows.iter().enumerate() {
                assert_eq!(window.index, i);
                assert_eq!(window.offset_px, expected_offset);
                expected_offset += window.height_px;
                let mm = window.height_px as f64 * 180.0 / width as f64;
                assert!(mm <= 262.0 + 1e-9, "window {i} is {mm} mm");
            }
        }
    }

    #[test]
    fn narrow_layouts_get_shorter_windows() {
        let geometry = PageGeometry::default();
        assert_eq!(window_height_px(extent(900, 10_000), &geometry), 800);
        // 300 px wide: 262 mm is 436.67 px.
        assert_eq!(window_height_px(extent(300, 10_000), &geometry), 436);
    }
}
