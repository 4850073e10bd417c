use crate::error::ReportError;
use crate::frame::Frame;
use crate::types::{Margins, Mm, Size};

/// Fixed page geometry plus the thresholds the compositor's placement
/// policy reads. All lengths are millimetres measured from the page's top
/// edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub page_size: Size,
    pub margins: Margins,
    pub block_spacing: Mm,
    /// A page whose cursor is within this distance of the top margin is
    /// treated as nearly empty and never abandoned for a new page.
    pub small_page_threshold: Mm,
    /// Tolerance subtracted from the usable height when deciding whether a
    /// block fits an empty page whole.
    pub small_margin: Mm,
    /// Smallest remaining room worth starting a split block in.
    pub min_split_band: Mm,
    /// Measured heights above this many usable page heights are rendered in
    /// windows instead of as one bitmap.
    pub chunk_threshold_pages: u32,
    pub chunk_window_px: u32,
    pub placeholder_height: Mm,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::new(15.0, 15.0, 20.0, 15.0),
            block_spacing: Mm::from_f32(5.0),
            small_page_threshold: Mm::from_f32(20.0),
            small_margin: Mm::from_f32(5.0),
            min_split_band: Mm::from_f32(40.0),
            chunk_threshold_pages: 3,
            chunk_window_px: 800,
            placeholder_height: Mm::from_f32(25.0),
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> Mm {
        self.page_size.width - self.margins.left - self.margins.right
    }

    pub fn top(&self) -> Mm {
        self.margins.top
    }

    pub fn left(&self) -> Mm {
        self.margins.left
    }

    /// Lowest y any content may reach.
    pub fn max_content_height(&self) -> Mm {
        self.page_size.height - self.margins.bottom
    }

    /// Height of an empty page's content area.
    pub fn usable_height(&self) -> Mm {
        self.max_content_height() - self.top()
    }

    /// Largest block that is moved whole to a fresh page instead of split.
    pub fn whole_block_limit(&self) -> Mm {
        self.usable_height() - self.small_margin
    }

    pub fn instantiate_frame(&self) -> Frame {
        Frame::new(self.top(), self.max_content_height())
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.content_width() <= Mm::ZERO {
            return Err(ReportError::invalid_configuration(
                "margins leave no horizontal content area",
            ));
        }
        if self.usable_height() <= Mm::ZERO {
            return Err(ReportError::invalid_configuration(
                "margins leave no vertical content area",
            ));
        }
        if self.small_margin < Mm::ZERO || self.whole_block_limit() <= Mm::ZERO {
            return Err(ReportError::invalid_configuration(
                "small_margin must be >= 0 and smaller than the usable height",
            ));
        }
        if self.block_spacing < Mm::ZERO || self.small_page_threshold < Mm::ZERO {
            return Err(ReportError::invalid_configuration(
                "block_spacing and small_page_threshold must be >= 0",
            ));
        }
        if self.min_split_band <= Mm::ZERO || self.min_split_band > self.usable_height() {
            return Err(ReportError::invalid_configuration(
                "min_split_band must be > 0 and fit on an empty page",
            ));
        }
        if self.chunk_threshold_pages == 0 || self.chunk_window_px == 0 {
            return Err(ReportError::invalid_configuration(
                "chunk_threshold_pages and chunk_window_px must be > 0",
            ));
        }
        if self.placeholder_height <= Mm::ZERO || self.placeholder_height > self.whole_block_limit()
        {
            return Err(ReportError::invalid_configuration(
                "placeholder_height must be > 0 and fit on an empty page",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_a4_geometry() {
        let geometry = PageGeometry::default();
        assert!(geometry.validate().is_ok());
        assert_eq!(geometry.content_width().to_milli_i64(), 180_000);
        assert_eq!(geometry.max_content_height().to_milli_i64(), 277_000);
        assert_eq!(geometry.usable_height().to_milli_i64(), 262_000);
        assert_eq!(geometry.whole_block_limit().to_milli_i64(), 257_000);
    }

    #[test]
    fn rejects_degenerate_margins() {
        let geometry = PageGeometry {
            margins: Margins::all(120.0),
            ..PageGeometry::default()
        };
        let err = geometry.validate().unwrap_err();
        assert!(err.to_string().contains("content area"));

        let geometry = PageGeometry {
            chunk_window_px: 0,
            ..PageGeometry::default()
        };
        assert!(geometry.validate().unwrap_err().to_string().contains("chunk_window_px"));
    }
}
