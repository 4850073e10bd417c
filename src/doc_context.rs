use crate::canvas::{Command, Document, FONT_REGULAR};
use crate::page_template::PageGeometry;
use crate::types::{Color, Mm};

/// Per-page values available when stamping page furniture after layout.
#[derive(Debug, Clone)]
pub struct DocContext {
    pub page_number: usize,
    pub page_count: usize,
    pub reference: String,
}

impl DocContext {
    pub fn new(page_number: usize, page_count: usize, reference: impl Into<String>) -> Self {
        Self {
            page_number,
            page_count,
            reference: reference.into(),
        }
    }

    pub fn page_label(&self) -> String {
        format!("Page {} of {}", self.page_number, self.page_count)
    }

    /// "Page n of N" followed by the reference when there is one.
    pub fn footer_text(&self) -> String {
        if self.reference.trim().is_empty() {
            self.page_label()
        } else {
            format!("{}  |  {}", self.page_label(), self.reference.trim())
        }
    }
}

/// Appends the footer line to every page, midway through the bottom margin.
pub(crate) fn stamp_page_footers(document: &mut Document, geometry: &PageGeometry, reference: &str) {
    let page_count = document.pages.len();
    let baseline = geometry.max_content_height() + geometry.margins.bottom / 2;
    for (index, page) in document.pages.iter_mut().enumerate() {
        let context = DocContext::new(index + 1, page_count, reference);
        page.commands.extend([
            Command::SaveState,
            Command::SetFillColor(Color::from_rgb8(100, 116, 139)),
            Command::SetFontName(FONT_REGULAR.to_string()),
            Command::SetFontSize(Mm::from_f32(3.0)),
            Command::DrawString {
                x: geometry.left(),
                y: baseline,
                text: context.footer_text(),
            },
            Command::RestoreState,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;

    #[test]
    fn footer_includes_reference_when_present() {
        assert_eq!(
            DocContext::new(2, 7, "VR-2024-001").footer_text(),
            "Page 2 of 7  |  VR-2024-001"
        );
        assert_eq!(DocContext::new(1, 1, "  ").footer_text(), "Page 1 of 1");
    }

    #[test]
    fn every_page_gets_a_numbered_footer() {
        let geometry = PageGeometry::default();
        let mut canvas = Canvas::new(geometry.page_size);
        canvas.show_page();
        canvas.show_page();
        canvas.draw_string(Mm::from_f32(15.0), Mm::from_f32(20.0), "body");
        let mut document = canvas.finish();
        stamp_page_footers(&mut document, &geometry, "VR-7");
        assert_eq!(document.pages.len(), 3);
        for (index, page) in document.pages.iter().enumerate() {
            assert!(page.contains_text(&format!("Page {} of 3  |  VR-7", index + 1)));
        }
        let footer_y = document.pages[0].commands.iter().find_map(|cmd| match cmd {
            Command::DrawString { y, .. } => Some(*y),
            _ => None,
        });
        assert_eq!(footer_y.map(Mm::to_milli_i64), Some(287_000));
    }
}
