use crate::types::Mm;

/// Vertical cursor over one page's content band `[top, limit]`.
pub struct Frame {
    top: Mm,
    limit: Mm,
    cursor_y: Mm,
}

impl Frame {
    pub fn new(top: Mm, limit: Mm) -> Self {
        Self {
            top,
            limit,
            cursor_y: top,
        }
    }

    pub fn cursor(&self) -> Mm {
        self.cursor_y
    }

    pub fn limit(&self) -> Mm {
        self.limit
    }

    pub fn remaining_height(&self) -> Mm {
        (self.limit - self.cursor_y).max(Mm::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.cursor_y <= self.top
    }

    pub fn is_near_top(&self, threshold: Mm) -> bool {
        self.cursor_y <= self.top + threshold
    }

    pub fn fits(&self, height: Mm) -> bool {
        self.cursor_y + height <= self.limit
    }

    /// Moves past a placement of `height` plus the trailing `spacing`.
    pub fn advance(&mut self, height: Mm, spacing: Mm) {
        self.cursor_y = self.cursor_y + height + spacing;
    }

    pub fn reset(&mut self) {
        self.cursor_y = self.top;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mm(v: f32) -> Mm {
        Mm::from_f32(v)
    }

    #[test]
    fn tracks_remaining_room() {
        let mut frame = Frame::new(mm(15.0), mm(277.0));
        assert!(frame.is_empty());
        assert!(frame.fits(mm(262.0)));
        assert!(!frame.fits(mm(262.001)));

        frame.advance(mm(100.0), mm(5.0));
        assert_eq!(frame.cursor(), mm(120.0));
        assert_eq!(frame.remaining_height(), mm(157.0));
        assert!(!frame.is_empty());
        assert!(!frame.is_near_top(mm(20.0)));

        frame.advance(mm(200.0), mm(5.0));
        assert_eq!(frame.remaining_height(), Mm::ZERO);

        frame.reset();
        assert!(frame.is_near_top(mm(20.0)));
    }
}
