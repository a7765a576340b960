//! Crop window arithmetic.

/// Rectangle in raster pixel space (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub col_off: u32,
    pub row_off: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelWindow {
    /// Square window of edge `size` centred on a projected pixel, clamped to the raster.
    ///
    /// `row_from_bottom` is the projected row, counted from the bottom edge;
    /// it is flipped into top-left space as `raster_height - row`. Returns
    /// `None` when the window does not intersect the raster.
    pub fn centered(
        col: i64,
        row_from_bottom: i64,
        size: u32,
        raster_width: u32,
        raster_height: u32,
    ) -> Option<Self> {
        let row_top = i64::from(raster_height).saturating_sub(row_from_bottom);
        let half = i64::from(size / 2);

        let x0 = col.saturating_sub(half);
        let y0 = row_top.saturating_sub(half);
        let x1 = x0.saturating_add(i64::from(size));
        let y1 = y0.saturating_add(i64::from(size));

        let (w, h) = (i64::from(raster_width), i64::from(raster_height));
        let (cx0, cx1) = (x0.clamp(0, w), x1.clamp(0, w));
        let (cy0, cy1) = (y0.clamp(0, h), y1.clamp(0, h));

        if cx1 <= cx0 || cy1 <= cy0 {
            return None;
        }

        Some(Self {
            col_off: cx0 as u32,
            row_off: cy0 as u32,
            width: (cx1 - cx0) as u32,
            height: (cy1 - cy0) as u32,
        })
    }

    /// One past the last column.
    pub fn col_end(&self) -> u32 {
        self.col_off + self.width
    }

    /// One past the last row.
    pub fn row_end(&self) -> u32 {
        self.row_off + self.height
    }
}
