use crate::geometry::Size;

/// Grid geometry of the gallery for one viewport size.
///
/// Tiles are stretched so that a row exactly fills the viewport width, and the
/// tile height follows from the configured height/width ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalleryLayout {
    /// Tiles per row (>= 1)
    pub columns: usize,
    /// Rows that fit in the viewport (>= 1)
    pub rows: usize,
    pub tile_width: f64,
    pub tile_height: f64,
}

impl GalleryLayout {
    /// Compute the grid for a target tile width and ratio (`height / width`).
    ///
    /// Non-positive targets are treated as 1 so the result is always usable.
    pub fn compute(tile_width: f64, ratio: f64, view: Size) -> Self {
        let target = if tile_width > 0.0 { tile_width } else { 1.0 };
        let ratio = if ratio > 0.0 { ratio } else { 1.0 };

        let columns = ((view.width / target).floor() as usize).max(1);
        let tile_width = view.width.max(0.0) / columns as f64;
        let tile_height = tile_width * ratio;

        let rows = if tile_height > 0.0 {
            ((view.height / tile_height).floor() as usize).max(1)
        } else {
            1
        };

        Self {
            columns,
            rows,
            tile_width,
            tile_height,
        }
    }

    /// Number of tiles visible at once
    pub fn tiles(&self) -> usize {
        self.columns.saturating_mul(self.rows)
    }

    pub fn row_of(&self, index: usize) -> usize {
        index / self.columns
    }
}

/// Tracks which row of the gallery is scrolled to the top.
///
/// The anchor only moves when the cursor leaves the visible rows, and then by the
/// minimum amount needed to bring it back into view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GalleryScroll {
    /// Index of an image in the top visible row
    anchor: usize,
}

impl GalleryScroll {
    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// Index of the first visible tile and the number of visible tiles
    pub fn visible_range(&self, layout: &GalleryLayout) -> (usize, usize) {
        let first = self.anchor - self.anchor % layout.columns;
        (first, layout.tiles())
    }

    /// Visible tile indices clipped to a list of `total` images
    pub fn visible_indices(&self, layout: &GalleryLayout, total: usize) -> std::ops::Range<usize> {
        let (first, tiles) = self.visible_range(layout);
        let start = first.min(total);
        let end = first.saturating_add(tiles).min(total);
        start..end
    }

    /// Scroll so that `cursor` is inside the visible rows
    pub fn follow(&mut self, cursor: usize, layout: &GalleryLayout) {
        let (first, tiles) = self.visible_range(layout);
        let last = first.saturating_add(tiles - 1);
        let cursor_row = layout.row_of(cursor);

        if cursor < first {
            // Cursor above the view: put its row at the top
            self.anchor = cursor_row * layout.columns;
        } else if cursor > last {
            // Cursor below the view: put its row at the bottom
            self.anchor = (cursor_row + 1).saturating_sub(layout.rows) * layout.columns;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_at_least_one() {
        for (vw, w) in [(100.0, 200.0), (1.0, 1000.0), (0.5, 1.0)] {
            let layout = GalleryLayout::compute(w, 1.0, Size::new(vw, 600.0));
            assert_eq!(layout.columns, 1);
            assert_eq!(layout.tile_width, vw);
        }
    }

    #[test]
    fn test_tiles_fill_row_exactly() {
        for (vw, w) in [(1000.0, 200.0), (1000.0, 300.0), (1366.0, 157.0), (800.0, 800.0)] {
            let layout = GalleryLayout::compute(w, 1.0, Size::new(vw, 600.0));
            assert!(layout.columns >= 1);
            assert!((layout.columns as f64 * layout.tile_width - vw).abs() < 1e-9);
        }
    }

    #[test]
    fn test_grid_geometry() {
        let layout = GalleryLayout::compute(300.0, 0.5, Size::new(1000.0, 600.0));
        assert_eq!(layout.columns, 3);
        assert!((layout.tile_height - 1000.0 / 3.0 * 0.5).abs() < 1e-9);
        // 600 / 166.67 = 3.6
        assert_eq!(layout.rows, 3);
        assert_eq!(layout.tiles(), 9);
    }

    #[test]
    fn test_index_mapping() {
        let layout = GalleryLayout::compute(250.0, 1.0, Size::new(1000.0, 1000.0));
        assert_eq!(layout.columns, 4);
        assert_eq!(layout.row_of(9), 2);
        assert_eq!(layout.row_of(3), 0);
    }

    #[test]
    fn test_scroll_follows_cursor() {
        // 4 columns, 2 rows visible
        let layout = GalleryLayout::compute(250.0, 1.0, Size::new(1000.0, 500.0));
        assert_eq!((layout.columns, layout.rows), (4, 2));

        let mut scroll = GalleryScroll::default();
        scroll.follow(5, &layout);
        assert_eq!(scroll.visible_range(&layout), (0, 8));

        // Row 2 is below the view, scroll one row down
        scroll.follow(9, &layout);
        assert_eq!(scroll.visible_range(&layout), (4, 8));

        // Back up into row 0
        scroll.follow(2, &layout);
        assert_eq!(scroll.visible_range(&layout), (0, 8));

        // Jump far down: cursor row ends at the bottom
        scroll.follow(22, &layout);
        assert_eq!(scroll.visible_range(&layout), (16, 8));
        assert_eq!(scroll.visible_indices(&layout, 23), 16..23);
    }

    #[test]
    fn test_tiny_tiles_do_not_overflow() {
        let layout = GalleryLayout::compute(1e-10, 1.0, Size::new(800.0, 600.0));
        assert!(layout.columns >= 1);
        assert_eq!(layout.tiles(), usize::MAX);

        let mut scroll = GalleryScroll::default();
        scroll.follow(7, &layout);
        assert_eq!(scroll.visible_range(&layout), (0, usize::MAX));
        assert_eq!(scroll.visible_indices(&layout, 30), 0..30);
    }
}
