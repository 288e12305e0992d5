//! Mode and position tracking for image mode and the gallery.
//!
//! Both modes index the same image list. Image mode moves linearly; the gallery
//! cursor additionally moves by whole rows using the current [`GalleryLayout`].
//! Every method returns whether the index it manipulates actually changed.

use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::layout::{GalleryLayout, GalleryScroll};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Image,
    Gallery,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Image => "image",
            Self::Gallery => "gallery",
        })
    }
}

impl FromStr for Mode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(Self::Image),
            "gallery" => Ok(Self::Gallery),
            _ => Err(EngineError::invalid("mode", s)),
        }
    }
}

/// Step `index` by `delta` within `[0, total)`, clamping or wrapping at the ends
fn step(index: usize, delta: isize, total: usize, wrap: bool) -> usize {
    let total = total as isize;
    let target = index as isize + delta;
    if wrap {
        target.rem_euclid(total) as usize
    } else {
        target.clamp(0, total - 1) as usize
    }
}

#[derive(Debug, Clone)]
pub struct NavigationController {
    mode: Mode,
    /// The image open in image mode
    index: usize,
    /// The selected tile in the gallery
    cursor: usize,
    scroll: GalleryScroll,
    /// Length of the image list (> 0)
    total: usize,
}

impl NavigationController {
    /// Start in image mode at `start`. The list must not be empty.
    pub fn new(total: usize, start: usize) -> Result<Self> {
        if start >= total {
            return Err(EngineError::Range {
                index: start,
                total,
            });
        }
        Ok(Self {
            mode: Mode::Image,
            index: start,
            cursor: start,
            scroll: GalleryScroll::default(),
            total,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// The index that is current in the active mode
    pub fn index(&self) -> usize {
        match self.mode {
            Mode::Image => self.index,
            Mode::Gallery => self.cursor,
        }
    }

    pub fn image_index(&self) -> usize {
        self.index
    }

    pub fn gallery_cursor(&self) -> usize {
        self.cursor
    }

    pub fn scroll(&self) -> &GalleryScroll {
        &self.scroll
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.total {
            Ok(())
        } else {
            Err(EngineError::Range {
                index,
                total: self.total,
            })
        }
    }

    /// Switch mode. Entering the gallery moves the cursor to the open image.
    pub fn set_mode(&mut self, mode: Mode, layout: &GalleryLayout) -> bool {
        if self.mode == mode {
            return false;
        }
        if mode == Mode::Gallery {
            self.set_cursor(self.index, layout);
        }
        self.mode = mode;
        true
    }

    /// Open the gallery cursor's image in image mode
    pub fn select(&mut self) -> Result<()> {
        if self.mode != Mode::Gallery {
            return Err(EngineError::WrongMode {
                op: "select",
                mode: self.mode,
            });
        }
        self.index = self.cursor;
        self.mode = Mode::Image;
        Ok(())
    }

    // === Image mode ===

    fn set_index(&mut self, index: usize) -> bool {
        let changed = self.index != index;
        self.index = index;
        changed
    }

    pub fn goto(&mut self, index: usize) -> Result<bool> {
        self.check(index)?;
        Ok(self.set_index(index))
    }

    pub fn next(&mut self, wrap: bool) -> bool {
        self.set_index(step(self.index, 1, self.total, wrap))
    }

    pub fn prev(&mut self, wrap: bool) -> bool {
        self.set_index(step(self.index, -1, self.total, wrap))
    }

    pub fn first(&mut self) -> bool {
        self.set_index(0)
    }

    pub fn last(&mut self) -> bool {
        self.set_index(self.total - 1)
    }

    // === Gallery mode ===

    fn set_cursor(&mut self, cursor: usize, layout: &GalleryLayout) -> bool {
        self.scroll.follow(cursor, layout);
        let changed = self.cursor != cursor;
        self.cursor = cursor;
        changed
    }

    /// Re-scroll after the layout changed (e.g. on resize)
    pub fn relayout(&mut self, layout: &GalleryLayout) {
        self.scroll.follow(self.cursor, layout);
    }

    pub fn gallery_goto(&mut self, index: usize, layout: &GalleryLayout) -> Result<bool> {
        self.check(index)?;
        Ok(self.set_cursor(index, layout))
    }

    pub fn gallery_next(&mut self, wrap: bool, layout: &GalleryLayout) -> bool {
        self.set_cursor(step(self.cursor, 1, self.total, wrap), layout)
    }

    pub fn gallery_prev(&mut self, wrap: bool, layout: &GalleryLayout) -> bool {
        self.set_cursor(step(self.cursor, -1, self.total, wrap), layout)
    }

    pub fn gallery_first(&mut self, layout: &GalleryLayout) -> bool {
        self.set_cursor(0, layout)
    }

    pub fn gallery_last(&mut self, layout: &GalleryLayout) -> bool {
        self.set_cursor(self.total - 1, layout)
    }

    /// Move one row up, clamped to the first image
    pub fn gallery_up(&mut self, layout: &GalleryLayout) -> bool {
        let target = self.cursor.saturating_sub(layout.columns);
        self.set_cursor(target, layout)
    }

    /// Move one row down, clamped to the last image
    pub fn gallery_down(&mut self, layout: &GalleryLayout) -> bool {
        let target = self.cursor.saturating_add(layout.columns).min(self.total - 1);
        self.set_cursor(target, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    /// 4 columns, 2 visible rows
    fn layout() -> GalleryLayout {
        GalleryLayout::compute(250.0, 1.0, Size::new(1000.0, 500.0))
    }

    #[test]
    fn test_wrapping_at_ends() {
        for n in [1, 2, 7] {
            let mut nav = NavigationController::new(n, n - 1).unwrap();
            nav.next(true);
            assert_eq!(nav.index(), 0);
            nav.prev(true);
            assert_eq!(nav.index(), n - 1);
        }
    }

    #[test]
    fn test_clamping_at_ends() {
        let mut nav = NavigationController::new(3, 2).unwrap();
        assert!(!nav.next(false));
        assert_eq!(nav.index(), 2);
        nav.first();
        assert!(!nav.prev(false));
        assert_eq!(nav.index(), 0);
        assert!(nav.last());
        assert_eq!(nav.index(), 2);
    }

    #[test]
    fn test_goto_out_of_range_keeps_index() {
        let mut nav = NavigationController::new(5, 3).unwrap();
        let err = nav.goto(5).unwrap_err();
        assert_eq!(err, EngineError::Range { index: 5, total: 5 });
        assert_eq!(nav.index(), 3);
        assert!(nav.goto(4).unwrap());
        assert!(!nav.goto(4).unwrap());
    }

    #[test]
    fn test_new_rejects_empty_list() {
        assert!(NavigationController::new(0, 0).is_err());
        assert!(NavigationController::new(3, 3).is_err());
    }

    #[test]
    fn test_gallery_carries_index_and_select_returns() {
        let layout = layout();
        let mut nav = NavigationController::new(20, 6).unwrap();
        assert!(nav.set_mode(Mode::Gallery, &layout));
        assert_eq!(nav.index(), 6);

        nav.gallery_down(&layout);
        assert_eq!(nav.index(), 10);
        // Image index untouched while browsing
        assert_eq!(nav.image_index(), 6);

        nav.select().unwrap();
        assert_eq!(nav.mode(), Mode::Image);
        assert_eq!(nav.index(), 10);
    }

    #[test]
    fn test_select_outside_gallery_fails() {
        let mut nav = NavigationController::new(4, 1).unwrap();
        assert!(matches!(
            nav.select(),
            Err(EngineError::WrongMode { op: "select", .. })
        ));
        assert_eq!(nav.index(), 1);
    }

    #[test]
    fn test_gallery_rows_clamp() {
        let layout = layout();
        let mut nav = NavigationController::new(10, 0).unwrap();
        nav.set_mode(Mode::Gallery, &layout);

        nav.gallery_goto(6, &layout).unwrap();
        nav.gallery_down(&layout);
        // Past the last row lands on the last image
        assert_eq!(nav.index(), 9);
        assert!(!nav.gallery_down(&layout));

        nav.gallery_goto(2, &layout).unwrap();
        nav.gallery_up(&layout);
        assert_eq!(nav.index(), 0);
    }

    #[test]
    fn test_gallery_left_right() {
        let layout = layout();
        let mut nav = NavigationController::new(5, 4).unwrap();
        nav.set_mode(Mode::Gallery, &layout);
        assert!(!nav.gallery_next(false, &layout));
        assert!(nav.gallery_next(true, &layout));
        assert_eq!(nav.index(), 0);
        nav.gallery_prev(true, &layout);
        assert_eq!(nav.index(), 4);
        nav.gallery_first(&layout);
        assert_eq!(nav.index(), 0);
        nav.gallery_last(&layout);
        assert_eq!(nav.index(), 4);
    }

    #[test]
    fn test_gallery_scroll_tracks_cursor() {
        let layout = layout();
        let mut nav = NavigationController::new(40, 0).unwrap();
        nav.set_mode(Mode::Gallery, &layout);
        nav.gallery_goto(13, &layout).unwrap();
        assert_eq!(nav.scroll().visible_range(&layout), (8, 8));
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("gallery".parse::<Mode>().unwrap(), Mode::Gallery);
        assert_eq!(Mode::Image.to_string(), "image");
        assert!("grid".parse::<Mode>().is_err());
    }
}
