//! Manga reader paging
//!
//! A chapter is a flat list of image URLs cut into fixed-size pages. Pages
//! are shown either as a vertical strip that loads images in batches while
//! scrolling, or as horizontal slides where only the slides around the
//! current one are materialized.

use std::ops::Range;

pub const DEFAULT_PAGE_SIZE: usize = 200;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_SWIPE_RADIUS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReaderMode {
    Scroll,
    Swipe,
}

/// Number of pages needed for `len` items
pub fn total_pages(len: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    len.div_ceil(per_page)
}

/// Items of the 0-based `page`; empty when the page does not exist
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    match page_range(items.len(), page, per_page) {
        Some(range) => &items[range],
        None => &[],
    }
}

fn page_range(len: usize, page: usize, per_page: usize) -> Option<Range<usize>> {
    let start = page.checked_mul(per_page)?;
    if per_page == 0 || start >= len {
        return None;
    }
    Some(start..(start + per_page).min(len))
}

// ============================================================================
// SCROLL MODE
// ============================================================================

/// Lazy batch loading within one page
#[derive(Debug, Clone)]
pub struct ScrollLoader {
    page_len: usize,
    batch: usize,
    loaded: usize,
}

impl ScrollLoader {
    pub fn new(page_len: usize, batch: usize) -> Self {
        Self {
            page_len,
            batch: batch.max(1),
            loaded: 0,
        }
    }

    /// Indices (within the page) of the next batch to load
    pub fn next_batch(&mut self) -> Option<Range<usize>> {
        if self.loaded >= self.page_len {
            return None;
        }
        let start = self.loaded;
        self.loaded = (start + self.batch).min(self.page_len);
        Some(start..self.loaded)
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn is_done(&self) -> bool {
        self.loaded >= self.page_len
    }
}

// ============================================================================
// SWIPE MODE
// ============================================================================

/// Current slide across the pages of a chapter
#[derive(Debug, Clone)]
pub struct SwipeWindow {
    total: usize,
    per_page: usize,
    radius: usize,
    page: usize,
    index: usize,
}

impl SwipeWindow {
    pub fn new(total: usize, per_page: usize, radius: usize) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
            radius,
            page: 0,
            index: 0,
        }
    }

    /// Start at a given page and slide, clamped to what exists
    pub fn at(mut self, page: usize, index: usize) -> Self {
        let pages = self.pages();
        self.page = if pages == 0 { 0 } else { page.min(pages - 1) };
        self.index = index.min(self.page_len().saturating_sub(1));
        self
    }

    pub fn pages(&self) -> usize {
        total_pages(self.total, self.per_page)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Slide index within the current page
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position in the whole chapter
    pub fn global_index(&self) -> usize {
        self.page * self.per_page + self.index
    }

    pub fn page_len(&self) -> usize {
        page_range(self.total, self.page, self.per_page).map_or(0, |r| r.len())
    }

    /// Slides of the current page that are materialized
    pub fn visible(&self) -> Range<usize> {
        let len = self.page_len();
        if len == 0 {
            return 0..0;
        }
        let start = self.index.saturating_sub(self.radius);
        let end = (self.index + self.radius + 1).min(len);
        start..end
    }

    pub fn is_materialized(&self, index: usize) -> bool {
        self.visible().contains(&index)
    }

    /// Advance one slide, crossing into the next page after the last slide.
    /// Returns false at the end of the chapter.
    pub fn next_slide(&mut self) -> bool {
        if self.index + 1 < self.page_len() {
            self.index += 1;
            true
        } else if self.page + 1 < self.pages() {
            self.page += 1;
            self.index = 0;
            true
        } else {
            false
        }
    }

    /// Go back one slide, returning to the last slide of the previous page
    /// from the first one. Returns false at the start of the chapter.
    pub fn prev_slide(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else if self.page > 0 {
            self.page -= 1;
            self.index = self.page_len().saturating_sub(1);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 200), 0);
        assert_eq!(total_pages(1, 200), 1);
        assert_eq!(total_pages(200, 200), 1);
        assert_eq!(total_pages(201, 200), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(paginate(&items, 0, 10), &items[0..10]);
        assert_eq!(paginate(&items, 2, 10), &[20, 21, 22, 23, 24]);
        assert!(paginate(&items, 3, 10).is_empty());
        assert!(paginate(&items, usize::MAX, 10).is_empty());

        let empty: Vec<u32> = Vec::new();
        assert!(paginate(&empty, 0, 10).is_empty());
    }

    #[test]
    fn test_scroll_batches() {
        let mut loader = ScrollLoader::new(25, 10);
        assert_eq!(loader.next_batch(), Some(0..10));
        assert_eq!(loader.next_batch(), Some(10..20));
        assert!(!loader.is_done());
        assert_eq!(loader.next_batch(), Some(20..25));
        assert!(loader.is_done());
        assert_eq!(loader.next_batch(), None);
        assert_eq!(loader.loaded(), 25);

        let mut empty = ScrollLoader::new(0, 10);
        assert_eq!(empty.next_batch(), None);
    }

    #[test]
    fn test_swipe_window_radius() {
        let window = SwipeWindow::new(10, 10, 2);
        assert_eq!(window.visible(), 0..3);

        let window = SwipeWindow::new(10, 10, 2).at(0, 5);
        assert_eq!(window.visible(), 3..8);
        assert!(window.is_materialized(7));
        assert!(!window.is_materialized(8));

        let window = SwipeWindow::new(10, 10, 2).at(0, 9);
        assert_eq!(window.visible(), 7..10);
    }

    #[test]
    fn test_swipe_crosses_pages() {
        // Pages of 3, 3 and 1 slides
        let mut window = SwipeWindow::new(7, 3, 1).at(0, 2);
        assert!(window.next_slide());
        assert_eq!((window.page(), window.index()), (1, 0));
        assert_eq!(window.global_index(), 3);

        assert!(window.prev_slide());
        assert_eq!((window.page(), window.index()), (0, 2));

        let mut window = SwipeWindow::new(7, 3, 1).at(2, 0);
        assert_eq!(window.page_len(), 1);
        assert!(!window.next_slide());
        assert!(window.prev_slide());
        assert_eq!((window.page(), window.index()), (1, 2));

        let mut window = SwipeWindow::new(7, 3, 1);
        assert!(!window.prev_slide());
    }

    #[test]
    fn test_swipe_clamps_start() {
        let window = SwipeWindow::new(7, 3, 1).at(9, 9);
        assert_eq!((window.page(), window.index()), (2, 0));

        let empty = SwipeWindow::new(0, 3, 1).at(4, 4);
        assert_eq!(empty.visible(), 0..0);
        assert_eq!(empty.pages(), 0);
    }
}
