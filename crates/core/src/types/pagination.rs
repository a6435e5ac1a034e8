//! Page-number pagination math.
//!
//! Used for the blog index (the CMS reports a total count) and for any list
//! the storefront slices itself. Pages are 1-based.

use serde::Serialize;

/// Pagination state for a list of `total_items` split into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Current page (1-based, always within `1..=total_pages`).
    pub current_page: u32,
    /// Items per page (at least 1).
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total_items: u64,
    /// Total number of pages (at least 1).
    pub total_pages: u32,
}

impl Pagination {
    /// Build pagination for a requested page, clamping it into range.
    #[must_use]
    pub fn new(total_items: u64, per_page: u32, requested_page: u32) -> Self {
        let per_page = per_page.max(1);
        let pages = total_items.div_ceil(u64::from(per_page)).max(1);
        let total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        let current_page = requested_page.clamp(1, total_pages);

        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
        }
    }

    /// Index of the first item on the current page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.current_page as u64 - 1) * self.per_page as u64
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    #[must_use]
    pub const fn previous_page(&self) -> Option<u32> {
        if self.has_previous() {
            Some(self.current_page - 1)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn next_page(&self) -> Option<u32> {
        if self.has_next() {
            Some(self.current_page + 1)
        } else {
            None
        }
    }

    /// Page numbers within `radius` of the current page, for page links.
    #[must_use]
    pub fn window(&self, radius: u32) -> Vec<u32> {
        let start = self.current_page.saturating_sub(radius).max(1);
        let end = self
            .current_page
            .saturating_add(radius)
            .min(self.total_pages);
        (start..=end).collect()
    }

    /// The items belonging to the current page.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let len = usize::try_from(self.per_page).unwrap_or(usize::MAX);
        items
            .get(start..)
            .map_or(&[], |rest| rest.get(..len).unwrap_or(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_pages() {
        let p = Pagination::new(25, 10, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.current_page, 2);
        assert_eq!(p.offset(), 10);
        assert_eq!(p.previous_page(), Some(1));
        assert_eq!(p.next_page(), Some(3));
    }

    #[test]
    fn test_clamps_out_of_range_page() {
        assert_eq!(Pagination::new(25, 10, 99).current_page, 3);
        assert_eq!(Pagination::new(25, 10, 0).current_page, 1);
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let p = Pagination::new(0, 10, 4);
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.current_page, 1);
        assert!(!p.has_previous());
        assert!(!p.has_next());
    }

    #[test]
    fn test_zero_per_page_treated_as_one() {
        let p = Pagination::new(3, 0, 2);
        assert_eq!(p.per_page, 1);
        assert_eq!(p.total_pages, 3);
    }

    #[test]
    fn test_window() {
        let p = Pagination::new(100, 10, 5);
        assert_eq!(p.window(2), vec![3, 4, 5, 6, 7]);

        let first = Pagination::new(100, 10, 1);
        assert_eq!(first.window(2), vec![1, 2, 3]);

        let last = Pagination::new(100, 10, 10);
        assert_eq!(last.window(2), vec![8, 9, 10]);
    }

    #[test]
    fn test_slice() {
        let items: Vec<u32> = (1..=7).collect();
        assert_eq!(Pagination::new(7, 3, 1).slice(&items), &[1, 2, 3]);
        assert_eq!(Pagination::new(7, 3, 3).slice(&items), &[7]);
        let empty: [u32; 0] = [];
        assert!(Pagination::new(0, 3, 1).slice(&empty).is_empty());
    }
}
