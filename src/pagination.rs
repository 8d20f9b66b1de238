//! Page navigation over a filtered result.
//!
//! The page number is 1-based and always kept inside `[1, total_pages]`, where
//! `total_pages` is never below 1 (an empty result still has one empty page).

/// Allowed rows-per-page values, smallest first.
pub const PAGE_SIZES: [usize; 5] = [25, 50, 100, 200, 500];

/// Default rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Navigation requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Prev,
    Next,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    page: usize,
    page_size: usize,
    total: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total: 0,
        }
    }
}

impl PageState {
    /// New state on page 1. Sizes outside [`PAGE_SIZES`] fall back to the default.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: normalize_page_size(page_size),
            total: 0,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Row count under the current filter, as of the last [`PageState::set_total`].
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.total, self.page_size)
    }

    /// Zero-based row offset of the first row on the current page.
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }

    /// Rows expected on the current page.
    pub fn rows_on_page(&self) -> usize {
        self.total
            .saturating_sub(self.offset())
            .min(self.page_size)
    }

    /// Record a freshly computed total and re-clamp: a page outside `[1, total_pages]` resets to 1.
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.reclamp();
    }

    /// Change rows per page. Unknown sizes are ignored. Re-clamps against the current total.
    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        if !PAGE_SIZES.contains(&page_size) {
            return false;
        }
        self.page_size = page_size;
        self.reclamp();
        true
    }

    /// Step to the next allowed page size, wrapping to the smallest.
    pub fn cycle_page_size(&mut self) {
        let idx = PAGE_SIZES
            .iter()
            .position(|&s| s == self.page_size)
            .unwrap_or(0);
        let next = PAGE_SIZES[(idx + 1) % PAGE_SIZES.len()];
        self.set_page_size(next);
    }

    /// Jump to an explicit page. Out-of-range requests are clamped.
    pub fn goto(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages());
    }

    pub fn navigate(&mut self, nav: PageNav) {
        let last = self.total_pages();
        self.page = match nav {
            PageNav::First => 1,
            PageNav::Prev => self.page.saturating_sub(1).max(1),
            PageNav::Next => (self.page + 1).min(last),
            PageNav::Last => last,
        };
    }

    fn reclamp(&mut self) {
        if self.page < 1 || self.page > self.total_pages() {
            self.page = 1;
        }
    }
}

/// `ceil(total / page_size)`, at least 1.
pub fn total_pages(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(page_size).max(1)
}

/// Map an arbitrary size onto the allowed set; unknown sizes become [`DEFAULT_PAGE_SIZE`].
pub fn normalize_page_size(page_size: usize) -> usize {
    if PAGE_SIZES.contains(&page_size) {
        page_size
    } else {
        DEFAULT_PAGE_SIZE
    }
}
