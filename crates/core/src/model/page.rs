use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized page/limit pair.
///
/// Out-of-range input is never an error: a page below 1 becomes 1, a page
/// beyond `u32::MAX` is clamped to it (and comes back empty), and a page
/// size outside `1..=MAX_PAGE_SIZE` becomes `DEFAULT_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = if page < 1 {
            1
        } else {
            u32::try_from(page).unwrap_or(u32::MAX)
        };
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, page_size }
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Same as `page_size`, named for the store call.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, i64::from(DEFAULT_PAGE_SIZE))
    }
}

/// One page of results plus the totals needed to render pagers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            page: request.page(),
            page_size: request.page_size(),
            total,
            total_pages: total.div_ceil(u64::from(request.page_size())),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_page_falls_back_to_first() {
        assert_eq!(PageRequest::new(0, 10).page(), 1);
        assert_eq!(PageRequest::new(-4, 10).page(), 1);
    }

    #[test]
    fn huge_page_clamps_instead_of_wrapping_to_first() {
        let req = PageRequest::new(5_000_000_000, 10);
        assert_eq!(req.page(), u32::MAX);
        assert_eq!(req.offset(), u64::from(u32::MAX - 1) * 10);
        assert_eq!(PageRequest::new(i64::MAX, 10).page(), u32::MAX);
    }

    #[test]
    fn out_of_range_page_size_falls_back_to_default() {
        assert_eq!(PageRequest::new(1, 0).page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(PageRequest::new(1, -1).page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(PageRequest::new(1, 101).page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(PageRequest::new(1, 100).page_size(), 100);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest::new(1, 10);
        assert_eq!(Page::new(vec![1, 2, 3], 21, &req).total_pages, 3);
        assert_eq!(Page::<u8>::new(Vec::new(), 0, &req).total_pages, 0);
    }
}
