use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE: i64 = 10_000;

/// `?page=&page_size=` query parameters. `page_size` and pages below 1 are
/// clamped; a page past [`MAX_PAGE`] is a field error.
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate)]
pub struct PageParams {
    #[validate(range(max = MAX_PAGE, message = "must be at most 10000"))]
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        self.page_size()
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.page_size()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        Self {
            items,
            total,
            page: params.page(),
            page_size: params.page_size(),
        }
    }

    /// Pages an already-filtered, already-sorted in-memory list.
    pub fn from_vec(all: Vec<T>, params: &PageParams) -> Self {
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect();
        Self::new(items, total, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = PageParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_clamps_out_of_range_values() {
        let p = PageParams {
            page: Some(-3),
            page_size: Some(10_000),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), MAX_PAGE_SIZE);

        let p = PageParams {
            page: Some(3),
            page_size: Some(0),
        };
        assert_eq!(p.page_size(), 1);
        assert_eq!(p.offset(), 2);
    }

    #[test]
    fn test_huge_page_is_rejected_and_offset_stays_bounded() {
        let p = PageParams {
            page: Some(i64::MAX),
            page_size: Some(20),
        };
        let err = p.validate().unwrap_err();
        assert!(err.field_errors().contains_key("page"));
        assert_eq!(p.offset(), (MAX_PAGE - 1) * 20);

        let page = Paginated::from_vec(vec![1, 2, 3], &p);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_last_allowed_page_passes() {
        let p = PageParams {
            page: Some(MAX_PAGE),
            page_size: None,
        };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_from_vec_pages_in_memory() {
        let params = PageParams {
            page: Some(2),
            page_size: Some(2),
        };
        let page = Paginated::from_vec(vec![1, 2, 3, 4, 5], &params);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);
        assert_eq!(page.page, 2);
    }
}
