//! Pagination
//!
//! Page numbers are 1-based. A requested page that is missing or not a
//! number resolves to the first page; any number outside the valid range
//! (below 1 or past the end) resolves to the last page. An empty
//! collection still has one (empty) page.

use serde::Serialize;

/// Read a raw `?page=` value as an integer
///
/// `None` when missing or not an integer. Integers too large for `i64`
/// saturate, so they still count as out of range.
pub fn parse_page_number(raw: Option<&str>) -> Option<i64> {
    let value = raw?.trim();
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let saturated = if value.starts_with('-') { i64::MIN } else { i64::MAX };
    Some(value.parse::<i64>().unwrap_or(saturated))
}

/// A resolved page: which rows to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub offset: u64,
    pub limit: u32,
}

/// Resolves page requests against a collection of known size
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(total: u64, per_page: u32) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> u32 {
        let pages = self.total.div_ceil(self.per_page as u64).max(1);
        pages.min(u32::MAX as u64) as u32
    }

    /// Resolve the raw `?page=` value into a window
    pub fn page(&self, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = match parse_page_number(requested) {
            None => 1,
            Some(n) if n < 1 || n > num_pages as i64 => num_pages,
            Some(n) => n as u32,
        };

        PageWindow {
            number,
            num_pages,
            offset: (number as u64 - 1) * self.per_page as u64,
            limit: self.per_page,
        }
    }
}

/// One page of results, shaped for templates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u32>,
    pub previous_page_number: Option<u32>,
}

impl<T> Page<T> {
    /// Wrap the rows fetched for `window`
    pub fn new(items: Vec<T>, window: PageWindow, total: u64) -> Self {
        let has_next = window.number < window.num_pages;
        let has_previous = window.number > 1;

        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
            has_next,
            has_previous,
            next_page_number: has_next.then(|| window.number + 1),
            previous_page_number: has_previous.then(|| window.number - 1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Slice an already ordered sequence into the requested page
pub fn paginate<T>(items: Vec<T>, requested: Option<&str>, per_page: u32) -> Page<T> {
    let total = items.len() as u64;
    let window = Paginator::new(total, per_page).page(requested);

    let page_items = items
        .into_iter()
        .skip(window.offset as usize)
        .take(window.limit as usize)
        .collect();

    Page::new(page_items, window, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_thirteen_items_split_ten_and_three() {
        let items: Vec<u32> = (1..=13).collect();

        let first = paginate(items.clone(), None, 10);
        assert_eq!(first.len(), 10);
        assert_eq!(first.number, 1);
        assert_eq!(first.num_pages, 2);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.next_page_number, Some(2));

        let second = paginate(items, Some("2"), 10);
        assert_eq!(second.items, vec![11, 12, 13]);
        assert!(!second.has_next);
        assert_eq!(second.previous_page_number, Some(1));
    }

    #[test]
    fn test_non_numeric_requests_resolve_to_first_page() {
        let paginator = Paginator::new(25, 10);
        assert_eq!(paginator.page(None).number, 1);
        assert_eq!(paginator.page(Some("abc")).number, 1);
        assert_eq!(paginator.page(Some("")).number, 1);
        assert_eq!(paginator.page(Some("2.5")).number, 1);
        assert_eq!(paginator.page(Some(" 2 ")).number, 2);
    }

    #[test]
    fn test_page_past_end_resolves_to_last() {
        let window = Paginator::new(25, 10).page(Some("99"));
        assert_eq!(window.number, 3);
        assert_eq!(window.offset, 20);
        assert_eq!(window.limit, 10);

        let huge = Paginator::new(25, 10).page(Some("99999999999999999999999"));
        assert_eq!(huge.number, 3);
    }

    #[test]
    fn test_page_below_one_resolves_to_last() {
        let paginator = Paginator::new(25, 10);
        assert_eq!(paginator.page(Some("0")).number, 3);
        assert_eq!(paginator.page(Some("-4")).number, 3);
        assert_eq!(paginator.page(Some("-99999999999999999999999")).number, 3);
    }

    #[test]
    fn test_parse_page_number() {
        assert_eq!(parse_page_number(Some("7")), Some(7));
        assert_eq!(parse_page_number(Some("+7")), Some(7));
        assert_eq!(parse_page_number(Some("-1")), Some(-1));
        assert_eq!(parse_page_number(Some("-")), None);
        assert_eq!(parse_page_number(Some("seven")), None);
        assert_eq!(parse_page_number(None), None);
    }

    #[test]
    fn test_empty_collection_has_one_empty_page() {
        let page = paginate(Vec::<u8>::new(), Some("5"), 10);
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_zero_per_page_is_treated_as_one() {
        let page = paginate(vec!['a', 'b'], Some("2"), 0);
        assert_eq!(page.items, vec!['b']);
    }

    proptest! {
        #[test]
        fn prop_page_never_exceeds_per_page(total in 0usize..200, per_page in 1u32..30, requested in proptest::option::of(-5i64..50)) {
            let items: Vec<usize> = (0..total).collect();
            let raw = requested.map(|n| n.to_string());
            let page = paginate(items, raw.as_deref(), per_page);

            prop_assert!(page.len() <= per_page as usize);
            prop_assert!(page.number >= 1 && page.number <= page.num_pages);
        }

        #[test]
        fn prop_pages_cover_every_item_once(total in 0usize..120, per_page in 1u32..20) {
            let items: Vec<usize> = (0..total).collect();
            let num_pages = Paginator::new(total as u64, per_page).num_pages();

            let mut seen = Vec::new();
            for n in 1..=num_pages {
                let page = paginate(items.clone(), Some(&n.to_string()), per_page);
                seen.extend(page.items);
            }
            prop_assert_eq!(seen, items);
        }

        #[test]
        fn prop_resolution_is_deterministic(total in 0u64..500, per_page in 1u32..50, raw in ".{0,6}") {
            let paginator = Paginator::new(total, per_page);
            prop_assert_eq!(paginator.page(Some(&raw)), paginator.page(Some(&raw)));
        }
    }
}
