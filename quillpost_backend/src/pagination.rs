//! Fixed-size slicing of ordered collections for the list views.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-indexed number of this page after clamping.
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Maps the raw `page` query value to a page number. Absent or
/// unparsable values fall back to the first page.
pub fn page_number(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&number| number >= 1)
        .unwrap_or(1)
}

/// Slices `items` into the requested page. Out-of-range requests clamp
/// to the nearest valid page instead of erroring; an empty collection
/// still yields one (empty) page.
pub fn paginate<T>(items: Vec<T>, requested: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let number = requested.clamp(1, total_pages);
    let items: Vec<T> = items
        .into_iter()
        .skip((number - 1) * page_size)
        .take(page_size)
        .collect();
    Page {
        items,
        number,
        total_pages,
        total_items,
        has_previous: number > 1,
        has_next: number < total_pages,
    }
}
