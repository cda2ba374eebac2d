use serde::{Serialize, Serializer};

pub const PAGE_SIZE: usize = 20;

pub const MAX_VISIBLE_PAGES: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageMarker {
    Page(usize),
    Ellipsis,
}

impl Serialize for PageMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageMarker::Page(n) => serializer.serialize_u64(*n as u64),
            PageMarker::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

pub fn page_bounds(len: usize, page_size: usize, page: usize) -> (usize, usize) {
    let start = page.saturating_sub(1).saturating_mul(page_size).min(len);
    let end = start.saturating_add(page_size).min(len);
    (start, end)
}

pub fn page_markers(current: usize, total: usize) -> Vec<PageMarker> {
    if total == 0 {
        return Vec::new();
    }
    if total <= MAX_VISIBLE_PAGES {
        return (1..=total).map(PageMarker::Page).collect();
    }
    let current = current.clamp(1, total);
    let mut out = vec![PageMarker::Page(1)];
    if current > 3 {
        out.push(PageMarker::Ellipsis);
    }
    let start = current.saturating_sub(1).max(2);
    let end = (current + 1).min(total - 1);
    out.extend((start..=end).map(PageMarker::Page));
    if current + 2 < total {
        out.push(PageMarker::Ellipsis);
    }
    out.push(PageMarker::Page(total));
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    current: usize,
    len: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current: 1,
            len: 0,
        }
    }

    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.current = 1;
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total_pages(&self) -> usize {
        page_count(self.len, self.page_size)
    }

    pub fn go_to(&mut self, page: usize) -> bool {
        if page < 1 || page > self.total_pages() {
            return false;
        }
        self.current = page;
        true
    }

    pub fn bounds(&self) -> (usize, usize) {
        page_bounds(self.len, self.page_size, self.current)
    }

    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let (start, end) = page_bounds(items.len(), self.page_size, self.current);
        &items[start..end]
    }

    pub fn markers(&self) -> Vec<PageMarker> {
        page_markers(self.current, self.total_pages())
    }
}
