use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetcher::{self, BookSource, HttpBookSource, HttpSettings, RequestLimiter};
use crate::merge::{self, CatalogItem};
use crate::paginator::{PageMarker, Paginator, PAGE_SIZE};
use crate::query::{self, FilterState, DEFAULT_QUERY_LIMIT};
use crate::sorter::{self, SortKey};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

#[derive(Clone, Debug)]
pub struct Options {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
    pub limit: Option<u32>,
    pub rate: u32,
    pub sort: SortKey,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 10,
            proxy: None,
            limit: Some(DEFAULT_QUERY_LIMIT),
            rate: 0,
            sort: SortKey::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error, status: {status}")]
    Http { status: u16 },

    #[error("request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response body: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}

impl CatalogError {
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            CatalogError::Http { .. } | CatalogError::Transport { .. } | CatalogError::Decode { .. }
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { generation: u64, total_items: usize },
    /// A newer load was issued while this one was in flight; its result was dropped.
    Stale { generation: u64 },
}

#[derive(Debug)]
pub struct PageView<'a> {
    pub items: &'a [CatalogItem],
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub first_index: usize,
    pub last_index: usize,
    pub markers: Vec<PageMarker>,
    pub sort: SortKey,
    pub filters: &'a FilterState,
}

impl PageView<'_> {
    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }

    pub fn to_snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            current_page: self.current_page,
            total_pages: self.total_pages,
            total_items: self.total_items,
            first_index: self.first_index,
            last_index: self.last_index,
            sort: self.sort,
            markers: self.markers.clone(),
            items: self.items.to_vec(),
            filters: self.filters.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PageSnapshot {
    #[serde(rename = "page")]
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    #[serde(skip)]
    pub first_index: usize,
    #[serde(skip)]
    pub last_index: usize,
    pub sort: SortKey,
    #[serde(skip)]
    pub markers: Vec<PageMarker>,
    pub items: Vec<CatalogItem>,
    #[serde(skip)]
    pub filters: FilterState,
}

impl PageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }
}

pub type RenderFn = Box<dyn Fn(&PageView<'_>) + Send + Sync>;

#[derive(Debug, Default)]
struct PipelineState {
    items: Vec<CatalogItem>,
    filters: FilterState,
    sort: SortKey,
    paginator: Paginator,
}

impl PipelineState {
    fn view(&self) -> PageView<'_> {
        let (start, end) = self.paginator.bounds();
        let total_items = self.items.len();
        PageView {
            items: &self.items[start..end],
            current_page: self.paginator.current(),
            total_pages: self.paginator.total_pages(),
            total_items,
            first_index: if total_items == 0 { 0 } else { start + 1 },
            last_index: end,
            markers: self.paginator.markers(),
            sort: self.sort,
            filters: &self.filters,
        }
    }
}

/// The catalog pipeline: resolve filters, fetch, merge, sort, cache, page.
///
/// Every state change ends in a call to the render callback, made while the
/// catalog's state lock is held. The callback must not call back into the
/// catalog.
pub struct Catalog<S: BookSource> {
    source: S,
    limit: Option<u32>,
    limiter: Option<RequestLimiter>,
    generation: AtomicU64,
    state: Mutex<PipelineState>,
    render: RenderFn,
}

impl Catalog<HttpBookSource> {
    pub fn new<F>(options: Options, render: F) -> Result<Self, CatalogError>
    where
        F: Fn(&PageView<'_>) + Send + Sync + 'static,
    {
        let source = HttpBookSource::new(&HttpSettings {
            base_url: options.base_url.clone(),
            timeout_seconds: options.timeout_seconds,
            proxy: options.proxy.clone(),
        })?;
        Ok(Self::with_source(source, &options, render))
    }
}

impl<S: BookSource> Catalog<S> {
    pub fn with_source<F>(source: S, options: &Options, render: F) -> Self
    where
        F: Fn(&PageView<'_>) + Send + Sync + 'static,
    {
        let state = PipelineState {
            sort: options.sort,
            paginator: Paginator::new(PAGE_SIZE),
            ..Default::default()
        };
        Self {
            source,
            limit: options.limit,
            limiter: fetcher::request_limiter(options.rate),
            generation: AtomicU64::new(0),
            state: Mutex::new(state),
            render: Box::new(render),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// If another load is issued before this one finishes, this one's result
    /// is discarded and [`LoadOutcome::Stale`] returned. Fetch errors abort
    /// the cycle and leave the previous catalog in place.
    pub async fn load(&self, filters: FilterState) -> Result<LoadOutcome, CatalogError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let queries = query::resolve(&filters, self.limit);
        debug!(generation, queries = queries.len(), "starting catalog load");

        let raw = fetcher::fetch_all(&self.source, &queries, self.limiter.as_ref()).await?;
        if !self.is_latest(generation) {
            warn!(generation, "discarding stale catalog load");
            return Ok(LoadOutcome::Stale { generation });
        }

        let (mut items, stats) = merge::merge_records(raw);

        let mut state = self.lock_state();
        if !self.is_latest(generation) {
            warn!(generation, "discarding stale catalog load");
            return Ok(LoadOutcome::Stale { generation });
        }
        sorter::sort_in_place(&mut items, state.sort);
        let total_items = items.len();
        state.items = items;
        state.filters = filters;
        state.paginator.reset(total_items);
        (self.render)(&state.view());

        info!(
            generation,
            total_items,
            skipped = stats.skipped,
            grades = %state.filters.grades_summary(),
            "catalog loaded"
        );
        Ok(LoadOutcome::Applied {
            generation,
            total_items,
        })
    }

    pub async fn clear(&self) -> Result<LoadOutcome, CatalogError> {
        self.load(FilterState::default()).await
    }

    pub fn set_sort(&self, sort: SortKey) {
        let mut state = self.lock_state();
        state.sort = sort;
        sorter::sort_in_place(&mut state.items, sort);
        let len = state.items.len();
        state.paginator.reset(len);
        debug!(%sort, "catalog re-sorted");
        (self.render)(&state.view());
    }

    pub fn go_to_page(&self, page: usize) -> bool {
        let mut state = self.lock_state();
        if !state.paginator.go_to(page) {
            debug!(page, "ignoring out-of-range page request");
            return false;
        }
        (self.render)(&state.view());
        true
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.lock_state().view().to_snapshot()
    }

    pub fn sort(&self) -> SortKey {
        self.lock_state().sort
    }

    pub fn filters(&self) -> FilterState {
        self.lock_state().filters.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
