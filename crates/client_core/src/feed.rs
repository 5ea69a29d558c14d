//! Paged collection controller shared by the media feed, the album list and
//! album media grids.
//!
//! A [`FeedController`] is the only writer of its [`PagingState`]. Readers take
//! a [`FeedSnapshot`] or subscribe to the watch channel. At most one request is
//! in flight per controller; every request carries a sequence number and a
//! completion is applied only while it is still the latest one issued.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use shared::{
    domain::SortOrder,
    protocol::{AlbumListItem, MediaCategoryItem, MediaItem},
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::FetchError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_ALBUM_MEDIA_PAGE_SIZE: u32 = 50;

/// Anything a feed can hold: cloneable and identified by a stable id.
pub trait FeedItem: Clone + Send + Sync + 'static {
    fn item_id(&self) -> &str;
}

impl FeedItem for MediaItem {
    fn item_id(&self) -> &str {
        self.id.as_str()
    }
}

impl FeedItem for AlbumListItem {
    fn item_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Category and sort selection defining which server-side result set is paged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterKey {
    pub category: Option<String>,
    pub sort: SortOrder,
}

impl FilterKey {
    pub fn new(category: Option<String>, sort: SortOrder) -> Self {
        Self { category, sort }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Category slug to send, ignoring blank selections.
    pub fn category_slug(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
    }
}

/// One page of results as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_count: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, total_pages: u32) -> Self {
        Self {
            items,
            page,
            total_pages,
            total_count: None,
        }
    }

    /// Builds a page from a `(total, pageSize)` style response.
    pub fn from_total(items: Vec<T>, page: u32, total: usize, page_size: u32) -> Self {
        let page_size = page_size.max(1) as usize;
        let total_pages = total.div_ceil(page_size).max(1);
        Self {
            items,
            page,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            total_count: Some(total),
        }
    }

    pub fn with_total_count(mut self, total: usize) -> Self {
        self.total_count = Some(total);
        self
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync + 'static {
    type Item: FeedItem;

    async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
        filter: &FilterKey,
    ) -> Result<Page<Self::Item>, FetchError>;

    /// Filter categories offered for this collection. Optional.
    async fn fetch_categories(&self) -> Result<Vec<MediaCategoryItem>, FetchError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl<F> PageFetcher for Arc<F>
where
    F: PageFetcher,
{
    type Item = F::Item;

    async fn fetch_page(
        &self,
        page: u32,
        page_size: u32,
        filter: &FilterKey,
    ) -> Result<Page<Self::Item>, FetchError> {
        (**self).fetch_page(page, page_size, filter).await
    }

    async fn fetch_categories(&self) -> Result<Vec<MediaCategoryItem>, FetchError> {
        (**self).fetch_categories().await
    }
}

/// Read-only projection of a controller's paging state.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot<T> {
    pub items: Vec<T>,
    pub filter: FilterKey,
    pub categories: Vec<MediaCategoryItem>,
    pub current_page: u32,
    pub total_pages: u32,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub error_message: Option<String>,
    pub requires_unlock: bool,
    pub can_load_more: bool,
    pub has_attempted_initial_load: bool,
}

impl<T: FeedItem> FeedSnapshot<T> {
    pub fn last_item_id(&self) -> Option<&str> {
        self.items.last().map(FeedItem::item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Initial,
    Refresh,
    NextPage,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    request_id: u64,
    kind: RequestKind,
}

#[derive(Debug)]
struct Ticket {
    request_id: u64,
    kind: RequestKind,
    page: u32,
    filter: FilterKey,
}

struct PagingState<T> {
    items: Vec<T>,
    seen_ids: HashSet<String>,
    current_page: u32,
    total_pages: u32,
    total_count: Option<usize>,
    filter: FilterKey,
    categories: Vec<MediaCategoryItem>,
    in_flight: Option<InFlight>,
    latest_request: u64,
    error_message: Option<String>,
    requires_unlock: bool,
    has_attempted_initial_load: bool,
}

impl<T: FeedItem> PagingState<T> {
    fn new(filter: FilterKey) -> Self {
        Self {
            items: Vec::new(),
            seen_ids: HashSet::new(),
            current_page: 1,
            total_pages: 1,
            total_count: None,
            filter,
            categories: Vec::new(),
            in_flight: None,
            latest_request: 0,
            error_message: None,
            requires_unlock: false,
            has_attempted_initial_load: false,
        }
    }

    fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    fn has_more_pages(&self) -> bool {
        if self.current_page >= self.total_pages {
            return false;
        }
        self.total_count
            .map_or(true, |total| self.items.len() < total)
    }

    fn can_load_more(&self) -> bool {
        !self.is_loading() && self.has_more_pages()
    }

    fn reset(&mut self) {
        self.items.clear();
        self.seen_ids.clear();
        self.current_page = 1;
        self.total_pages = 1;
        self.total_count = None;
        self.error_message = None;
        self.requires_unlock = false;
    }

    fn issue(&mut self, kind: RequestKind, page: u32) -> Ticket {
        self.latest_request += 1;
        self.in_flight = Some(InFlight {
            request_id: self.latest_request,
            kind,
        });
        Ticket {
            request_id: self.latest_request,
            kind,
            page,
            filter: self.filter.clone(),
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest_request == ticket.request_id && self.filter == ticket.filter
    }

    fn apply_page(&mut self, ticket: &Ticket, page: Page<T>) {
        if page.page != ticket.page {
            debug!(
                requested = ticket.page,
                reported = page.page,
                "feed: server reported a different page number"
            );
        }

        let dropped = match ticket.kind {
            RequestKind::Initial | RequestKind::Refresh => self.replace_items(page.items),
            RequestKind::NextPage => self.append_items(page.items),
        };
        if dropped > 0 {
            debug!(dropped, page = ticket.page, "feed: skipped duplicate items");
        }

        self.current_page = ticket.page;
        self.total_pages = page.total_pages.max(1);
        self.total_count = page.total_count;
        self.error_message = None;
        self.requires_unlock = false;
    }

    fn apply_failure(&mut self, ticket: &Ticket, err: FetchError) {
        if ticket.page == 1 && err.is_forbidden() {
            info!(request_id = ticket.request_id, "feed: collection requires unlock");
            self.requires_unlock = true;
            return;
        }
        warn!(
            request_id = ticket.request_id,
            page = ticket.page,
            error = %err,
            "feed: page fetch failed"
        );
        self.error_message = Some(err.to_string());
    }

    fn replace_items(&mut self, items: Vec<T>) -> usize {
        self.items.clear();
        self.seen_ids.clear();
        self.append_items(items)
    }

    fn append_items(&mut self, items: Vec<T>) -> usize {
        let mut dropped = 0;
        for item in items {
            if self.seen_ids.insert(item.item_id().to_string()) {
                self.items.push(item);
            } else {
                dropped += 1;
            }
        }
        dropped
    }

    fn snapshot(&self) -> FeedSnapshot<T> {
        FeedSnapshot {
            items: self.items.clone(),
            filter: self.filter.clone(),
            categories: self.categories.clone(),
            current_page: self.current_page,
            total_pages: self.total_pages,
            is_loading: self.is_loading(),
            is_refreshing: matches!(
                self.in_flight,
                Some(InFlight {
                    kind: RequestKind::Refresh,
                    ..
                })
            ),
            error_message: self.error_message.clone(),
            requires_unlock: self.requires_unlock,
            can_load_more: self.can_load_more(),
            has_attempted_initial_load: self.has_attempted_initial_load,
        }
    }
}

pub struct FeedController<F: PageFetcher> {
    fetcher: F,
    page_size: u32,
    state: Mutex<PagingState<F::Item>>,
    snapshots: watch::Sender<FeedSnapshot<F::Item>>,
}

impl<F: PageFetcher> FeedController<F> {
    pub fn new(fetcher: F, page_size: u32) -> Self {
        Self::with_filter(fetcher, page_size, FilterKey::default())
    }

    pub fn with_filter(fetcher: F, page_size: u32, filter: FilterKey) -> Self {
        let state = PagingState::new(filter);
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            fetcher,
            page_size: page_size.max(1),
            state: Mutex::new(state),
            snapshots,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn snapshot(&self) -> FeedSnapshot<F::Item> {
        self.state.lock().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot<F::Item>> {
        self.snapshots.subscribe()
    }

    /// Clears the collection and loads page 1 under the current filter.
    ///
    /// Always proceeds: a request already in flight is superseded and its
    /// response will be dropped.
    pub async fn load_initial(&self) {
        self.restart(None).await;
    }

    /// Switches to `filter` and reloads from page 1.
    pub async fn apply_filters(&self, filter: FilterKey) {
        self.restart(Some(filter)).await;
    }

    /// Loads the next page when `trigger_id` is the last loaded item.
    ///
    /// Returns whether a fetch was issued. Every refusal is silent.
    pub async fn load_more_if_needed(&self, trigger_id: &str) -> bool {
        self.advance(Some(trigger_id)).await
    }

    /// Loads the next page regardless of which item became visible.
    pub async fn load_next_page_if_possible(&self) -> bool {
        self.advance(None).await
    }

    /// Re-fetches page 1 and swaps it in only once it arrives.
    ///
    /// Skipped while a first-page load is already running; supersedes an
    /// in-flight page advance. Returns whether a fetch was issued.
    pub async fn refresh(&self) -> bool {
        let ticket = {
            let mut state = self.state.lock().await;
            if let Some(in_flight) = state.in_flight {
                if in_flight.kind != RequestKind::NextPage {
                    debug!(
                        in_flight = in_flight.request_id,
                        "feed: refresh skipped, first page already loading"
                    );
                    return false;
                }
                debug!(
                    superseded = in_flight.request_id,
                    "feed: refresh supersedes page advance"
                );
            }
            state.error_message = None;
            let ticket = state.issue(RequestKind::Refresh, 1);
            self.publish(&state);
            ticket
        };

        self.run(ticket).await;
        true
    }

    async fn restart(&self, filter: Option<FilterKey>) {
        let (ticket, needs_categories) = {
            let mut state = self.state.lock().await;
            if let Some(filter) = filter {
                state.filter = filter;
            }
            state.reset();
            let ticket = state.issue(RequestKind::Initial, 1);
            self.publish(&state);
            (ticket, state.categories.is_empty())
        };
        info!(
            request_id = ticket.request_id,
            category = ticket.filter.category_slug().unwrap_or("all"),
            sort = %ticket.filter.sort,
            "feed: loading first page"
        );

        if needs_categories {
            self.load_categories().await;
        }
        self.run(ticket).await;
    }

    async fn advance(&self, trigger_id: Option<&str>) -> bool {
        let ticket = {
            let mut state = self.state.lock().await;
            if let Some(trigger_id) = trigger_id {
                match state.items.last() {
                    Some(last) if last.item_id() == trigger_id => {}
                    _ => return false,
                }
            }
            if !state.can_load_more() {
                return false;
            }
            let next_page = state.current_page + 1;
            let ticket = state.issue(RequestKind::NextPage, next_page);
            self.publish(&state);
            ticket
        };
        debug!(
            request_id = ticket.request_id,
            page = ticket.page,
            "feed: loading next page"
        );

        self.run(ticket).await;
        true
    }

    async fn load_categories(&self) {
        match self.fetcher.fetch_categories().await {
            Ok(categories) => {
                let mut state = self.state.lock().await;
                state.categories = categories;
                self.publish(&state);
            }
            Err(err) => {
                warn!(error = %err, "feed: categories unavailable, continuing without them");
            }
        }
    }

    async fn run(&self, ticket: Ticket) {
        let result = self
            .fetcher
            .fetch_page(ticket.page, self.page_size, &ticket.filter)
            .await;

        let mut state = self.state.lock().await;
        if !state.is_current(&ticket) {
            debug!(
                request_id = ticket.request_id,
                latest = state.latest_request,
                page = ticket.page,
                "feed: dropping stale response"
            );
            return;
        }

        state.in_flight = None;
        match result {
            Ok(page) => state.apply_page(&ticket, page),
            Err(err) => state.apply_failure(&ticket, err),
        }
        if matches!(ticket.kind, RequestKind::Initial | RequestKind::Refresh) {
            state.has_attempted_initial_load = true;
        }
        self.publish(&state);
    }

    fn publish(&self, state: &PagingState<F::Item>) {
        self.snapshots.send_replace(state.snapshot());
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
