//! Cursor-driven infinite list.
//!
//! A [`Paginator`] owns the aggregate of every page fetched so far for one
//! list view. The server marks the position of each item with an opaque cursor;
//! the cursor of the last item of a page is the position the next page is
//! requested from.

use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use shared::protocol::{CursorItem, PageResponse};
use tracing::{debug, info, warn};

use crate::error::ClientResult;

#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: CursorItem + Clone + Send + Sync + 'static;
    type Query: Clone + Send + Sync + 'static;

    async fn fetch_page(
        &self,
        query: &Self::Query,
        cursor: Option<&str>,
    ) -> ClientResult<PageResponse<Self::Item>>;
}

/// One validated page. `cursor` is `None` exactly when `has_next` is false.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
    pub cursor: Option<String>,
}

impl<T: CursorItem> Page<T> {
    pub fn from_response(response: PageResponse<T>) -> Self {
        let cursor = if response.has_next {
            let cursor = response
                .content
                .last()
                .and_then(|item| item.cursor())
                .map(str::to_owned);
            if cursor.is_none() {
                warn!("paginator: last item carries no cursor; stopping pagination");
            }
            cursor
        } else {
            None
        };

        Self {
            has_next: cursor.is_some(),
            cursor,
            items: response.content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateList<T: CursorItem> {
    items: Vec<T>,
    keys: HashSet<T::Key>,
    has_next: bool,
    next_cursor: Option<String>,
}

impl<T: CursorItem + Clone> AggregateList<T> {
    /// Empty aggregate whose next fetch is the first page.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            keys: HashSet::new(),
            has_next: true,
            next_cursor: None,
        }
    }

    /// Appends in received order and returns the items that were new.
    pub fn append(&mut self, page: Page<T>) -> Vec<T> {
        self.has_next = page.has_next;
        self.next_cursor = page.cursor;

        let mut appended = Vec::with_capacity(page.items.len());
        for item in page.items {
            let key = item.item_key();
            if !self.keys.insert(key) {
                debug!(?key, "paginator: duplicate item dropped");
                continue;
            }
            appended.push(item.clone());
            self.items.push(item);
        }
        appended
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }
}

impl<T: CursorItem + Clone> Default for AggregateList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Exhausted,
    Closed,
    /// The result belonged to a list that was refreshed, reset, or closed meanwhile.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<T> {
    Appended(Vec<T>),
    Replaced(Vec<T>),
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct PageSnapshot<T> {
    pub items: Vec<T>,
    pub has_next: bool,
    pub next_cursor: Option<String>,
    pub loading: bool,
}

struct PaginatorState<T: CursorItem, Q> {
    aggregate: AggregateList<T>,
    query: Q,
    generation: u64,
    /// Ticket of the fetch currently allowed to complete.
    in_flight: Option<u64>,
    next_fetch: u64,
    closed: bool,
}

impl<T: CursorItem, Q> PaginatorState<T, Q> {
    fn start_fetch(&mut self) -> u64 {
        self.next_fetch += 1;
        self.in_flight = Some(self.next_fetch);
        self.next_fetch
    }

    fn finish_fetch(&mut self, ticket: u64) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
    }
}

type SharedState<S> =
    Mutex<PaginatorState<<S as PageSource>::Item, <S as PageSource>::Query>>;

/// Clears the in-flight mark of one fetch, also when the caller drops the
/// future mid-request.
struct FetchGuard<'a, S: PageSource> {
    state: &'a SharedState<S>,
    ticket: u64,
}

impl<S: PageSource> Drop for FetchGuard<'_, S> {
    fn drop(&mut self) {
        lock(self.state).finish_fetch(self.ticket);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Paginator<S: PageSource> {
    source: S,
    label: &'static str,
    state: SharedState<S>,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(label: &'static str, source: S, query: S::Query) -> Self {
        Self {
            source,
            label,
            state: Mutex::new(PaginatorState {
                aggregate: AggregateList::new(),
                query,
                generation: 0,
                in_flight: None,
                next_fetch: 0,
                closed: false,
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Fetches the page after the last one held.
    ///
    /// Calls made while another fetch is pending are dropped, not queued.
    pub async fn load_next(&self) -> ClientResult<LoadOutcome<S::Item>> {
        let (guard, generation, cursor, query) = {
            let mut state = lock(&self.state);
            if state.closed {
                return Ok(LoadOutcome::Skipped(SkipReason::Closed));
            }
            if state.in_flight.is_some() {
                debug!(list = self.label, "paginator: load skipped, fetch pending");
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            }
            if !state.aggregate.has_next() {
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            let guard = FetchGuard::<S> {
                state: &self.state,
                ticket: state.start_fetch(),
            };
            (
                guard,
                state.generation,
                state.aggregate.next_cursor().map(str::to_owned),
                state.query.clone(),
            )
        };

        let result = self.source.fetch_page(&query, cursor.as_deref()).await;

        let mut state = lock(&self.state);
        state.finish_fetch(guard.ticket);
        if state.closed || state.generation != generation {
            debug!(list = self.label, "paginator: stale page discarded");
            return Ok(LoadOutcome::Skipped(SkipReason::Superseded));
        }

        match result {
            Ok(response) => {
                let appended = state.aggregate.append(Page::from_response(response));
                info!(
                    list = self.label,
                    appended = appended.len(),
                    total = state.aggregate.items().len(),
                    has_next = state.aggregate.has_next(),
                    "paginator: page appended"
                );
                Ok(LoadOutcome::Appended(appended))
            }
            Err(err) => {
                warn!(list = self.label, error = %err, "paginator: page fetch failed");
                Err(err)
            }
        }
    }

    /// Refetches the first page; on success the aggregate is exactly that page.
    ///
    /// Any fetch still pending from before the refresh becomes inert. On failure
    /// the previously loaded items stay visible.
    pub async fn refresh(&self) -> ClientResult<LoadOutcome<S::Item>> {
        let (guard, generation, query) = {
            let mut state = lock(&self.state);
            if state.closed {
                return Ok(LoadOutcome::Skipped(SkipReason::Closed));
            }
            state.generation += 1;
            let guard = FetchGuard::<S> {
                state: &self.state,
                ticket: state.start_fetch(),
            };
            (guard, state.generation, state.query.clone())
        };

        let result = self.source.fetch_page(&query, None).await;

        let mut state = lock(&self.state);
        state.finish_fetch(guard.ticket);
        if state.closed || state.generation != generation {
            debug!(list = self.label, "paginator: stale refresh discarded");
            return Ok(LoadOutcome::Skipped(SkipReason::Superseded));
        }

        match result {
            Ok(response) => {
                let mut aggregate = AggregateList::new();
                let items = aggregate.append(Page::from_response(response));
                state.aggregate = aggregate;
                info!(
                    list = self.label,
                    total = items.len(),
                    has_next = state.aggregate.has_next(),
                    "paginator: refreshed"
                );
                Ok(LoadOutcome::Replaced(items))
            }
            Err(err) => {
                warn!(list = self.label, error = %err, "paginator: refresh failed");
                Err(err)
            }
        }
    }

    /// Replaces the filter/sort parameters and reloads from the first page.
    pub async fn set_query(&self, query: S::Query) -> ClientResult<LoadOutcome<S::Item>> {
        lock(&self.state).query = query;
        self.refresh().await
    }

    /// Drops everything held; the next `load_next` starts from the first page.
    pub async fn reset(&self) {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.in_flight = None;
        state.aggregate = AggregateList::new();
    }

    /// Marks the owning view as gone. Completions arriving later are ignored.
    pub async fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        state.generation += 1;
        state.in_flight = None;
    }

    pub async fn query(&self) -> S::Query {
        lock(&self.state).query.clone()
    }

    pub async fn items(&self) -> Vec<S::Item> {
        lock(&self.state).aggregate.items().to_vec()
    }

    pub async fn snapshot(&self) -> PageSnapshot<S::Item> {
        let state = lock(&self.state);
        PageSnapshot {
            items: state.aggregate.items().to_vec(),
            has_next: state.aggregate.has_next(),
            next_cursor: state.aggregate.next_cursor().map(str::to_owned),
            loading: state.in_flight.is_some(),
        }
    }
}

#[cfg(test)]
#[path = "tests/paginator_tests.rs"]
mod tests;
