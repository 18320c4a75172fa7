//! Cursor paginated list store.
//!
//! A [PageStore] keeps the loaded pages of one listing. Loads never run
//! against each other: the newest first-page load wins, and at most one
//! next-page load is in flight per filter generation.

mod placeholder;

pub use placeholder::PLACEHOLDER_COUNT;

use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::api::{
    types::{Filters, Item, ItemId, Page},
    FetchError, PageSource,
};

/// Store options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// show placeholder items when the server is unreachable
    pub demo_fallback: bool,
}

/// Result of a load that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// page applied to the store
    Loaded,
    /// server unreachable, placeholder items applied
    Placeholder,
    /// a newer first-page load started meanwhile, result dropped
    Superseded,
    /// nothing to do: no more pages, or a load already in flight
    Skipped,
}

/// Copy of the store state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// loaded items, newest first
    pub items: Vec<Item>,
    /// cursor of next page
    pub next_cursor: Option<String>,
    /// is there a next page
    pub has_more: bool,
    /// total count reported by server, plus live merged items
    pub total_count: u64,
    /// filters of the loaded pages
    pub filters: Filters,
    /// a first-page load is in flight
    pub loading: bool,
    /// a next-page load is in flight
    pub loading_more: bool,
    /// items are placeholders
    pub placeholder: bool,
    /// message of last failed load, cleared by a successful one
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    page: Page,
    ids: HashSet<ItemId>,
    filters: Filters,
    generation: u64,
    loading: bool,
    next_in_flight: Option<u64>,
    placeholder: bool,
    last_error: Option<String>,
}

impl State {
    fn replace(&mut self, page: Page, placeholder: bool) {
        self.ids = page.items.iter().map(|item| item.id().clone()).collect();
        self.page = page;
        self.placeholder = placeholder;
    }

    fn append(&mut self, page: Page) {
        for item in page.items {
            if self.ids.insert(item.id().clone()) {
                self.page.items.push(item);
            } else {
                log::debug!("Skip duplicated item {} in next page", item.id());
            }
        }
        self.page.next_cursor = page.next_cursor;
        self.page.has_more = page.has_more;
        self.page.total_count = page.total_count;
    }
}

/// Loaded pages of one listing, see [module docs](self).
#[derive(Debug)]
pub struct PageStore<S> {
    source: S,
    config: StoreConfig,
    state: Mutex<State>,
}

impl<S: PageSource> PageStore<S> {
    /// Create an empty store over `source`
    pub fn new(source: S, config: StoreConfig) -> Self {
        Self {
            source,
            config,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load page one with `filters`, replacing all loaded items.
    ///
    /// If another first-page load starts before this one resolves, this
    /// result is dropped and [LoadOutcome::Superseded] returned. On error the
    /// loaded items, their filters and cursor are kept, unless placeholders
    /// are enabled and the server is unreachable.
    pub async fn load_first_page(&self, filters: Filters) -> Result<LoadOutcome, S::Error> {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.loading = true;
            state.generation
        };

        log::debug!("Loading first page, generation {}", generation);

        let result = self.source.fetch_page(&filters, None).await;

        let mut state = self.lock();

        if state.generation != generation {
            log::debug!("Drop superseded first page of generation {}", generation);
            return Ok(LoadOutcome::Superseded);
        }

        state.loading = false;

        match result {
            Ok(page) => {
                log::trace!("First page loaded with {} items", page.items.len());
                state.filters = filters;
                state.replace(page, false);
                state.last_error = None;
                Ok(LoadOutcome::Loaded)
            }
            Err(err) if self.config.demo_fallback && err.is_unreachable() => {
                log::warn!("Server unreachable, showing placeholder items: {}", err);
                state.filters = filters;
                state.replace(placeholder::page(chrono::Utc::now()), true);
                state.last_error = Some(err.to_string());
                Ok(LoadOutcome::Placeholder)
            }
            Err(err) => {
                log::warn!("Load first page failed: {}", err);
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Load the page after the current cursor and append it.
    ///
    /// Skipped when there is no next page, a first-page load is running, or
    /// a next-page load is already in flight for the current filters.
    pub async fn load_next_page(&self) -> Result<LoadOutcome, S::Error> {
        let (generation, filters, cursor) = {
            let mut state = self.lock();

            if state.loading || state.next_in_flight == Some(state.generation) {
                return Ok(LoadOutcome::Skipped);
            }

            let cursor = match (&state.page.next_cursor, state.page.has_more) {
                (Some(cursor), true) => cursor.clone(),
                _ => return Ok(LoadOutcome::Skipped),
            };

            state.next_in_flight = Some(state.generation);
            (state.generation, state.filters.clone(), cursor)
        };

        log::debug!("Loading next page, generation {}", generation);

        let result = self.source.fetch_page(&filters, Some(&cursor)).await;

        let mut state = self.lock();

        if state.next_in_flight == Some(generation) {
            state.next_in_flight = None;
        }

        if state.generation != generation {
            log::debug!("Drop next page of stale generation {}", generation);
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(page) => {
                state.append(page);
                state.last_error = None;
                Ok(LoadOutcome::Loaded)
            }
            Err(err) => {
                log::warn!("Load next page failed: {}", err);
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Reload page one with current filters
    pub async fn refresh(&self) -> Result<LoadOutcome, S::Error> {
        let filters = self.lock().filters.clone();
        self.load_first_page(filters).await
    }

    /// Set one filter and reload page one
    pub async fn set_filter<K, V>(&self, key: K, value: V) -> Result<LoadOutcome, S::Error>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let filters = self.lock().filters.clone().with(key, value);
        self.load_first_page(filters).await
    }

    /// Insert a pushed item at head, returns `false` if its id is already loaded.
    pub fn merge_live_item(&self, item: Item) -> bool {
        let mut state = self.lock();

        if !state.ids.insert(item.id().clone()) {
            log::trace!("Live item {} already loaded", item.id());
            return false;
        }

        state.page.items.insert(0, item);
        state.page.total_count += 1;
        true
    }

    /// Copy of current state
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            items: state.page.items.clone(),
            next_cursor: state.page.next_cursor.clone(),
            has_more: state.page.has_more,
            total_count: state.page.total_count,
            filters: state.filters.clone(),
            loading: state.loading,
            loading_more: state.next_in_flight == Some(state.generation),
            placeholder: state.placeholder,
            last_error: state.last_error.clone(),
        }
    }

    /// Copy of loaded items
    pub fn items(&self) -> Vec<Item> {
        self.lock().page.items.clone()
    }

    /// Current filters
    pub fn filters(&self) -> Filters {
        self.lock().filters.clone()
    }

    /// The page source
    pub fn source(&self) -> &S {
        &self.source
    }
}
