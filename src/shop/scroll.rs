use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::feed::{FeedProvider, PageQuery};
use crate::models::Product;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub const FIRST_PAGE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { page: u32, count: usize },
    /// Another fetch was in flight, or the page was already loaded.
    Skipped,
    /// Nothing left to load.
    Exhausted,
    Failed,
    /// The view went away while the request was outstanding.
    Discarded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollSnapshot {
    pub items: Vec<Product>,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub initial_settled: bool,
}

#[derive(Debug)]
struct LoaderState {
    items: Vec<Product>,
    requested: BTreeSet<u32>,
    in_flight: bool,
    has_more: bool,
    error: Option<String>,
    next_page: u32,
    initial_settled: bool,
}

/// Paged product list that grows as the shopper nears the end of it.
///
/// The lock is never held across a fetch; `in_flight` keeps a second
/// trigger from overlapping the first.
pub struct ScrollLoader {
    feed: Arc<dyn FeedProvider>,
    query: PageQuery,
    lifetime: CancellationToken,
    state: Mutex<LoaderState>,
}

impl ScrollLoader {
    pub fn new(feed: Arc<dyn FeedProvider>, query: PageQuery, lifetime: CancellationToken) -> Self {
        Self {
            feed,
            query,
            lifetime,
            state: Mutex::new(LoaderState {
                items: Vec::new(),
                requested: BTreeSet::new(),
                in_flight: false,
                has_more: true,
                error: None,
                next_page: FIRST_PAGE,
                initial_settled: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoaderState> {
        lock_state(&self.state)
    }

    pub fn snapshot(&self) -> ScrollSnapshot {
        let state = self.state();
        ScrollSnapshot {
            items: state.items.clone(),
            has_more: state.has_more,
            loading: state.in_flight,
            error: state.error.clone(),
            initial_settled: state.initial_settled,
        }
    }

    pub fn items(&self) -> Vec<Product> {
        self.state().items.clone()
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<Product> {
        self.state()
            .items
            .iter()
            .find(|product| product.product_slug == slug)
            .cloned()
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state().in_flight
    }

    pub fn initial_settled(&self) -> bool {
        self.state().initial_settled
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Page the next near-end trigger will request.
    pub fn next_page(&self) -> u32 {
        self.state().next_page
    }

    pub async fn load_initial(&self) -> LoadOutcome {
        self.load_page(FIRST_PAGE, true).await
    }

    /// Fetches `page` unless a fetch is in flight or the page already loaded.
    /// A page is only marked as loaded on success, so a failed page can be
    /// requested again.
    pub async fn load_page(&self, page: u32, replace: bool) -> LoadOutcome {
        {
            let mut state = self.state();
            if state.in_flight || state.requested.contains(&page) {
                log_debug!("skipping page {page}: in flight or already loaded");
                return LoadOutcome::Skipped;
            }
            state.in_flight = true;
            state.error = None;
        }

        let mut fetch = InFlight::arm(&self.state);
        let result = self.feed.get_page(&self.query.with_page(page)).await;

        if self.lifetime.is_cancelled() {
            log_debug!("discarding page {page}: view closed");
            return LoadOutcome::Discarded;
        }

        let mut state = self.state();
        state.in_flight = false;
        fetch.disarm();
        if page == FIRST_PAGE {
            state.initial_settled = true;
        }

        match result {
            Ok(products) => {
                let count = products.len();
                if replace {
                    state.items = products;
                } else {
                    state.items.extend(products);
                }
                state.requested.insert(page);
                state.has_more = count > 0;
                state.next_page = state.next_page.max(page + 1);
                log_info!(
                    "loaded page {page} with {count} products ({} total)",
                    state.items.len()
                );
                LoadOutcome::Loaded { page, count }
            }
            Err(err) => {
                log_error!("failed to load page {page}: {err}");
                state.error = Some(err.to_string());
                LoadOutcome::Failed
            }
        }
    }

    /// Near-end-of-list signal from the viewport.
    pub async fn on_near_end(&self) -> LoadOutcome {
        let page = {
            let state = self.state();
            if !state.has_more {
                return LoadOutcome::Exhausted;
            }
            if state.in_flight {
                return LoadOutcome::Skipped;
            }
            state.next_page
        };
        self.load_page(page, false).await
    }
}

fn lock_state(state: &Mutex<LoaderState>) -> MutexGuard<'_, LoaderState> {
    // State stays consistent across a panic elsewhere; keep using it.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears `in_flight` if a fetch never reaches its bookkeeping, e.g. when the
/// caller drops the `load_page` future or the view closes mid-request.
struct InFlight<'a> {
    state: &'a Mutex<LoaderState>,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn arm(state: &'a Mutex<LoaderState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock_state(self.state).in_flight = false;
        }
    }
}
