//! Product catalog access.
//!
//! The shop and the story feed only see [`FeedProvider`]; the HTTP client in
//! [`http`] is one implementation of it.

pub mod http;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::Product;
use crate::settings::StorefrontSettings;

pub use http::HttpFeedProvider;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("catalog API base URL is not configured")]
    NotConfigured,

    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog responded with HTTP {0}")]
    Status(u16),

    #[error("catalog response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("catalog response has an unexpected shape: {0}")]
    InvalidPayload(String),
}

/// One listing request. Page numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageQuery {
    pub limit: u32,
    pub page: u32,
    pub order_by: String,
    pub order: String,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            page: 1,
            order_by: "datetime".into(),
            order: "desc".into(),
        }
    }
}

impl PageQuery {
    pub fn from_settings(settings: &StorefrontSettings) -> Self {
        Self {
            limit: settings.page_limit,
            page: 1,
            order_by: settings.order_by.clone(),
            order: settings.order.clone(),
        }
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }
}

#[async_trait]
pub trait FeedProvider: Send + Sync {
    /// An empty page means the catalog is exhausted.
    async fn get_page(&self, query: &PageQuery) -> Result<Vec<Product>, FeedError>;

    /// `Ok(None)` when no displayable product has this slug.
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, FeedError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{FeedError, FeedProvider, PageQuery};
    use crate::models::Product;

    /// Scripted catalog: pages are served from a queue of responses keyed by
    /// page number, slug lookups from a map.
    #[derive(Default)]
    pub struct FakeFeed {
        pages: Mutex<HashMap<u32, VecDeque<Result<Vec<Product>, FeedError>>>>,
        slugs: Mutex<HashMap<String, Result<Option<Product>, FeedError>>>,
        page_calls: Mutex<Vec<u32>>,
        slug_calls: AtomicUsize,
    }

    impl FakeFeed {
        pub fn with_page(self, page: u32, products: Vec<Product>) -> Self {
            self.push_page(page, Ok(products));
            self
        }

        pub fn with_failing_page(self, page: u32, status: u16) -> Self {
            self.push_page(page, Err(FeedError::Status(status)));
            self
        }

        pub fn with_slug(self, slug: &str, result: Result<Option<Product>, FeedError>) -> Self {
            self.slugs.lock().unwrap().insert(slug.to_string(), result);
            self
        }

        pub fn push_page(&self, page: u32, result: Result<Vec<Product>, FeedError>) {
            self.pages
                .lock()
                .unwrap()
                .entry(page)
                .or_default()
                .push_back(result);
        }

        pub fn page_calls(&self) -> Vec<u32> {
            self.page_calls.lock().unwrap().clone()
        }

        pub fn slug_calls(&self) -> usize {
            self.slug_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedProvider for FakeFeed {
        async fn get_page(&self, query: &PageQuery) -> Result<Vec<Product>, FeedError> {
            // Behave like a real request: give other tasks a turn.
            tokio::task::yield_now().await;
            self.page_calls.lock().unwrap().push(query.page);
            self.pages
                .lock()
                .unwrap()
                .get_mut(&query.page)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, FeedError> {
            tokio::task::yield_now().await;
            self.slug_calls.fetch_add(1, Ordering::SeqCst);
            match self.slugs.lock().unwrap().remove(slug) {
                Some(result) => result,
                None => Ok(None),
            }
        }
    }
}
