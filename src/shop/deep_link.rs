use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::scroll::ScrollLoader;
use crate::feed::FeedProvider;
use crate::models::Product;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// User-visible toast raised by a shared link that cannot be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    NotFound { slug: String },
    LoadFailed { slug: String },
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::NotFound { .. } => "Produk tidak ditemukan",
            Notice::LoadFailed { .. } => "Gagal memuat produk",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::LoadFailed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The first page has not completed yet; ask again later.
    Pending,
    /// This view already handled its link.
    AlreadyResolved,
    NoLink,
    Open(Product),
    Notice(Notice),
    /// The view closed while the lookup was outstanding.
    Discarded,
}

/// Opens the product named by a shared link, once per shop view.
pub struct DeepLinkResolver {
    feed: Arc<dyn FeedProvider>,
    lifetime: CancellationToken,
    resolved: AtomicBool,
    fetching: AtomicBool,
}

impl DeepLinkResolver {
    pub fn new(feed: Arc<dyn FeedProvider>, lifetime: CancellationToken) -> Self {
        Self {
            feed,
            lifetime,
            resolved: AtomicBool::new(false),
            fetching: AtomicBool::new(false),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }

    /// True while the out-of-band lookup is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::SeqCst)
    }

    pub async fn resolve(&self, slug: Option<&str>, loader: &ScrollLoader) -> Resolution {
        if self.is_resolved() {
            return Resolution::AlreadyResolved;
        }
        if !loader.initial_settled() || loader.is_loading() {
            return Resolution::Pending;
        }
        if self.resolved.swap(true, Ordering::SeqCst) {
            return Resolution::AlreadyResolved;
        }

        let Some(slug) = slug.map(str::trim).filter(|slug| !slug.is_empty()) else {
            return Resolution::NoLink;
        };

        if let Some(product) = loader.find_by_slug(slug) {
            log_info!("deep link {slug:?} matched a loaded product");
            return Resolution::Open(product);
        }

        let mut lookup = Lookup::start(self);
        let result = self.feed.get_by_slug(slug).await;
        lookup.finish();

        if self.lifetime.is_cancelled() {
            return Resolution::Discarded;
        }

        match result {
            Ok(Some(product)) => {
                log_info!("deep link {slug:?} fetched from catalog");
                Resolution::Open(product)
            }
            Ok(None) => Resolution::Notice(Notice::NotFound {
                slug: slug.to_string(),
            }),
            Err(err) => {
                log_error!("deep link {slug:?} lookup failed: {err}");
                Resolution::Notice(Notice::LoadFailed {
                    slug: slug.to_string(),
                })
            }
        }
    }
}

/// Marks the out-of-band lookup. If the lookup future is dropped before the
/// catalog answers, the link is released so a later `resolve` can retry it.
struct Lookup<'a> {
    resolver: &'a DeepLinkResolver,
    finished: bool,
}

impl<'a> Lookup<'a> {
    fn start(resolver: &'a DeepLinkResolver) -> Self {
        resolver.fetching.store(true, Ordering::SeqCst);
        Self {
            resolver,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.resolver.fetching.store(false, Ordering::SeqCst);
    }
}

impl Drop for Lookup<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.resolver.fetching.store(false, Ordering::SeqCst);
            self.resolver.resolved.store(false, Ordering::SeqCst);
        }
    }
}
