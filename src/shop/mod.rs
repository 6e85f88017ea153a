//! Shop grid: paged product list, shared-link handling, cart and address.

pub mod deep_link;
pub mod location;
pub mod scroll;

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::cart::Cart;
use crate::feed::{FeedProvider, PageQuery};
use crate::messaging::{self, MessagingConfig};
use crate::models::Product;

pub use deep_link::{DeepLinkResolver, Notice, Resolution};
pub use location::{share_description, share_url, ShopLocation};
pub use scroll::{LoadOutcome, ScrollLoader, ScrollSnapshot};

struct ViewState {
    location: ShopLocation,
    selected: Option<Product>,
    notice: Option<Notice>,
}

/// One mounted shop page. Everything it starts is tied to `lifetime`;
/// responses arriving after [`ShopView::close`] are dropped.
pub struct ShopView {
    lifetime: CancellationToken,
    loader: ScrollLoader,
    resolver: DeepLinkResolver,
    cart: Arc<Cart>,
    state: Mutex<ViewState>,
}

impl ShopView {
    pub fn new(
        feed: Arc<dyn FeedProvider>,
        query: PageQuery,
        cart: Arc<Cart>,
        location: ShopLocation,
    ) -> Self {
        let lifetime = CancellationToken::new();
        Self {
            loader: ScrollLoader::new(feed.clone(), query, lifetime.clone()),
            resolver: DeepLinkResolver::new(feed, lifetime.clone()),
            lifetime,
            cart,
            state: Mutex::new(ViewState {
                location,
                selected: None,
                notice: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn loader(&self) -> &ScrollLoader {
        &self.loader
    }

    pub fn cart(&self) -> &Arc<Cart> {
        &self.cart
    }

    pub fn location(&self) -> ShopLocation {
        self.state().location.clone()
    }

    pub fn selected(&self) -> Option<Product> {
        self.state().selected.clone()
    }

    pub fn take_notice(&self) -> Option<Notice> {
        self.state().notice.take()
    }

    pub fn is_fetching_product(&self) -> bool {
        self.resolver.is_fetching()
    }

    /// Loads the first page, then handles the shared link if there is one.
    pub async fn mount(&self) -> Resolution {
        self.loader.load_initial().await;
        self.resolve_deep_link().await
    }

    pub async fn on_near_end(&self) -> LoadOutcome {
        self.loader.on_near_end().await
    }

    pub async fn resolve_deep_link(&self) -> Resolution {
        let slug = self.state().location.product_slug();
        let resolution = self.resolver.resolve(slug.as_deref(), &self.loader).await;
        match &resolution {
            Resolution::Open(product) => self.open_product(product.clone()),
            Resolution::Notice(notice) => self.state().notice = Some(notice.clone()),
            _ => {}
        }
        resolution
    }

    pub fn open_product(&self, product: Product) {
        let mut state = self.state();
        state.location.open_product(&product.product_slug);
        state.selected = Some(product);
    }

    pub fn close_product(&self) {
        let mut state = self.state();
        state.location.close_product();
        state.selected = None;
    }

    /// Messaging link for the whole cart, `None` when it is empty.
    pub async fn checkout_link(
        &self,
        config: &MessagingConfig,
        note: Option<&str>,
    ) -> Result<Option<Url>> {
        let items = self.cart.items().await;
        if items.is_empty() {
            return Ok(None);
        }
        messaging::cart_link(config, &items, note).map(Some)
    }

    pub fn close(&self) {
        self.lifetime.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.lifetime.is_cancelled()
    }
}
