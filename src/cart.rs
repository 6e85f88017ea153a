use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::models::Product;
use crate::storage::LocalStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const CART_STORAGE_KEY: &str = "shop_cart_items";

/// Client-side cart: an ordered set of product snapshots keyed by id,
/// mirrored to local storage on every change.
pub struct Cart {
    store: Arc<dyn LocalStore>,
    key: String,
    items: Mutex<Vec<Product>>,
    count: watch::Sender<usize>,
}

impl Cart {
    /// Restores the cart from storage. Unreadable or corrupt contents give an
    /// empty cart.
    pub async fn load(store: Arc<dyn LocalStore>) -> Self {
        Self::load_with_key(store, CART_STORAGE_KEY).await
    }

    pub async fn load_with_key(store: Arc<dyn LocalStore>, key: &str) -> Self {
        let items = match store.read(key).await {
            Ok(Some(raw)) => serde_json::from_str::<Vec<Product>>(&raw).unwrap_or_else(|err| {
                log_warn!("discarding corrupt cart '{key}': {err}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                log_warn!("cart '{key}' unreadable, starting empty: {err:#}");
                Vec::new()
            }
        };
        log_info!("cart loaded with {} items", items.len());

        let (count, _) = watch::channel(items.len());
        Self {
            store,
            key: key.to_string(),
            items: Mutex::new(items),
            count,
        }
    }

    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    pub async fn items(&self) -> Vec<Product> {
        self.items.lock().await.clone()
    }

    pub async fn contains(&self, id: i64) -> bool {
        self.items.lock().await.iter().any(|p| p.id == id)
    }

    /// Returns false when the product was already in the cart.
    pub async fn add(&self, product: Product) -> bool {
        let mut items = self.items.lock().await;
        if items.iter().any(|p| p.id == product.id) {
            return false;
        }
        items.push(product);
        self.commit(&items).await;
        true
    }

    /// Returns false when nothing was removed.
    pub async fn remove(&self, id: i64) -> bool {
        let mut items = self.items.lock().await;
        let before = items.len();
        items.retain(|p| p.id != id);
        if items.len() == before {
            return false;
        }
        self.commit(&items).await;
        true
    }

    /// Adds or removes; returns whether the product is in the cart afterwards.
    pub async fn toggle(&self, product: Product) -> bool {
        let mut items = self.items.lock().await;
        let present = match items.iter().position(|p| p.id == product.id) {
            Some(pos) => {
                items.remove(pos);
                false
            }
            None => {
                items.push(product);
                true
            }
        };
        self.commit(&items).await;
        present
    }

    pub async fn clear(&self) {
        let mut items = self.items.lock().await;
        items.clear();
        self.commit(&items).await;
    }

    // Called with the items lock held so writes land in mutation order.
    async fn commit(&self, items: &[Product]) {
        match serde_json::to_string(items) {
            Ok(serialized) => {
                if let Err(err) = self.store.write(&self.key, &serialized).await {
                    log_warn!("failed to persist cart '{}': {err:#}", self.key);
                }
            }
            Err(err) => log_warn!("failed to serialize cart: {err}"),
        }
        self.count.send_replace(items.len());
    }
}
