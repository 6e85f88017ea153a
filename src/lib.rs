pub mod cart;
pub mod db;
pub mod feed;
pub mod gesture;
pub mod media;
pub mod messaging;
pub mod models;
pub mod settings;
pub mod shop;
pub mod storage;
pub mod story;
mod utils;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use cart::Cart;
use db::Database;
use feed::{HttpFeedProvider, PageQuery};
use settings::{SettingsStore, StorageBackend, StorefrontSettings};
use shop::{LoadOutcome, ScrollLoader};
use storage::{JsonFileStore, LocalStore};
use story::{Navigation, StoryController, StoryEvent, StoryOptions};

const DEFAULT_DATA_DIR: &str = ".storyfront";
// Fetch the next page once the viewer is this close to the end.
const PREFETCH_DISTANCE: usize = 2;

pub fn run() -> Result<()> {
    let data_dir = env::var_os("STOREFRONT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    let settings = settings_store.settings()?;

    // RUST_LOG, when set, wins over the default level.
    env_logger::Builder::new()
        .filter_level(if settings.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    info!("Storyfront starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(play_feed(settings, data_dir))
}

async fn play_feed(settings: StorefrontSettings, data_dir: PathBuf) -> Result<()> {
    let store: Arc<dyn LocalStore> = match settings.storage_backend {
        StorageBackend::Sqlite => Arc::new(Database::new(data_dir.join("storyfront.sqlite3"))?),
        StorageBackend::Json => Arc::new(JsonFileStore::new(data_dir.join("local_store.json"))?),
    };

    let cart = Cart::load(store.clone()).await;
    info!("Cart holds {} items", cart.count());

    let feed = Arc::new(HttpFeedProvider::from_settings(&settings)?);
    if !feed.is_configured() {
        warn!("Catalog API base URL is not configured; set STOREFRONT_API_BASE_URL");
    }

    let lifetime = CancellationToken::new();
    let loader = ScrollLoader::new(feed, PageQuery::from_settings(&settings), lifetime.clone());

    let controller = StoryController::new(StoryOptions {
        duration: settings.autoplay_duration(),
        autoplay: settings.autoplay,
        storage_key: settings.story_storage_key.clone(),
        store: Some(store),
        ..StoryOptions::default()
    });
    let mut events = controller.subscribe();

    if loader.load_initial().await == LoadOutcome::Failed {
        error!(
            "Initial catalog page failed: {}",
            loader.error().unwrap_or_default()
        );
    }
    controller.set_products(loader.items()).await;
    if let Some((index, product)) = current_story(&controller).await {
        announce(&settings, index, &product);
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Ctrl-C received, stopping playback");
                break;
            }
            event = events.recv() => match event {
                Ok(StoryEvent::IndexChanged { index }) => {
                    if let Some(product) = controller.current_product().await {
                        announce(&settings, index, &product);
                    }
                    if index + PREFETCH_DISTANCE >= loader.items().len() {
                        grow_feed(&loader, &controller).await;
                    }
                }
                Ok(StoryEvent::SequenceEnded { .. }) => {
                    let grew = grow_feed(&loader, &controller).await;
                    if !grew || !matches!(controller.go_to_next().await, Navigation::Moved(_)) {
                        info!("End of feed, looping back to the first story");
                        controller.go_to_index(0).await;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Story event stream lagged by {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    lifetime.cancel();
    controller.shutdown().await;
    info!("Storyfront stopped");
    Ok(())
}

// Pulls the next catalog page into the story sequence. Returns true when new
// products arrived.
async fn grow_feed(loader: &ScrollLoader, controller: &StoryController) -> bool {
    match loader.on_near_end().await {
        LoadOutcome::Loaded { count, .. } if count > 0 => {
            controller.set_products(loader.items()).await;
            true
        }
        _ => false,
    }
}

// Position and product on screen. The index may have been restored from a
// previous run, so it is read back rather than assumed to be 0.
async fn current_story(controller: &StoryController) -> Option<(usize, models::Product)> {
    let snapshot = controller.snapshot().await;
    snapshot
        .product
        .map(|product| (snapshot.state.current_index, product))
}

fn announce(settings: &StorefrontSettings, index: usize, product: &models::Product) {
    let media_url = product
        .media_link()
        .map(|link| media::display_url(link, product.asset_type))
        .unwrap_or_default();
    info!("Story {}: {} {}", index + 1, product.product_name, media_url);

    match messaging::product_link(&settings.messaging, product, None) {
        Ok(url) => log::debug!("Order link for {}: {}", product.product_slug, url),
        Err(err) => warn!("Failed to build order link for {}: {err:#}", product.product_slug),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::sample_products;
    use crate::storage::testing::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn opening_story_reports_the_restored_position() {
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::with_entry("story_index", "3"));
        let controller = StoryController::new(StoryOptions {
            storage_key: Some("story_index".into()),
            store: Some(store),
            ..StoryOptions::default()
        });
        assert!(current_story(&controller).await.is_none());

        controller.set_products(sample_products(5)).await;
        let (index, product) = current_story(&controller).await.unwrap();
        assert_eq!(index, 3);
        assert_eq!(product.id, sample_products(5)[3].id);
        controller.shutdown().await;
    }
}
