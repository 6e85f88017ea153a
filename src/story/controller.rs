use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{models::Product, storage::LocalStore};

use super::{
    clamp_index, map_progress, Navigation, ProgressIndicator, StoryIntent, StoryPhase,
    StoryState, Tick, DEFAULT_STORY_DURATION_MS,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);
const EVENT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct StoryOptions {
    pub duration: Duration,
    pub autoplay: bool,
    /// Key under which the last viewed index is remembered. `None` disables
    /// persistence.
    pub storage_key: Option<String>,
    pub store: Option<Arc<dyn LocalStore>>,
    pub tick_interval: Duration,
}

impl Default for StoryOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(DEFAULT_STORY_DURATION_MS),
            autoplay: true,
            storage_key: None,
            store: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySnapshot {
    pub session_id: String,
    pub phase: StoryPhase,
    pub state: StoryState,
    pub product: Option<Product>,
    pub indicator: ProgressIndicator,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoryEvent {
    IndexChanged { index: usize },
    Progress { index: usize, percent: f64 },
    /// `goToNext` was requested on the last story.
    SequenceEnded { index: usize },
    PlaybackChanged { phase: StoryPhase },
}

struct IndexPersistence {
    key: String,
    store: Arc<dyn LocalStore>,
}

impl IndexPersistence {
    async fn load(&self) -> Option<i64> {
        match self.store.read(&self.key).await {
            Ok(Some(raw)) => raw.trim().parse::<i64>().ok(),
            Ok(None) => None,
            Err(err) => {
                log_warn!("ignoring unreadable story index '{}': {err:#}", self.key);
                None
            }
        }
    }

    async fn save(&self, index: usize) {
        if let Err(err) = self.store.write(&self.key, &index.to_string()).await {
            log_warn!("failed to persist story index '{}': {err:#}", self.key);
        }
    }
}

struct StorySession {
    state: StoryState,
    products: Vec<Product>,
    restored: bool,
}

struct Shared {
    session_id: String,
    session: Mutex<StorySession>,
    events: broadcast::Sender<StoryEvent>,
    persistence: Option<IndexPersistence>,
}

impl Shared {
    fn emit(&self, event: StoryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // Runs while the session lock is held so persistence and observers see
    // index changes in order.
    async fn index_changed(&self, session: &StorySession) {
        let index = session.state.current_index;
        if let Some(persistence) = &self.persistence {
            if session.state.len > 0 {
                persistence.save(index).await;
            }
        }
        self.emit(StoryEvent::IndexChanged { index });
    }

    async fn navigated(&self, session: &StorySession, navigation: Navigation) {
        match navigation {
            Navigation::Moved(_) => self.index_changed(session).await,
            Navigation::Ended => self.emit(StoryEvent::SequenceEnded {
                index: session.state.current_index,
            }),
            Navigation::Unchanged => {}
        }
    }
}

/// Drives one story feed: owns the playback state, the single autoplay
/// ticker and the persisted viewing position.
#[derive(Clone)]
pub struct StoryController {
    shared: Arc<Shared>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    autoplay: bool,
    tick_interval: Duration,
}

impl StoryController {
    pub fn new(options: StoryOptions) -> Self {
        let persistence = match (options.storage_key, options.store) {
            (Some(key), Some(store)) => Some(IndexPersistence { key, store }),
            _ => None,
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session_id = Uuid::new_v4().to_string();
        log_info!("story session {} created", session_id);

        Self {
            shared: Arc::new(Shared {
                session_id,
                session: Mutex::new(StorySession {
                    state: StoryState::new(options.duration.as_millis() as u64),
                    products: Vec::new(),
                    restored: false,
                }),
                events,
                persistence,
            }),
            ticker: Arc::new(Mutex::new(None)),
            autoplay: options.autoplay,
            tick_interval: options.tick_interval,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoryEvent> {
        self.shared.events.subscribe()
    }

    pub async fn snapshot(&self) -> StorySnapshot {
        let mut session = self.shared.session.lock().await;
        session.state.sync_progress(Instant::now());
        let state = session.state.clone();
        StorySnapshot {
            session_id: self.shared.session_id.clone(),
            phase: state.phase(),
            product: session.products.get(state.current_index).cloned(),
            indicator: map_progress(state.len, state.current_index, state.progress),
            state,
        }
    }

    pub async fn current_product(&self) -> Option<Product> {
        let session = self.shared.session.lock().await;
        session.products.get(session.state.current_index).cloned()
    }

    /// Replaces the sequence, e.g. after another page was fetched.
    pub async fn set_products(&self, products: Vec<Product>) {
        {
            let mut session = self.shared.session.lock().await;
            let now = Instant::now();
            let was_empty = session.state.len == 0;
            let len = products.len();
            session.products = products;
            let mut index_changed = session.state.set_len(len, now);

            if len > 0 && !session.restored {
                if let Some(persistence) = &self.shared.persistence {
                    session.restored = true;
                    if let Some(index) = persistence
                        .load()
                        .await
                        .and_then(|raw| clamp_index(raw, len))
                    {
                        if index != session.state.current_index {
                            session.state.go_to_index(index, now);
                            index_changed = true;
                        }
                        log_info!(
                            "story session {} restored index {}",
                            self.shared.session_id,
                            index
                        );
                    }
                }
            }

            if self.autoplay && was_empty && len > 0 && !session.state.playing {
                session.state.play(now);
                self.shared.emit(StoryEvent::PlaybackChanged {
                    phase: session.state.phase(),
                });
            }

            if index_changed {
                self.shared.index_changed(&session).await;
            }
        }
        self.sync_ticker().await;
    }

    pub async fn go_to_next(&self) -> Navigation {
        self.navigate(|state, now| state.go_to_next(now)).await
    }

    pub async fn go_to_previous(&self) -> Navigation {
        self.navigate(|state, now| state.go_to_previous(now)).await
    }

    pub async fn go_to_index(&self, index: usize) -> Navigation {
        self.navigate(move |state, now| state.go_to_index(index, now))
            .await
    }

    pub async fn play(&self) {
        self.update_playback(|state, now| state.play(now)).await;
    }

    pub async fn pause(&self) {
        self.update_playback(|state, now| state.pause(now)).await;
    }

    pub async fn set_holding(&self, holding: bool) {
        self.update_playback(move |state, now| state.set_holding(holding, now))
            .await;
    }

    pub async fn set_duration(&self, duration: Duration) {
        self.update_playback(move |state, now| {
            state.set_duration(duration.as_millis() as u64, now)
        })
        .await;
    }

    pub async fn reset(&self) {
        self.cancel_ticker().await;
        {
            let mut session = self.shared.session.lock().await;
            let previous = session.state.current_index;
            session.state.reset();
            self.shared.emit(StoryEvent::PlaybackChanged {
                phase: session.state.phase(),
            });
            if previous != 0 {
                self.shared.index_changed(&session).await;
            }
        }
        self.sync_ticker().await;
    }

    /// Handles playback intents and hands UI intents back to the caller.
    pub async fn apply(&self, intent: StoryIntent) -> Option<StoryIntent> {
        match intent {
            StoryIntent::Next => {
                self.go_to_next().await;
                None
            }
            StoryIntent::Previous => {
                self.go_to_previous().await;
                None
            }
            StoryIntent::Hold(holding) => {
                self.set_holding(holding).await;
                None
            }
            other => Some(other),
        }
    }

    /// Ends the session: the ticker is torn down and never recreated by this
    /// handle's operations until playback state changes again.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        log_info!("story session {} shut down", self.shared.session_id);
    }

    async fn navigate<F>(&self, op: F) -> Navigation
    where
        F: FnOnce(&mut StoryState, Instant) -> Navigation,
    {
        let navigation = {
            let mut session = self.shared.session.lock().await;
            let navigation = op(&mut session.state, Instant::now());
            self.shared.navigated(&session, navigation).await;
            navigation
        };
        if matches!(navigation, Navigation::Moved(_)) {
            self.sync_ticker().await;
        }
        navigation
    }

    async fn update_playback<F>(&self, op: F)
    where
        F: FnOnce(&mut StoryState, Instant),
    {
        {
            let mut session = self.shared.session.lock().await;
            let before = session.state.phase();
            op(&mut session.state, Instant::now());
            let after = session.state.phase();
            if before != after {
                self.shared.emit(StoryEvent::PlaybackChanged { phase: after });
            }
        }
        self.sync_ticker().await;
    }

    // Tears down any running ticker and starts a fresh one if the clock
    // should be running. At most one ticker exists per controller.
    //
    // The session lock is taken before the abort: a tick holds it until its
    // index change is persisted and announced, so a tick is never cut off
    // halfway.
    async fn sync_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        let running = {
            let session = self.shared.session.lock().await;
            if let Some(handle) = ticker_guard.take() {
                handle.abort();
            }
            session.state.is_running()
        };
        if !running {
            return;
        }

        let shared = Arc::downgrade(&self.shared);
        let tick_interval = self.tick_interval;
        *ticker_guard = Some(tokio::spawn(run_ticker(shared, tick_interval)));
    }

    async fn cancel_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        let _session = self.shared.session.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }
    }
}

async fn run_ticker(shared: Weak<Shared>, tick_interval: Duration) {
    let mut interval = time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        // Every controller handle is gone: the session has ended.
        let Some(shared) = shared.upgrade() else {
            break;
        };

        let mut session = shared.session.lock().await;
        match session.state.tick(Instant::now()) {
            Tick::Inactive => break,
            Tick::Progress(percent) => shared.emit(StoryEvent::Progress {
                index: session.state.current_index,
                percent,
            }),
            Tick::Advanced(index) => {
                log_info!("story session {} auto-advanced to {}", shared.session_id, index);
                shared.index_changed(&session).await;
            }
            Tick::Ended => {
                log_info!("story session {} reached the end", shared.session_id);
                shared.emit(StoryEvent::SequenceEnded {
                    index: session.state.current_index,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::sample_products;
    use crate::storage::testing::{FailingStore, MemoryStore};

    fn options_with_store(store: Arc<dyn LocalStore>) -> StoryOptions {
        StoryOptions {
            storage_key: Some("story_index".into()),
            store: Some(store),
            ..StoryOptions::default()
        }
    }

    /// Store whose writes take a while, like a slow disk.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl LocalStore for SlowStore {
        async fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
            time::sleep(self.delay).await;
            self.inner.write(key, value).await
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.inner.remove(key).await
        }
    }

    fn drain(rx: &mut broadcast::Receiver<StoryEvent>) -> Vec<StoryEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_starts_once_when_products_arrive() {
        let controller = StoryController::new(StoryOptions::default());
        assert_eq!(controller.snapshot().await.phase, StoryPhase::Idle);

        controller.set_products(sample_products(3)).await;
        assert_eq!(controller.snapshot().await.phase, StoryPhase::Playing);

        controller.pause().await;
        // More items arriving must not restart a paused feed.
        controller.set_products(sample_products(6)).await;
        assert_eq!(controller.snapshot().await.phase, StoryPhase::ManuallyStopped);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_disabled_waits_for_play() {
        let controller = StoryController::new(StoryOptions {
            autoplay: false,
            ..StoryOptions::default()
        });
        controller.set_products(sample_products(2)).await;
        time::sleep(Duration::from_secs(6)).await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.phase, StoryPhase::Stopped);
        assert_eq!(snapshot.state.current_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_after_duration() {
        let controller = StoryController::new(StoryOptions {
            duration: Duration::from_millis(1_000),
            ..StoryOptions::default()
        });
        let mut rx = controller.subscribe();
        controller.set_products(sample_products(3)).await;

        time::sleep(Duration::from_millis(1_060)).await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state.current_index, 1);
        assert!(snapshot.state.progress < 10.0);
        assert_eq!(snapshot.product.map(|p| p.id), Some(2));
        assert!(drain(&mut rx)
            .iter()
            .any(|event| matches!(event, StoryEvent::IndexChanged { index: 1 })));
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn hold_and_release_continue_from_elapsed_progress() {
        let controller = StoryController::new(StoryOptions::default());
        controller.set_products(sample_products(3)).await;

        time::sleep(Duration::from_millis(2_000)).await;
        controller.set_holding(true).await;
        let held = controller.snapshot().await;
        assert_eq!(held.phase, StoryPhase::HeldPaused);
        assert_eq!(held.state.progress, 40.0);

        time::sleep(Duration::from_millis(1)).await;
        controller.set_holding(false).await;
        time::sleep(Duration::from_millis(10)).await;

        let resumed = controller.snapshot().await;
        assert_eq!(resumed.phase, StoryPhase::Playing);
        assert_eq!(resumed.state.current_index, 0);
        assert!((resumed.state.progress - 40.2).abs() < 1e-9);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn long_hold_does_not_advance() {
        let controller = StoryController::new(StoryOptions::default());
        controller.set_products(sample_products(2)).await;
        controller.apply(StoryIntent::Hold(true)).await;

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(controller.snapshot().await.state.current_index, 0);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn next_on_last_story_signals_end_once_per_call() {
        let controller = StoryController::new(StoryOptions {
            autoplay: false,
            ..StoryOptions::default()
        });
        controller.set_products(sample_products(2)).await;
        controller.go_to_index(1).await;
        let mut rx = controller.subscribe();

        assert_eq!(controller.go_to_next().await, Navigation::Ended);
        assert_eq!(controller.go_to_next().await, Navigation::Ended);

        let ends = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, StoryEvent::SequenceEnded { index: 1 }))
            .count();
        assert_eq!(ends, 2);
        assert_eq!(controller.snapshot().await.state.current_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_end_is_reported_once_and_caller_can_loop() {
        let controller = StoryController::new(StoryOptions {
            duration: Duration::from_millis(500),
            ..StoryOptions::default()
        });
        let mut rx = controller.subscribe();
        controller.set_products(sample_products(2)).await;

        time::sleep(Duration::from_millis(2_000)).await;
        let ends = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, StoryEvent::SequenceEnded { .. }))
            .count();
        assert_eq!(ends, 1);

        controller.go_to_index(0).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state.current_index, 0);
        assert_eq!(snapshot.phase, StoryPhase::Playing);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn index_survives_a_new_session_with_the_same_key() {
        let store = Arc::new(MemoryStore::default());

        let first = StoryController::new(options_with_store(store.clone()));
        first.set_products(sample_products(5)).await;
        first.go_to_index(3).await;
        first.shutdown().await;
        assert_eq!(store.get("story_index").as_deref(), Some("3"));

        let second = StoryController::new(options_with_store(store.clone()));
        second.set_products(sample_products(5)).await;
        assert_eq!(second.snapshot().await.state.current_index, 3);
        second.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stored_index_is_clamped_to_the_feed() {
        let store = Arc::new(MemoryStore::with_entry("story_index", "42"));
        let controller = StoryController::new(options_with_store(store.clone()));
        controller.set_products(sample_products(4)).await;

        assert_eq!(controller.snapshot().await.state.current_index, 3);
        assert_eq!(store.get("story_index").as_deref(), Some("3"));
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_or_failing_storage_means_no_prior_position() {
        let corrupt = Arc::new(MemoryStore::with_entry("story_index", "abc"));
        let controller = StoryController::new(options_with_store(corrupt));
        controller.set_products(sample_products(4)).await;
        assert_eq!(controller.snapshot().await.state.current_index, 0);
        controller.shutdown().await;

        let failing = StoryController::new(options_with_store(Arc::new(FailingStore)));
        failing.set_products(sample_products(4)).await;
        assert_eq!(failing.go_to_next().await, Navigation::Moved(1));
        assert_eq!(failing.snapshot().await.state.current_index, 1);
        failing.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_feed_keeps_index_in_bounds() {
        let controller = StoryController::new(StoryOptions::default());
        controller.set_products(sample_products(8)).await;
        controller.go_to_index(7).await;

        controller.set_products(sample_products(3)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state.current_index, 2);
        assert_eq!(snapshot.indicator.segments.len(), 3);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_playback_and_clears_ticker() {
        let controller = StoryController::new(StoryOptions::default());
        controller.set_products(sample_products(3)).await;
        controller.go_to_index(2).await;
        controller.reset().await;

        time::sleep(Duration::from_secs(20)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state.current_index, 0);
        assert_eq!(snapshot.phase, StoryPhase::Stopped);
        assert!(controller.ticker.lock().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ui_intents_are_returned_to_the_caller() {
        let controller = StoryController::new(StoryOptions::default());
        controller.set_products(sample_products(2)).await;

        assert_eq!(
            controller.apply(StoryIntent::OpenMessage).await,
            Some(StoryIntent::OpenMessage)
        );
        assert_eq!(controller.apply(StoryIntent::Next).await, None);
        assert_eq!(controller.snapshot().await.state.current_index, 1);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shorter_duration_applies_to_the_running_story() {
        let controller = StoryController::new(StoryOptions::default());
        controller.set_products(sample_products(3)).await;

        time::sleep(Duration::from_millis(1_000)).await;
        controller.set_duration(Duration::from_millis(2_000)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state.current_index, 0);
        assert!((snapshot.state.progress - 50.0).abs() < 1e-9);
        assert_eq!(snapshot.phase, StoryPhase::Playing);

        time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(controller.snapshot().await.state.current_index, 1);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn longer_duration_delays_the_advance() {
        let controller = StoryController::new(StoryOptions {
            duration: Duration::from_millis(1_000),
            ..StoryOptions::default()
        });
        controller.set_products(sample_products(3)).await;

        time::sleep(Duration::from_millis(500)).await;
        controller.set_duration(Duration::from_millis(4_000)).await;
        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(controller.snapshot().await.state.current_index, 0);

        time::sleep(Duration::from_millis(2_600)).await;
        assert_eq!(controller.snapshot().await.state.current_index, 1);
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn growing_feed_keeps_position_and_progress() {
        let controller = StoryController::new(StoryOptions::default());
        let mut rx = controller.subscribe();
        controller.set_products(sample_products(3)).await;
        controller.go_to_index(2).await;
        time::sleep(Duration::from_millis(1_000)).await;
        drain(&mut rx);

        controller.set_products(sample_products(10)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state.current_index, 2);
        assert!((snapshot.state.progress - 20.0).abs() < 1e-9);
        assert_eq!(snapshot.phase, StoryPhase::Playing);
        assert_eq!(snapshot.indicator.segments.len(), 10);
        assert!(!drain(&mut rx)
            .iter()
            .any(|event| matches!(event, StoryEvent::IndexChanged { .. })));
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_an_advance_to_be_announced() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::default(),
            delay: Duration::from_millis(200),
        });
        let controller = StoryController::new(StoryOptions {
            duration: Duration::from_millis(1_000),
            ..options_with_store(store.clone())
        });
        let mut rx = controller.subscribe();
        controller.set_products(sample_products(3)).await;

        // The advance at 1000ms is still writing its index when shutdown starts.
        time::sleep(Duration::from_millis(1_010)).await;
        controller.shutdown().await;

        assert!(drain(&mut rx)
            .iter()
            .any(|event| matches!(event, StoryEvent::IndexChanged { index: 1 })));
        assert_eq!(store.inner.get("story_index").as_deref(), Some("1"));
    }
}
