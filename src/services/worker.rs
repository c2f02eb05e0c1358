use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{MediaCatalog, SharedWatchStore};
use crate::config::{Config, PlaylistConfig, SelectionMode};
use crate::error::EngineError;
use crate::events::{EngineEvent, EngineEventKind};
use crate::models::{ItemKey, NextEpisodeState, PlaylistItem, Show, ShowId};
use crate::services::core::buckets::ShowBuckets;
use crate::services::core::playlist::PlaylistBuilder;
use crate::services::core::sync::SyncReconciler;
use crate::services::core::tracker::{Resolution, TrackerService};
use crate::state::{EngineState, LibraryView};

/// The engine's single writer.
///
/// Owns all mutation of the cached library and the derived resolutions.
/// Startup performs one bulk rescan (the only point where an unreachable
/// catalog is fatal); afterwards the loop alternates between the periodic
/// rescan, reconciliation passes, and scoped recomputes driven by the
/// bounded event queue.
pub struct EngineWorker {
    catalog: Arc<dyn MediaCatalog>,
    store: Option<Arc<dyn SharedWatchStore>>,
    config: Arc<RwLock<Config>>,
    state: Arc<EngineState>,
}

impl EngineWorker {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        store: Option<Arc<dyn SharedWatchStore>>,
        config: Config,
    ) -> Self {
        Self {
            catalog,
            store,
            config: Arc::new(RwLock::new(config)),
            state: Arc::new(EngineState::new()),
        }
    }

    /// Run the startup rescan and spawn the worker loop.
    pub async fn start(self) -> Result<WorkerHandle, EngineError> {
        let (refresh, queue_capacity) = {
            let config = self.config.read().await;
            (config.refresh.clone(), config.refresh.event_queue_capacity)
        };

        // Startup is the one hard dependency on the catalog.
        self.full_rescan()
            .await
            .map_err(|e| EngineError::CatalogUnavailable(e.to_string()))?;
        info!(
            shows = self.state.library_snapshot().await.shows.len(),
            "Engine started"
        );

        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let shutdown = CancellationToken::new();
        let handle_state = Arc::clone(&self.state);
        let handle_config = Arc::clone(&self.config);
        let handle_store = self.store.clone();
        let fetch_timeout = Duration::from_secs(refresh.query_timeout_secs);

        let loop_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            self.run(rx, loop_shutdown).await;
        });

        Ok(WorkerHandle {
            state: handle_state,
            config: handle_config,
            store: handle_store,
            fetch_timeout,
            events: tx,
            shutdown,
            task: Arc::new(task),
        })
    }

    async fn run(self, mut events: mpsc::Receiver<EngineEvent>, shutdown: CancellationToken) {
        let (refresh_secs, sync_secs) = {
            let config = self.config.read().await;
            (config.refresh.interval_secs, config.sync.interval_secs)
        };
        let mut refresh_tick = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));
        let mut sync_tick = tokio::time::interval(Duration::from_secs(sync_secs.max(1)));
        // First ticks fire immediately; startup already covered both.
        refresh_tick.tick().await;
        sync_tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = refresh_tick.tick() => {
                    if let Err(e) = self.full_rescan().await {
                        // Single attempt per cycle; the next tick retries.
                        warn!(error = %e, "Periodic rescan skipped");
                    }
                }
                _ = sync_tick.tick() => {
                    self.sync_pass().await;
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    }
                }
            }
        }
        info!("Engine worker stopped");
    }

    async fn handle_event(&self, event: EngineEvent) {
        debug!(event = event.kind.as_str(), id = %event.id, "Handling event");
        match event.kind {
            EngineEventKind::PlaybackFinished { item } => match item {
                ItemKey::Episode(episode_id) => {
                    let library = self.state.library_snapshot().await;
                    let show_id = library
                        .shows
                        .values()
                        .find(|s| s.episodes.iter().any(|e| e.id == episode_id))
                        .map(|s| s.id.clone());
                    match show_id {
                        Some(show_id) => self.recompute_show(&show_id).await,
                        None => debug!(episode_id = %episode_id, "Finished episode not in view"),
                    }
                }
                ItemKey::Movie(_) => self.refresh_movies().await,
            },
            EngineEventKind::LibraryChanged { show_id } => match show_id {
                Some(show_id) => self.recompute_show(&show_id).await,
                // Without a show identity the next periodic rescan covers it.
                None => debug!("Unscoped library change deferred to next rescan"),
            },
            EngineEventKind::SettingsChanged => {
                self.recompute_all().await;
            }
            EngineEventKind::SessionEnded => {
                self.state.session_clear().await;
                info!("Viewing session ended, exclusion set cleared");
            }
            EngineEventKind::RefreshRequested => {
                if let Err(e) = self.full_rescan().await {
                    warn!(error = %e, "On-demand rescan failed");
                }
                self.sync_pass().await;
            }
        }
    }

    /// Pull the full library from the catalog and rebuild every derived
    /// structure. One timeout-bounded attempt; the caller decides whether
    /// failure is fatal.
    async fn full_rescan(&self) -> Result<(), EngineError> {
        let timeout = self.query_timeout().await;
        let shows = Self::bounded(timeout, "get_shows", self.catalog.get_shows()).await?;
        let movies = Self::bounded(timeout, "get_movies", self.catalog.get_movies()).await?;
        self.state
            .replace_library(LibraryView::from_parts(shows, movies))
            .await;
        self.recompute_all().await;
        Ok(())
    }

    async fn refresh_movies(&self) {
        let timeout = self.query_timeout().await;
        match Self::bounded(timeout, "get_movies", self.catalog.get_movies()).await {
            Ok(movies) => {
                self.state
                    .with_library_mut(|library| {
                        library.movies = movies.into_iter().map(|m| (m.id.clone(), m)).collect();
                    })
                    .await;
            }
            Err(e) => warn!(error = %e, "Movie refresh skipped"),
        }
    }

    /// Re-resolve every show from the cached view.
    async fn recompute_all(&self) {
        let library = self.state.library_snapshot().await;
        let playlist = self.config.read().await.playlist.clone();
        let mut states = HashMap::new();
        {
            let mut rng = rand::rng();
            for show in library.shows_ordered() {
                if let Some(state) = Self::resolve_for_cache(show, &playlist, &mut rng) {
                    states.insert(show.id.clone(), state);
                }
            }
        }
        let buckets = ShowBuckets::project(&states);
        self.state.replace_resolutions(states).await;
        self.state.replace_buckets(buckets).await;
    }

    /// Refetch one show and recompute only its resolution.
    async fn recompute_show(&self, show_id: &ShowId) {
        let timeout = self.query_timeout().await;
        let show = match Self::bounded(timeout, "get_show", self.catalog.get_show(show_id)).await
        {
            Ok(show) => show,
            Err(e) => {
                warn!(show_id = %show_id, error = %e, "Scoped recompute skipped");
                return;
            }
        };
        self.state.update_show(show_id, show.clone()).await;

        let playlist = self.config.read().await.playlist.clone();
        let resolution = {
            let mut rng = rand::rng();
            show.as_ref().and_then(|s| Self::resolve_for_cache(s, &playlist, &mut rng))
        };
        self.state.commit_resolution(show_id, resolution).await;

        let states = self.state.next_states_snapshot().await;
        self.state.replace_buckets(ShowBuckets::project(&states)).await;
    }

    /// Cached resolutions always use the unwatched pool; watched/both
    /// selection applies per playlist build, not to the browse state.
    fn resolve_for_cache(
        show: &Show,
        playlist: &PlaylistConfig,
        rng: &mut impl rand::Rng,
    ) -> Option<NextEpisodeState> {
        let mut show = show.clone();
        if playlist.random_order_shows.contains(&show.id) {
            show.random_order = true;
        }
        match TrackerService::resolve(&show, SelectionMode::Unwatched, playlist.unwatched_chance, rng)
        {
            Ok(Resolution::Resolved(state)) => Some(state),
            Ok(Resolution::Excluded) => None,
            Err(e) => {
                // One malformed show never takes down the cycle.
                error!(show_id = %show.id, error = %e, "Show failed resolution");
                None
            }
        }
    }

    async fn sync_pass(&self) {
        let Some(store) = &self.store else { return };
        let sync = self.config.read().await.sync.clone();
        if !sync.enabled {
            return;
        }
        let fetch_timeout = Duration::from_secs(sync.fetch_timeout_secs);
        match SyncReconciler::reconcile(store.as_ref(), &self.state, fetch_timeout).await {
            Ok(affected) => {
                if affected.is_empty() {
                    return;
                }
                debug!(shows = affected.len(), "Reconciled shows re-resolved");
                // Merged flags are already in the view; re-resolve in place.
                let library = self.state.library_snapshot().await;
                let playlist = self.config.read().await.playlist.clone();
                let resolutions: Vec<_> = {
                    let mut rng = rand::rng();
                    affected
                        .iter()
                        .map(|show_id| {
                            let resolution = library
                                .shows
                                .get(show_id)
                                .and_then(|s| Self::resolve_for_cache(s, &playlist, &mut rng));
                            (show_id, resolution)
                        })
                        .collect()
                };
                for (show_id, resolution) in resolutions {
                    self.state.commit_resolution(show_id, resolution).await;
                }
                let states = self.state.next_states_snapshot().await;
                self.state.replace_buckets(ShowBuckets::project(&states)).await;
            }
            Err(e) => warn!(error = %e, "Reconciliation pass skipped"),
        }
    }

    async fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.config.read().await.refresh.query_timeout_secs.max(1))
    }

    async fn bounded<T>(
        timeout: Duration,
        what: &str,
        fut: impl std::future::Future<Output = anyhow::Result<T>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EngineError::CatalogUnavailable(e.to_string())),
            Err(_) => Err(EngineError::Timeout(format!(
                "{what} after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// Read-side handle to a running engine.
///
/// Cheap to clone into request handlers; every read is a committed
/// snapshot, and playlist builds never observe a show mid-recompute.
#[derive(Clone)]
pub struct WorkerHandle {
    state: Arc<EngineState>,
    config: Arc<RwLock<Config>>,
    store: Option<Arc<dyn SharedWatchStore>>,
    fetch_timeout: Duration,
    events: mpsc::Sender<EngineEvent>,
    shutdown: CancellationToken,
    task: Arc<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn state(&self) -> Arc<EngineState> {
        Arc::clone(&self.state)
    }

    /// Enqueue an event. The queue is bounded; when it is full the event
    /// is dropped with a warning rather than blocking the caller.
    pub fn notify(&self, kind: EngineEventKind) {
        let event = EngineEvent::new(kind);
        if let Err(e) = self.events.try_send(event) {
            warn!(error = %e, "Event queue full, event dropped");
        }
    }

    /// Build a playlist from the current committed snapshot.
    ///
    /// Runs an on-demand reconciliation first when a shared store is
    /// configured; failure there falls back to last-known state. Emitted
    /// items join the session exclusion set so a "continue playlist"
    /// rebuild skips them.
    pub async fn build_playlist(&self) -> Result<Vec<PlaylistItem>, EngineError> {
        if let Some(store) = &self.store {
            let sync_enabled = self.config.read().await.sync.enabled;
            if sync_enabled {
                if let Err(e) =
                    SyncReconciler::reconcile(store.as_ref(), &self.state, self.fetch_timeout)
                        .await
                {
                    warn!(error = %e, "Pre-build reconciliation skipped");
                }
            }
        }

        let library = self.state.library_snapshot().await;
        let playlist_config = self.config.read().await.playlist.clone();
        let session = self.state.session_snapshot().await;
        let mut rng = rand::rng();
        let playlist = PlaylistBuilder::build(&library, &playlist_config, &session, &mut rng)?;
        self.state
            .session_mark_emitted(playlist.iter().map(|p| p.item.key()))
            .await;
        Ok(playlist)
    }

    pub async fn next_state(&self, show_id: &ShowId) -> Option<NextEpisodeState> {
        self.state.next_state(show_id).await
    }

    pub async fn next_states(&self) -> HashMap<ShowId, NextEpisodeState> {
        self.state.next_states_snapshot().await
    }

    pub async fn buckets(&self) -> ShowBuckets {
        self.state.buckets_snapshot().await
    }

    /// Replace the configuration and schedule a recompute for anything
    /// the change invalidated.
    pub async fn update_config(&self, config: Config) {
        *self.config.write().await = config;
        self.notify(EngineEventKind::SettingsChanged);
    }

    /// Stop the worker and wait for it to drain.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Ok(task) = Arc::try_unwrap(self.task) {
            if let Err(e) = task.await {
                warn!(error = %e, "Worker task join failed");
            }
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("state", &self.state)
            .finish()
    }
}
