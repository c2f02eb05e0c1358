use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{ItemKey, Movie, MovieId, NextEpisodeState, Show, ShowId, SyncCursor};
use crate::services::core::buckets::ShowBuckets;

/// The engine's cached view of the host library.
///
/// Refreshed from the catalog adapter by the background worker and merged
/// against shared-storage changes by the sync reconciler. Everything
/// derived (next-episode states, buckets) is recomputed from this view.
#[derive(Debug, Clone, Default)]
pub struct LibraryView {
    pub shows: HashMap<ShowId, Show>,
    pub movies: HashMap<MovieId, Movie>,
}

impl LibraryView {
    pub fn from_parts(shows: Vec<Show>, movies: Vec<Movie>) -> Self {
        Self {
            shows: shows.into_iter().map(|s| (s.id.clone(), s)).collect(),
            movies: movies.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Shows in deterministic (id) order.
    pub fn shows_ordered(&self) -> Vec<&Show> {
        let mut shows: Vec<&Show> = self.shows.values().collect();
        shows.sort_by(|a, b| a.id.cmp(&b.id));
        shows
    }

    /// Movies in deterministic (id) order.
    pub fn movies_ordered(&self) -> Vec<&Movie> {
        let mut movies: Vec<&Movie> = self.movies.values().collect();
        movies.sort_by(|a, b| a.id.cmp(&b.id));
        movies
    }
}

/// Process-wide engine state with explicit init and teardown.
///
/// Created once on service start and dropped on service stop; readers
/// obtain snapshots through the accessors instead of any ambient global.
///
/// Writer discipline: the background worker is the single writer. Each
/// mutation commits a whole replacement value under the write lock, so a
/// concurrent reader sees either the previous snapshot or the new one,
/// never a show mid-recompute.
pub struct EngineState {
    library: Arc<RwLock<LibraryView>>,
    next_states: Arc<RwLock<HashMap<ShowId, NextEpisodeState>>>,
    buckets: Arc<RwLock<ShowBuckets>>,
    /// Items already emitted in the current unbroken viewing session.
    /// Accumulates across "continue playlist" rebuilds; cleared only on
    /// explicit session end, never silently.
    session_emitted: Arc<RwLock<HashSet<ItemKey>>>,
    cursor: Arc<RwLock<SyncCursor>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            library: Arc::new(RwLock::new(LibraryView::default())),
            next_states: Arc::new(RwLock::new(HashMap::new())),
            buckets: Arc::new(RwLock::new(ShowBuckets::default())),
            session_emitted: Arc::new(RwLock::new(HashSet::new())),
            cursor: Arc::new(RwLock::new(SyncCursor::start())),
        }
    }

    pub async fn library_snapshot(&self) -> LibraryView {
        self.library.read().await.clone()
    }

    pub async fn replace_library(&self, view: LibraryView) {
        *self.library.write().await = view;
    }

    /// Replace or remove a single show in the cached view.
    pub async fn update_show(&self, show_id: &ShowId, show: Option<Show>) {
        let mut library = self.library.write().await;
        match show {
            Some(show) => {
                library.shows.insert(show.id.clone(), show);
            }
            None => {
                library.shows.remove(show_id);
            }
        }
    }

    /// Apply an in-place edit to the cached view under the write lock.
    pub async fn with_library_mut<R>(&self, f: impl FnOnce(&mut LibraryView) -> R) -> R {
        let mut library = self.library.write().await;
        f(&mut library)
    }

    pub async fn next_state(&self, show_id: &ShowId) -> Option<NextEpisodeState> {
        self.next_states.read().await.get(show_id).cloned()
    }

    pub async fn next_states_snapshot(&self) -> HashMap<ShowId, NextEpisodeState> {
        self.next_states.read().await.clone()
    }

    /// Commit a recomputed resolution for one show. `None` removes the
    /// show from the output (fully watched or excluded).
    pub async fn commit_resolution(&self, show_id: &ShowId, state: Option<NextEpisodeState>) {
        let mut states = self.next_states.write().await;
        match state {
            Some(state) => {
                states.insert(show_id.clone(), state);
            }
            None => {
                states.remove(show_id);
            }
        }
    }

    /// Commit a full batch of resolutions, replacing the previous map.
    pub async fn replace_resolutions(&self, states: HashMap<ShowId, NextEpisodeState>) {
        *self.next_states.write().await = states;
    }

    pub async fn buckets_snapshot(&self) -> ShowBuckets {
        self.buckets.read().await.clone()
    }

    pub async fn replace_buckets(&self, buckets: ShowBuckets) {
        *self.buckets.write().await = buckets;
    }

    pub async fn session_snapshot(&self) -> HashSet<ItemKey> {
        self.session_emitted.read().await.clone()
    }

    pub async fn session_mark_emitted(&self, keys: impl IntoIterator<Item = ItemKey>) {
        self.session_emitted.write().await.extend(keys);
    }

    pub async fn session_clear(&self) {
        self.session_emitted.write().await.clear();
    }

    pub async fn cursor(&self) -> SyncCursor {
        *self.cursor.read().await
    }

    pub async fn set_cursor(&self, cursor: SyncCursor) {
        *self.cursor.write().await = cursor;
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field(
                "shows",
                &self.library.try_read().map(|l| l.shows.len()).unwrap_or(0),
            )
            .field(
                "resolved",
                &self
                    .next_states
                    .try_read()
                    .map(|s| s.len())
                    .unwrap_or(0),
            )
            .finish()
    }
}
