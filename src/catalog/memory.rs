use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{MediaCatalog, SharedWatchStore};
use crate::models::{EpisodeId, Movie, MovieId, Show, ShowId, SyncCursor, WatchStateChange};

/// In-memory catalog for tests and for embedders that feed the engine
/// directly instead of through a host library.
///
/// Doubles as a [`SharedWatchStore`] by keeping an append-only change log,
/// so one instance can stand in for the whole shared-storage setup.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    shows: Vec<Show>,
    movies: Vec<Movie>,
    changes: Vec<WatchStateChange>,
    unavailable: bool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_show(&self, show: Show) {
        let mut inner = self.inner.write().await;
        inner.shows.retain(|s| s.id != show.id);
        inner.shows.push(show);
    }

    pub async fn remove_show(&self, show_id: &ShowId) {
        self.inner.write().await.shows.retain(|s| &s.id != show_id);
    }

    pub async fn insert_movie(&self, movie: Movie) {
        let mut inner = self.inner.write().await;
        inner.movies.retain(|m| m.id != movie.id);
        inner.movies.push(movie);
    }

    /// Flip an episode's watched flag, as a playback event would.
    pub async fn set_episode_watched(&self, show_id: &ShowId, episode_id: &EpisodeId, watched: bool) {
        let mut inner = self.inner.write().await;
        if let Some(show) = inner.shows.iter_mut().find(|s| &s.id == show_id) {
            if let Some(ep) = show.episodes.iter_mut().find(|e| &e.id == episode_id) {
                ep.watched = watched;
                ep.resume = if watched { 1.0 } else { 0.0 };
            }
        }
    }

    pub async fn set_movie_watched(&self, movie_id: &MovieId, watched: bool) {
        let mut inner = self.inner.write().await;
        if let Some(movie) = inner.movies.iter_mut().find(|m| &m.id == movie_id) {
            movie.watched = watched;
            movie.resume = if watched { 1.0 } else { 0.0 };
        }
    }

    /// Record a change as another instance sharing this store would.
    pub async fn record_change(&self, change: WatchStateChange) {
        self.inner.write().await.changes.push(change);
    }

    /// Simulate the store/catalog dropping off the network.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl MediaCatalog for MemoryCatalog {
    async fn get_shows(&self) -> Result<Vec<Show>> {
        let inner = self.inner.read().await;
        if inner.unavailable {
            anyhow::bail!("catalog offline");
        }
        Ok(inner.shows.clone())
    }

    async fn get_show(&self, id: &ShowId) -> Result<Option<Show>> {
        let inner = self.inner.read().await;
        if inner.unavailable {
            anyhow::bail!("catalog offline");
        }
        Ok(inner.shows.iter().find(|s| &s.id == id).cloned())
    }

    async fn get_movies(&self) -> Result<Vec<Movie>> {
        let inner = self.inner.read().await;
        if inner.unavailable {
            anyhow::bail!("catalog offline");
        }
        Ok(inner.movies.clone())
    }
}

#[async_trait]
impl SharedWatchStore for MemoryCatalog {
    async fn changes_since(&self, cursor: SyncCursor) -> Result<Vec<WatchStateChange>> {
        let inner = self.inner.read().await;
        if inner.unavailable {
            anyhow::bail!("shared store offline");
        }
        Ok(inner
            .changes
            .iter()
            .filter(|c| match cursor.0 {
                Some(mark) => c.changed_at > mark,
                None => true,
            })
            .cloned()
            .collect())
    }
}
