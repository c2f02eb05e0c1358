use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Movie, Show, ShowId, SyncCursor, WatchStateChange};

/// Read-only query interface to the host media library.
///
/// The engine never writes through this trait; watched flags and resume
/// points change only via catalog-observed playback events or the sync
/// reconciler's merged view.
#[async_trait]
pub trait MediaCatalog: Send + Sync + std::fmt::Debug {
    /// All tracked shows with their full episode lists, episodes ordered
    /// by (season, episode) ascending.
    async fn get_shows(&self) -> Result<Vec<Show>>;

    /// A single show, or None if it no longer exists in the library.
    async fn get_show(&self, id: &ShowId) -> Result<Option<Show>>;

    async fn get_movies(&self) -> Result<Vec<Movie>>;
}

/// Shared watch-state storage written by other instances of the engine.
///
/// Only the reconciliation semantics are specified here; the transport
/// behind an implementation is its own concern.
#[async_trait]
pub trait SharedWatchStore: Send + Sync + std::fmt::Debug {
    /// Changes recorded strictly after the cursor's high-water mark,
    /// in any order. An unreachable store returns Err; the caller treats
    /// that as a skipped cycle, not a fatal condition.
    async fn changes_since(&self, cursor: SyncCursor) -> Result<Vec<WatchStateChange>>;
}
