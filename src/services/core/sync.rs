use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::catalog::SharedWatchStore;
use crate::error::EngineError;
use crate::models::{ShowId, SyncCursor, WatchStateChange, WatchTarget};
use crate::state::{EngineState, LibraryView};

/// Merges watch-state changes recorded by other instances against shared
/// storage into the local library view.
pub struct SyncReconciler;

impl SyncReconciler {
    /// Fetch changes after the current cursor and merge them.
    ///
    /// Returns the shows whose frontier may have moved, for tracker
    /// invalidation. Unreachable storage is reported as `SyncUnavailable`;
    /// the caller keeps the last-known state and retries next interval.
    pub async fn reconcile(
        store: &dyn SharedWatchStore,
        state: &EngineState,
        fetch_timeout: Duration,
    ) -> Result<HashSet<ShowId>, EngineError> {
        let cursor = state.cursor().await;
        let changes = match tokio::time::timeout(fetch_timeout, store.changes_since(cursor)).await
        {
            Ok(Ok(changes)) => changes,
            Ok(Err(err)) => return Err(EngineError::SyncUnavailable(err.to_string())),
            Err(_) => {
                return Err(EngineError::Timeout(format!(
                    "shared watch store fetch after {}s",
                    fetch_timeout.as_secs()
                )));
            }
        };

        if changes.is_empty() {
            return Ok(HashSet::new());
        }
        debug!(count = changes.len(), "Merging shared watch-state changes");

        let mut next_cursor = cursor;
        let affected = state
            .with_library_mut(|library| Self::apply(library, &changes, &mut next_cursor))
            .await;
        state.set_cursor(next_cursor).await;
        Ok(affected)
    }

    /// Last-writer-wins merge. A change lands only when its timestamp is
    /// strictly newer than the locally held last-played timestamp, which
    /// also makes replaying the same batch a no-op. The cursor advances
    /// over every observed change, applied or not.
    pub fn apply(
        library: &mut LibraryView,
        changes: &[WatchStateChange],
        cursor: &mut SyncCursor,
    ) -> HashSet<ShowId> {
        let mut affected = HashSet::new();
        for change in changes {
            cursor.advance(change.changed_at);
            match &change.target {
                WatchTarget::Episode { show_id, id } => {
                    let Some(show) = library.shows.get_mut(show_id) else {
                        warn!(show_id = %show_id, "Change for unknown show skipped");
                        continue;
                    };
                    let Some(episode) = show.episodes.iter_mut().find(|e| &e.id == id) else {
                        warn!(show_id = %show_id, episode_id = %id, "Change for unknown episode skipped");
                        continue;
                    };
                    if Self::newer(episode.last_played.as_ref(), change) {
                        episode.watched = change.watched;
                        episode.resume = change.resume;
                        episode.last_played = Some(change.changed_at);
                        affected.insert(show_id.clone());
                    }
                }
                WatchTarget::Movie { id } => {
                    let Some(movie) = library.movies.get_mut(id) else {
                        warn!(movie_id = %id, "Change for unknown movie skipped");
                        continue;
                    };
                    if Self::newer(movie.last_played.as_ref(), change) {
                        movie.watched = change.watched;
                        movie.resume = change.resume;
                        movie.last_played = Some(change.changed_at);
                    }
                }
            }
        }
        affected
    }

    fn newer(local: Option<&chrono::DateTime<chrono::Utc>>, change: &WatchStateChange) -> bool {
        match local {
            Some(local) => change.changed_at > *local,
            None => true,
        }
    }
}
