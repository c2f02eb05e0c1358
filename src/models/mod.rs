mod identifiers;

pub use identifiers::{EpisodeId, MovieId, ShowId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single episode as reported by the media catalog.
///
/// Identity and ordering are immutable; only the watch state fields
/// (`watched`, `resume`, `last_played`) change, and only in response to
/// catalog-observed playback events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub show_id: ShowId,
    pub title: String,
    pub season: u32,
    pub episode: u32,
    pub watched: bool,
    /// Resume fraction: 0.0 = not started, 1.0 = complete, in between = partial.
    pub resume: f32,
    pub last_played: Option<DateTime<Utc>>,
    /// Source file path. Multi-episode files share one path and are
    /// collapsed to a single representative during resolution.
    pub file: Option<String>,
}

impl Episode {
    /// (season, episode) ordering key, ascending and unique per show.
    pub fn order_key(&self) -> (u32, u32) {
        (self.season, self.episode)
    }

    pub fn is_partial(&self) -> bool {
        self.resume > 0.0 && self.resume < 1.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    pub title: String,
    /// Episodes sorted by (season, episode) ascending, no duplicates.
    /// The catalog adapter maintains this invariant; the tracker fails
    /// fast on violations.
    pub episodes: Vec<Episode>,
    /// When set, next-episode selection ignores sequential order.
    pub random_order: bool,
}

impl Show {
    pub fn watched_count(&self) -> u32 {
        self.episodes.iter().filter(|e| e.watched).count() as u32
    }

    pub fn unwatched_count(&self) -> u32 {
        self.episodes.iter().filter(|e| !e.watched).count() as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub watched: bool,
    pub resume: f32,
    pub last_played: Option<DateTime<Utc>>,
}

impl Movie {
    pub fn is_partial(&self) -> bool {
        self.resume > 0.0 && self.resume < 1.0
    }
}

/// Generic media item flowing through the playlist builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MediaItem {
    Episode(Episode),
    Movie(Movie),
}

impl MediaItem {
    pub fn key(&self) -> ItemKey {
        match self {
            MediaItem::Episode(e) => ItemKey::Episode(e.id.clone()),
            MediaItem::Movie(m) => ItemKey::Movie(m.id.clone()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            MediaItem::Episode(e) => &e.title,
            MediaItem::Movie(m) => &m.title,
        }
    }

    pub fn is_partial(&self) -> bool {
        match self {
            MediaItem::Episode(e) => e.is_partial(),
            MediaItem::Movie(m) => m.is_partial(),
        }
    }

    pub fn last_played(&self) -> Option<DateTime<Utc>> {
        match self {
            MediaItem::Episode(e) => e.last_played,
            MediaItem::Movie(m) => m.last_played,
        }
    }
}

/// Type-erased item identity, used for session exclusion sets and as a
/// deterministic tie-break key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKey {
    Episode(EpisodeId),
    Movie(MovieId),
}

/// Derived per-show resolution of the single "correct" next episode.
///
/// Pure-derived from the show's episode list: recomputed whenever watch
/// flags or the random-order flag change, never hand-mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextEpisodeState {
    pub show_id: ShowId,
    /// Contiguous run of unwatched episodes immediately after the watched
    /// frontier, in ascending order.
    pub on_deck: Vec<EpisodeId>,
    /// Unwatched episodes at or before the frontier (previously skipped),
    /// in ascending order.
    pub off_deck: Vec<EpisodeId>,
    pub resolved_next: EpisodeId,
    pub resolved_season: u32,
    pub resolved_episode: u32,
    /// True when resolved-next came from the off-deck fallback.
    pub is_skipped: bool,
    pub watched_count: u32,
    pub unwatched_count: u32,
}

/// How an item earned its playlist slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Carried a resume point and was prioritized to the front.
    Partial,
    /// Selected by weighted sampling.
    Fresh,
}

/// One emitted slot in a built playlist. Never mutated after insertion;
/// the playlist as a whole is rebuilt rather than patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub item: MediaItem,
    pub classification: Classification,
    pub position: usize,
    /// Whether playback should seek to the stored resume point.
    pub resume_from_position: bool,
}

/// A watch-state change observed in shared storage by another instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchStateChange {
    pub target: WatchTarget,
    pub watched: bool,
    pub resume: f32,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchTarget {
    Episode { show_id: ShowId, id: EpisodeId },
    Movie { id: MovieId },
}

/// Per shared-storage source, the timestamp of the last successfully merged
/// change. Advances monotonically; only strictly newer changes are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncCursor(pub Option<DateTime<Utc>>);

impl SyncCursor {
    pub fn start() -> Self {
        Self(None)
    }

    /// Advance to `ts` if it is newer than the current high-water mark.
    pub fn advance(&mut self, ts: DateTime<Utc>) {
        match self.0 {
            Some(current) if current >= ts => {}
            _ => self.0 = Some(ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn episode(id: &str, season: u32, number: u32, watched: bool, resume: f32) -> Episode {
        Episode {
            id: EpisodeId::new(id),
            show_id: ShowId::new("s1"),
            title: format!("Episode {number}"),
            season,
            episode: number,
            watched,
            resume,
            last_played: None,
            file: None,
        }
    }

    #[test]
    fn partial_requires_strictly_between_zero_and_one() {
        assert!(!episode("e1", 1, 1, false, 0.0).is_partial());
        assert!(episode("e2", 1, 2, false, 0.4).is_partial());
        assert!(!episode("e3", 1, 3, false, 1.0).is_partial());
    }

    #[test]
    fn show_counts() {
        let show = Show {
            id: ShowId::new("s1"),
            title: "Show".into(),
            episodes: vec![
                episode("e1", 1, 1, true, 1.0),
                episode("e2", 1, 2, false, 0.0),
                episode("e3", 1, 3, false, 0.0),
            ],
            random_order: false,
        };
        assert_eq!(show.watched_count(), 1);
        assert_eq!(show.unwatched_count(), 2);
    }

    #[test]
    fn cursor_advances_monotonically() {
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        let mut cursor = SyncCursor::start();
        cursor.advance(t2);
        assert_eq!(cursor.0, Some(t2));

        // An older timestamp never rewinds the cursor.
        cursor.advance(t1);
        assert_eq!(cursor.0, Some(t2));
    }
}
