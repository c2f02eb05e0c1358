use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::{ContentMode, PlaylistConfig, SelectionMode};
use crate::error::EngineError;
use crate::models::{Classification, ItemKey, MediaItem, PlaylistItem, ShowId};
use crate::services::core::partials::PartialIndex;
use crate::services::core::tracker::{Resolution, TrackerService};
use crate::state::LibraryView;

/// Composes ordered playback queues from tracker output, the partial
/// index, and movie candidates.
///
/// Stateless across invocations; the session exclusion set lives in
/// `EngineState` and is passed in by the caller.
pub struct PlaylistBuilder;

impl PlaylistBuilder {
    /// Build an ordered queue of at most `config.bounded_length()` items.
    ///
    /// A pool running dry mid-build shortens the queue; a queue that would
    /// be empty outright is `EmptyResult`.
    pub fn build(
        library: &LibraryView,
        config: &PlaylistConfig,
        session_excluded: &HashSet<ItemKey>,
        rng: &mut impl Rng,
    ) -> Result<Vec<PlaylistItem>, EngineError> {
        let length = config.bounded_length();
        let tv_enabled = config.content != ContentMode::MoviesOnly;
        let movies_enabled = config.content != ContentMode::TvOnly;

        let mut episode_pool = if tv_enabled {
            Self::episode_candidates(library, config, session_excluded, rng)
        } else {
            Vec::new()
        };
        let mut movie_pool = if movies_enabled {
            Self::movie_candidates(library, config, session_excluded)
        } else {
            Vec::new()
        };

        let mut output: Vec<PlaylistItem> = Vec::with_capacity(length);
        let mut used_shows: HashSet<ShowId> = HashSet::new();
        let mut emitted: HashSet<ItemKey> = HashSet::new();

        for item in Self::prioritized_partials(library, config, session_excluded) {
            if output.len() >= length {
                break;
            }
            let key = item.key();
            if !emitted.insert(key) {
                continue;
            }
            if !config.allow_same_show {
                if let MediaItem::Episode(e) = &item {
                    if !used_shows.insert(e.show_id.clone()) {
                        continue;
                    }
                }
            }
            output.push(Self::stamp(item, Classification::Partial, output.len(), config));
        }

        // Items placed from the partial block no longer compete for slots.
        episode_pool.retain(|item| {
            !emitted.contains(&item.key())
                && match item {
                    MediaItem::Episode(e) => {
                        config.allow_same_show || !used_shows.contains(&e.show_id)
                    }
                    MediaItem::Movie(_) => true,
                }
        });
        movie_pool.retain(|item| !emitted.contains(&item.key()));

        while output.len() < length {
            let pick_movie = match (episode_pool.is_empty(), movie_pool.is_empty()) {
                (true, true) => break,
                (true, false) => true,
                (false, true) => false,
                (false, false) => rng.random_bool(Self::movie_probability(config.movie_ratio)),
            };

            let pool = if pick_movie { &mut movie_pool } else { &mut episode_pool };
            let idx = Self::draw(pool, output.last(), config.allow_same_show, rng);
            let item = pool.swap_remove(idx);

            if !config.allow_same_show {
                if let MediaItem::Episode(e) = &item {
                    used_shows.insert(e.show_id.clone());
                }
            }
            output.push(Self::stamp(item, Classification::Fresh, output.len(), config));
        }

        if output.is_empty() {
            return Err(EngineError::EmptyResult);
        }
        debug!(
            length = output.len(),
            requested = length,
            "Playlist built"
        );
        Ok(output)
    }

    /// Movie-draw probability for ratio `r`: weight r against a TV weight
    /// of 1, so r = 0 never draws a movie and r = 1 is an even split.
    fn movie_probability(ratio: f64) -> f64 {
        let r = ratio.clamp(0.0, 1.0);
        r / (1.0 + r)
    }

    /// One tracker candidate per in-filter show. A show failing its
    /// integrity check is logged and dropped; it never sinks the build.
    fn episode_candidates(
        library: &LibraryView,
        config: &PlaylistConfig,
        session_excluded: &HashSet<ItemKey>,
        rng: &mut impl Rng,
    ) -> Vec<MediaItem> {
        let mut candidates = Vec::new();
        for show in library.shows_ordered() {
            if !config.show_filter.is_empty() && !config.show_filter.contains(&show.id) {
                continue;
            }
            let mut show = show.clone();
            if config.random_order_shows.contains(&show.id) {
                show.random_order = true;
            }
            let state = match TrackerService::resolve(
                &show,
                config.episode_selection,
                config.unwatched_chance,
                rng,
            ) {
                Ok(Resolution::Resolved(state)) => state,
                Ok(Resolution::Excluded) => continue,
                Err(err) => {
                    warn!(show_id = %show.id, error = %err, "Show dropped from candidate pool");
                    continue;
                }
            };
            if !Self::premiere_allowed(config, state.resolved_season, state.resolved_episode) {
                continue;
            }
            let Some(episode) = show
                .episodes
                .iter()
                .find(|e| e.id == state.resolved_next)
            else {
                continue;
            };
            if session_excluded.contains(&ItemKey::Episode(episode.id.clone())) {
                continue;
            }
            candidates.push(MediaItem::Episode(episode.clone()));
        }
        candidates
    }

    fn movie_candidates(
        library: &LibraryView,
        config: &PlaylistConfig,
        session_excluded: &HashSet<ItemKey>,
    ) -> Vec<MediaItem> {
        library
            .movies_ordered()
            .into_iter()
            .filter(|m| match config.movie_selection {
                SelectionMode::Unwatched => !m.watched,
                SelectionMode::Watched => m.watched,
                SelectionMode::Both => true,
            })
            .filter(|m| !session_excluded.contains(&ItemKey::Movie(m.id.clone())))
            .map(|m| MediaItem::Movie(m.clone()))
            .collect()
    }

    /// Partial items for the front of the queue, both content types merged
    /// by recency.
    fn prioritized_partials(
        library: &LibraryView,
        config: &PlaylistConfig,
        session_excluded: &HashSet<ItemKey>,
    ) -> Vec<MediaItem> {
        // The episode index groups same-show runs behind their most recent
        // lead. Merging with movies must not split those runs, so the merge
        // sorts whole groups by their lead's recency.
        let mut groups: Vec<Vec<MediaItem>> = Vec::new();
        if config.prioritize_partial_episodes && config.content != ContentMode::MoviesOnly {
            for episode in PartialIndex::episodes(library, config.episode_selection) {
                let same_show = groups.last().and_then(|g| g.first()).is_some_and(|lead| {
                    matches!(lead, MediaItem::Episode(e) if e.show_id == episode.show_id)
                });
                if same_show {
                    if let Some(group) = groups.last_mut() {
                        group.push(MediaItem::Episode(episode));
                    }
                } else {
                    groups.push(vec![MediaItem::Episode(episode)]);
                }
            }
        }
        if config.prioritize_partial_movies && config.content != ContentMode::TvOnly {
            for movie in PartialIndex::movies(library, config.movie_selection) {
                groups.push(vec![MediaItem::Movie(movie)]);
            }
        }
        groups.sort_by(|a, b| {
            b[0].last_played()
                .cmp(&a[0].last_played())
                .then_with(|| a[0].key().cmp(&b[0].key()))
        });
        let mut partials: Vec<MediaItem> = groups.into_iter().flatten().collect();
        partials.retain(|item| !session_excluded.contains(&item.key()));
        partials
    }

    /// Uniform draw with the back-to-back guard: when show repeats are
    /// allowed, a draw colliding with the previous entry's show is redrawn
    /// from the alternatives, and only stands if it has none.
    fn draw(
        pool: &[MediaItem],
        previous: Option<&PlaylistItem>,
        allow_same_show: bool,
        rng: &mut impl Rng,
    ) -> usize {
        let idx = rng.random_range(0..pool.len());
        if !allow_same_show {
            return idx;
        }
        let previous_show = match previous.map(|p| &p.item) {
            Some(MediaItem::Episode(e)) => &e.show_id,
            _ => return idx,
        };
        let collides = |i: usize| match &pool[i] {
            MediaItem::Episode(e) => &e.show_id == previous_show,
            MediaItem::Movie(_) => false,
        };
        if !collides(idx) {
            return idx;
        }
        let alternatives: Vec<usize> = (0..pool.len()).filter(|&i| !collides(i)).collect();
        match alternatives.as_slice() {
            [] => idx,
            alts => alts[rng.random_range(0..alts.len())],
        }
    }

    fn stamp(
        item: MediaItem,
        classification: Classification,
        position: usize,
        config: &PlaylistConfig,
    ) -> PlaylistItem {
        let resume_from_position = config.resume_partials && item.is_partial();
        PlaylistItem {
            item,
            classification,
            position,
            resume_from_position,
        }
    }

    fn premiere_allowed(config: &PlaylistConfig, season: u32, episode: u32) -> bool {
        if episode != 1 {
            return true;
        }
        if season <= 1 {
            config.include_series_premieres
        } else {
            config.include_season_premieres
        }
    }
}
