use std::collections::HashMap;

use crate::config::SelectionMode;
use crate::models::{Episode, ItemKey, Movie, ShowId};
use crate::state::LibraryView;

/// Cross-show index of in-progress items, ranked by recency.
pub struct PartialIndex;

impl PartialIndex {
    /// Partial episodes in index order.
    ///
    /// Only the most recently played partial per show enters the primary
    /// recency ranking; its same-show siblings follow it immediately in
    /// ascending episode order, so narrative order survives within a show
    /// while recency still decides between shows.
    pub fn episodes(library: &LibraryView, selection: SelectionMode) -> Vec<Episode> {
        let mut by_show: HashMap<ShowId, Vec<&Episode>> = HashMap::new();
        for show in library.shows.values() {
            for episode in &show.episodes {
                if episode.is_partial() && Self::matches(selection, episode.watched) {
                    by_show.entry(show.id.clone()).or_default().push(episode);
                }
            }
        }

        let mut groups: Vec<Vec<&Episode>> = Vec::with_capacity(by_show.len());
        for (_, mut episodes) in by_show {
            episodes.sort_by_key(|e| e.order_key());
            let lead = match episodes
                .iter()
                .enumerate()
                .max_by_key(|(_, e)| (e.last_played, std::cmp::Reverse(e.order_key())))
            {
                Some((idx, _)) => idx,
                None => continue,
            };
            let lead = episodes.remove(lead);
            let mut group = vec![lead];
            group.extend(episodes);
            groups.push(group);
        }

        // Most recent lead first; identity is the deterministic tie-break.
        groups.sort_by(|a, b| {
            b[0].last_played
                .cmp(&a[0].last_played)
                .then_with(|| ItemKey::Episode(a[0].id.clone()).cmp(&ItemKey::Episode(b[0].id.clone())))
        });

        groups
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Partial movies, most recently played first.
    pub fn movies(library: &LibraryView, selection: SelectionMode) -> Vec<Movie> {
        let mut movies: Vec<&Movie> = library
            .movies
            .values()
            .filter(|m| m.is_partial() && Self::matches(selection, m.watched))
            .collect();
        movies.sort_by(|a, b| {
            b.last_played
                .cmp(&a.last_played)
                .then_with(|| a.id.cmp(&b.id))
        });
        movies.into_iter().cloned().collect()
    }

    /// The watched flag is the catalog's own threshold judgement; a partial
    /// item the catalog already counts as watched stays out of an
    /// unwatched-only view.
    fn matches(selection: SelectionMode, watched: bool) -> bool {
        match selection {
            SelectionMode::Unwatched => !watched,
            SelectionMode::Watched => watched,
            SelectionMode::Both => true,
        }
    }
}
