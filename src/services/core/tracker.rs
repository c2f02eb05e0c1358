use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::config::SelectionMode;
use crate::error::EngineError;
use crate::models::{Episode, NextEpisodeState, Show};

/// Outcome of resolving a show's next episode.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(NextEpisodeState),
    /// The show contributes nothing: no episodes, fully watched under an
    /// unwatched-only selection, or no watched episodes under a
    /// watched-only selection. Omitted from all downstream output.
    Excluded,
}

/// Per-show next-episode resolution.
pub struct TrackerService;

impl TrackerService {
    /// Resolve the single next episode for a show.
    ///
    /// Sequential shows follow the frontier rule: the on-deck run right
    /// after the highest watched episode wins, falling back to the
    /// earliest skipped episode. Random-order shows draw from the pool
    /// the selection mode names instead.
    pub fn resolve(
        show: &Show,
        selection: SelectionMode,
        unwatched_chance: u8,
        rng: &mut impl Rng,
    ) -> Result<Resolution, EngineError> {
        if show.episodes.is_empty() {
            return Ok(Resolution::Excluded);
        }

        Self::verify_ordering(show)?;

        let watched: Vec<&Episode> = show.episodes.iter().filter(|e| e.watched).collect();
        let unwatched = Self::collapse_duplicate_files(
            show.episodes.iter().filter(|e| !e.watched).collect(),
        );

        let watched_count = watched.len() as u32;
        let unwatched_count = show.episodes.len() as u32 - watched_count;

        // Frontier: the highest-order watched episode. The episode list is
        // ascending, so the last watched entry is it.
        let frontier = watched.last().map(|e| e.order_key());

        let (on_deck, off_deck): (Vec<&Episode>, Vec<&Episode>) = match frontier {
            Some(key) => unwatched.iter().copied().partition(|e| e.order_key() > key),
            None => (unwatched.clone(), Vec::new()),
        };

        let resolved = match selection {
            SelectionMode::Unwatched => {
                Self::pick_unwatched(show, &on_deck, &off_deck, rng)
            }
            SelectionMode::Watched => watched.choose(rng).copied().map(|e| (e, false)),
            SelectionMode::Both => {
                let prefer_unwatched = rng.random_range(1..=100) <= unwatched_chance as u32;
                let from_unwatched = Self::pick_unwatched(show, &on_deck, &off_deck, rng);
                let from_watched = watched.choose(rng).copied().map(|e| (e, false));
                if prefer_unwatched {
                    from_unwatched.or(from_watched)
                } else {
                    from_watched.or(from_unwatched)
                }
            }
        };

        let Some((episode, is_skipped)) = resolved else {
            debug!(show_id = %show.id, "Show excluded from resolution");
            return Ok(Resolution::Excluded);
        };

        Ok(Resolution::Resolved(NextEpisodeState {
            show_id: show.id.clone(),
            on_deck: on_deck.iter().map(|e| e.id.clone()).collect(),
            off_deck: off_deck.iter().map(|e| e.id.clone()).collect(),
            resolved_next: episode.id.clone(),
            resolved_season: episode.season,
            resolved_episode: episode.episode,
            is_skipped,
            watched_count,
            unwatched_count,
        }))
    }

    /// Pick from the unwatched pool: frontier rule for sequential shows,
    /// uniform draw over all unwatched for random-order shows.
    fn pick_unwatched<'a>(
        show: &Show,
        on_deck: &[&'a Episode],
        off_deck: &[&'a Episode],
        rng: &mut impl Rng,
    ) -> Option<(&'a Episode, bool)> {
        if show.random_order {
            let pool: Vec<&Episode> = on_deck.iter().chain(off_deck.iter()).copied().collect();
            return pool.choose(rng).map(|e| (*e, false));
        }

        if let Some(first) = on_deck.first() {
            Some((first, false))
        } else {
            // Off-deck fallback: the earliest previously skipped episode.
            off_deck.first().map(|e| (*e, true))
        }
    }

    /// The catalog adapter guarantees strictly increasing (season, episode)
    /// pairs; a violation is a data-integrity failure for this show only.
    fn verify_ordering(show: &Show) -> Result<(), EngineError> {
        for pair in show.episodes.windows(2) {
            if pair[1].order_key() <= pair[0].order_key() {
                return Err(EngineError::DataIntegrity {
                    show: show.id.clone(),
                    detail: format!(
                        "episode ordering not strictly increasing at s{:02}e{:02}",
                        pair[1].season, pair[1].episode
                    ),
                });
            }
        }
        Ok(())
    }

    /// Multi-episode files appear once per contained episode; keep only
    /// the lowest-ordered representative so one file never occupies two
    /// queue slots.
    fn collapse_duplicate_files(episodes: Vec<&Episode>) -> Vec<&Episode> {
        let mut seen = std::collections::HashSet::new();
        episodes
            .into_iter()
            .filter(|e| match e.file.as_deref() {
                Some(file) if !file.is_empty() => seen.insert(file.to_string()),
                _ => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpisodeId, ShowId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn episode(show: &str, season: u32, number: u32, watched: bool) -> Episode {
        Episode {
            id: EpisodeId::new(format!("{show}-s{season:02}e{number:02}")),
            show_id: ShowId::new(show),
            title: format!("s{season:02}e{number:02}"),
            season,
            episode: number,
            watched,
            resume: if watched { 1.0 } else { 0.0 },
            last_played: None,
            file: None,
        }
    }

    fn show(id: &str, episodes: Vec<Episode>) -> Show {
        Show {
            id: ShowId::new(id),
            title: id.to_string(),
            episodes,
            random_order: false,
        }
    }

    fn resolve_sequential(show: &Show) -> Resolution {
        let mut rng = StdRng::seed_from_u64(7);
        TrackerService::resolve(show, SelectionMode::Unwatched, 50, &mut rng).unwrap()
    }

    fn resolved(resolution: Resolution) -> NextEpisodeState {
        match resolution {
            Resolution::Resolved(state) => state,
            Resolution::Excluded => panic!("expected a resolved show"),
        }
    }

    #[test]
    fn fresh_show_resolves_to_first_episode() {
        let show = show(
            "a",
            vec![
                episode("a", 1, 1, false),
                episode("a", 1, 2, false),
                episode("a", 2, 1, false),
            ],
        );
        let state = resolved(resolve_sequential(&show));
        assert_eq!(state.resolved_next, EpisodeId::new("a-s01e01"));
        assert_eq!(state.on_deck.len(), 3);
        assert!(state.off_deck.is_empty());
        assert!(!state.is_skipped);
    }

    #[test]
    fn contiguous_watch_resolves_to_successor() {
        let show = show(
            "a",
            vec![
                episode("a", 1, 1, true),
                episode("a", 1, 2, true),
                episode("a", 1, 3, false),
                episode("a", 2, 1, false),
            ],
        );
        let state = resolved(resolve_sequential(&show));
        assert_eq!(state.resolved_next, EpisodeId::new("a-s01e03"));
        assert_eq!(state.watched_count, 2);
        assert_eq!(state.unwatched_count, 2);
    }

    #[test]
    fn single_watched_mid_series_resolves_to_nearest_successor() {
        let show = show(
            "a",
            vec![
                episode("a", 1, 1, false),
                episode("a", 1, 2, true),
                episode("a", 1, 3, false),
                episode("a", 1, 4, false),
            ],
        );
        let state = resolved(resolve_sequential(&show));
        assert_eq!(state.resolved_next, EpisodeId::new("a-s01e03"));
        // The skipped pilot sits off-deck.
        assert_eq!(state.off_deck, vec![EpisodeId::new("a-s01e01")]);
    }

    #[test]
    fn offdeck_fallback_picks_earliest_skipped() {
        // Last episode watched, earlier ones skipped: nothing on deck.
        let show = show(
            "a",
            vec![
                episode("a", 1, 1, false),
                episode("a", 1, 2, false),
                episode("a", 1, 3, true),
            ],
        );
        let state = resolved(resolve_sequential(&show));
        assert!(state.on_deck.is_empty());
        assert_eq!(state.resolved_next, EpisodeId::new("a-s01e01"));
        assert!(state.is_skipped);
    }

    #[test]
    fn worked_example_advances_through_season_boundary() {
        // S01E01-E04 watched, S01E05-E06 and S02E01 unwatched.
        let mut episodes: Vec<Episode> = (1..=6)
            .map(|n| episode("a", 1, n, n <= 4))
            .collect();
        episodes.push(episode("a", 2, 1, false));
        let mut show = show("a", episodes);

        let state = resolved(resolve_sequential(&show));
        assert_eq!(state.resolved_next, EpisodeId::new("a-s01e05"));

        show.episodes[4].watched = true;
        let state = resolved(resolve_sequential(&show));
        assert_eq!(state.resolved_next, EpisodeId::new("a-s01e06"));
    }

    #[test]
    fn fully_watched_show_is_excluded() {
        let show = show("a", vec![episode("a", 1, 1, true), episode("a", 1, 2, true)]);
        assert!(matches!(resolve_sequential(&show), Resolution::Excluded));
    }

    #[test]
    fn zero_episode_show_is_excluded() {
        let show = show("a", vec![]);
        assert!(matches!(resolve_sequential(&show), Resolution::Excluded));
    }

    #[test]
    fn watched_mode_excludes_untouched_show() {
        let show = show("a", vec![episode("a", 1, 1, false)]);
        let mut rng = StdRng::seed_from_u64(7);
        let resolution =
            TrackerService::resolve(&show, SelectionMode::Watched, 50, &mut rng).unwrap();
        assert!(matches!(resolution, Resolution::Excluded));
    }

    #[test]
    fn malformed_ordering_is_a_data_integrity_error() {
        let show = show("a", vec![episode("a", 1, 2, false), episode("a", 1, 1, false)]);
        let err = resolve_err(&show);
        assert!(matches!(err, EngineError::DataIntegrity { .. }));
    }

    fn resolve_err(show: &Show) -> EngineError {
        let mut rng = StdRng::seed_from_u64(7);
        TrackerService::resolve(show, SelectionMode::Unwatched, 50, &mut rng).unwrap_err()
    }

    #[test]
    fn duplicate_file_keeps_lowest_episode() {
        let mut e1 = episode("a", 1, 1, false);
        let mut e2 = episode("a", 1, 2, false);
        e1.file = Some("/media/a/s01e01e02.mkv".into());
        e2.file = Some("/media/a/s01e01e02.mkv".into());
        let show = show("a", vec![e1, e2, episode("a", 1, 3, false)]);

        let state = resolved(resolve_sequential(&show));
        assert_eq!(
            state.on_deck,
            vec![EpisodeId::new("a-s01e01"), EpisodeId::new("a-s01e03")]
        );
    }

    #[test]
    fn random_order_unwatched_draw_is_roughly_uniform() {
        let mut show = show(
            "a",
            vec![
                episode("a", 1, 1, false),
                episode("a", 1, 2, false),
                episode("a", 1, 3, true),
                episode("a", 1, 4, false),
                episode("a", 1, 5, false),
            ],
        );
        show.random_order = true;

        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<EpisodeId, u32> = HashMap::new();
        let trials = 4000;
        for _ in 0..trials {
            let state = resolved(
                TrackerService::resolve(&show, SelectionMode::Unwatched, 50, &mut rng).unwrap(),
            );
            *counts.entry(state.resolved_next).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        let expected = trials as f64 / 4.0;
        for (id, count) in counts {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(
                deviation < 0.15,
                "episode {id} drawn {count} times, expected ~{expected}"
            );
        }
    }

    #[test]
    fn both_mode_respects_unwatched_chance_extremes() {
        let show = show(
            "a",
            vec![
                episode("a", 1, 1, true),
                episode("a", 1, 2, false),
                episode("a", 1, 3, false),
            ],
        );

        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let state = resolved(
                TrackerService::resolve(&show, SelectionMode::Both, 100, &mut rng).unwrap(),
            );
            assert_eq!(state.resolved_next, EpisodeId::new("a-s01e02"));
        }
        for _ in 0..200 {
            let state = resolved(
                TrackerService::resolve(&show, SelectionMode::Both, 0, &mut rng).unwrap(),
            );
            assert_eq!(state.resolved_next, EpisodeId::new("a-s01e01"));
        }
    }
}
