//! End-to-end exercises over the in-memory catalog: worker lifecycle,
//! playback-driven recomputes, reconciliation, and full playlist builds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use ondeck::catalog::MemoryCatalog;
use ondeck::config::{Config, ContentMode};
use ondeck::models::{
    Episode, EpisodeId, ItemKey, MediaItem, Movie, MovieId, Show, ShowId, WatchStateChange,
    WatchTarget,
};
use ondeck::services::core::PlaylistBuilder;
use ondeck::state::LibraryView;
use ondeck::{EngineError, EngineEventKind, EngineWorker};

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

fn movie(id: &str) -> Movie {
    Movie {
        id: MovieId::new(id),
        title: id.to_string(),
        watched: false,
        resume: 0.0,
        last_played: None,
    }
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition never became true"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn watching_through_a_season_boundary_advances_the_resolution() {
    let catalog = MemoryCatalog::new();
    let mut episodes: Vec<Episode> = (1..=6).map(|n| episode("drama", 1, n, n <= 4)).collect();
    episodes.push(episode("drama", 2, 1, false));
    catalog.insert_show(show("drama", episodes)).await;

    let worker = EngineWorker::new(Arc::new(catalog.clone()), None, Config::default());
    let handle = worker.start().await.unwrap();
    let drama = ShowId::new("drama");

    let state = handle.next_state(&drama).await.unwrap();
    assert_eq!(state.resolved_next, EpisodeId::new("drama-s01e05"));
    assert_eq!(state.resolved_season, 1);
    assert_eq!(state.resolved_episode, 5);
    assert!(!state.is_skipped);

    catalog
        .set_episode_watched(&drama, &EpisodeId::new("drama-s01e05"), true)
        .await;
    handle.notify(EngineEventKind::PlaybackFinished {
        item: ItemKey::Episode(EpisodeId::new("drama-s01e05")),
    });

    let probe = handle.clone();
    let target = drama.clone();
    wait_for(move || {
        let probe = probe.clone();
        let target = target.clone();
        async move {
            probe
                .next_state(&target)
                .await
                .is_some_and(|s| s.resolved_next == EpisodeId::new("drama-s01e06"))
        }
    })
    .await;
    handle.stop().await;
}

#[tokio::test]
async fn skipped_pilot_resolves_via_offdeck_fallback() {
    let catalog = MemoryCatalog::new();
    catalog
        .insert_show(show(
            "oneoff",
            vec![
                episode("oneoff", 1, 1, false),
                episode("oneoff", 1, 2, true),
            ],
        ))
        .await;

    let worker = EngineWorker::new(Arc::new(catalog), None, Config::default());
    let handle = worker.start().await.unwrap();

    let state = handle.next_state(&ShowId::new("oneoff")).await.unwrap();
    assert_eq!(state.resolved_next, EpisodeId::new("oneoff-s01e01"));
    assert!(state.is_skipped);
    assert!(state.on_deck.is_empty());
    handle.stop().await;
}

#[tokio::test]
async fn buckets_split_fresh_starts_from_continues() {
    let catalog = MemoryCatalog::new();
    catalog
        .insert_show(show("fresh", vec![episode("fresh", 1, 1, false)]))
        .await;
    catalog
        .insert_show(show(
            "midway",
            vec![episode("midway", 1, 1, true), episode("midway", 1, 2, false)],
        ))
        .await;
    catalog
        .insert_show(show("done", vec![episode("done", 1, 1, true)]))
        .await;

    let worker = EngineWorker::new(Arc::new(catalog), None, Config::default());
    let handle = worker.start().await.unwrap();

    let buckets = handle.buckets().await;
    assert!(buckets.start_fresh.contains(&ShowId::new("fresh")));
    assert!(buckets.continue_watching.contains(&ShowId::new("midway")));
    assert!(!buckets.contains(&ShowId::new("done")));
    handle.stop().await;
}

#[tokio::test]
async fn random_order_show_draws_roughly_uniformly() {
    let mut library_show = show(
        "grab-bag",
        (1..=4).map(|n| episode("grab-bag", 1, n, false)).collect(),
    );
    library_show.random_order = true;
    let library = LibraryView::from_parts(vec![library_show], vec![]);

    let mut config = Config::default().playlist;
    config.length = 1;
    config.prioritize_partial_episodes = false;

    let mut rng = StdRng::seed_from_u64(1234);
    let mut counts: HashMap<EpisodeId, u32> = HashMap::new();
    let trials = 2000;
    for _ in 0..trials {
        let playlist = PlaylistBuilder::build(&library, &config, &HashSet::new(), &mut rng)
            .unwrap();
        let MediaItem::Episode(e) = &playlist[0].item else {
            panic!("expected an episode");
        };
        *counts.entry(e.id.clone()).or_default() += 1;
    }

    assert_eq!(counts.len(), 4);
    let expected = trials as f64 / 4.0;
    for (id, count) in counts {
        let deviation = (count as f64 - expected).abs() / expected;
        assert!(deviation < 0.15, "{id} drawn {count} times");
    }
}

#[tokio::test]
async fn partial_items_lead_the_playlist_by_recency() {
    let catalog = MemoryCatalog::new();
    let now = Utc::now();
    for (name, minutes_ago) in [("slow", 45i64), ("recent", 5), ("middle", 20)] {
        let mut in_progress = episode(name, 1, 2, false);
        in_progress.resume = 0.3;
        in_progress.last_played = Some(now - ChronoDuration::minutes(minutes_ago));
        catalog
            .insert_show(show(name, vec![episode(name, 1, 1, true), in_progress]))
            .await;
    }
    catalog
        .insert_show(show("filler", vec![episode("filler", 1, 2, false)]))
        .await;

    let worker = EngineWorker::new(Arc::new(catalog), None, Config::default());
    let handle = worker.start().await.unwrap();

    let playlist = handle.build_playlist().await.unwrap();
    let leads: Vec<&str> = playlist[..3]
        .iter()
        .map(|p| match &p.item {
            MediaItem::Episode(e) => e.show_id.as_str(),
            MediaItem::Movie(_) => panic!("expected episodes"),
        })
        .collect();
    assert_eq!(leads, vec!["recent", "middle", "slow"]);
    assert!(playlist[0].resume_from_position);
    handle.stop().await;
}

#[tokio::test]
async fn zero_movie_ratio_builds_tv_only_playlists() {
    let catalog = MemoryCatalog::new();
    for n in 0..5 {
        let name = format!("show{n}");
        catalog
            .insert_show(show(&name, vec![episode(&name, 1, 2, false)]))
            .await;
        catalog.insert_movie(movie(&format!("movie{n}"))).await;
    }

    let mut config = Config::default();
    config.playlist.content = ContentMode::TvAndMovies;
    config.playlist.movie_ratio = 0.0;
    config.playlist.length = 5;

    let worker = EngineWorker::new(Arc::new(catalog), None, config);
    let handle = worker.start().await.unwrap();

    let playlist = handle.build_playlist().await.unwrap();
    assert_eq!(playlist.len(), 5);
    assert!(
        playlist
            .iter()
            .all(|p| matches!(p.item, MediaItem::Episode(_)))
    );
    handle.stop().await;
}

#[tokio::test]
async fn continue_playlist_excludes_the_current_session() {
    let catalog = MemoryCatalog::new();
    for n in 0..4 {
        let name = format!("show{n}");
        catalog
            .insert_show(show(&name, vec![episode(&name, 1, 2, false)]))
            .await;
    }

    let mut config = Config::default();
    config.playlist.length = 2;
    let worker = EngineWorker::new(Arc::new(catalog), None, config);
    let handle = worker.start().await.unwrap();

    let first = handle.build_playlist().await.unwrap();
    let second = handle.build_playlist().await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);

    let first_keys: HashSet<ItemKey> = first.iter().map(|p| p.item.key()).collect();
    assert!(second.iter().all(|p| !first_keys.contains(&p.item.key())));

    // The whole pool is spent now.
    assert!(matches!(
        handle.build_playlist().await,
        Err(EngineError::EmptyResult)
    ));
    handle.stop().await;
}

#[tokio::test]
async fn reconciled_remote_watch_moves_the_frontier() {
    let catalog = MemoryCatalog::new();
    catalog
        .insert_show(show(
            "shared",
            vec![
                episode("shared", 1, 1, false),
                episode("shared", 1, 2, false),
            ],
        ))
        .await;

    let mut config = Config::default();
    config.sync.enabled = true;
    let worker = EngineWorker::new(
        Arc::new(catalog.clone()),
        Some(Arc::new(catalog.clone())),
        config,
    );
    let handle = worker.start().await.unwrap();

    let state = handle.next_state(&ShowId::new("shared")).await.unwrap();
    assert_eq!(state.resolved_next, EpisodeId::new("shared-s01e01"));

    // Another instance watched the pilot.
    catalog
        .record_change(WatchStateChange {
            target: WatchTarget::Episode {
                show_id: ShowId::new("shared"),
                id: EpisodeId::new("shared-s01e01"),
            },
            watched: true,
            resume: 1.0,
            changed_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        })
        .await;

    // The pre-build reconciliation picks the change up.
    let playlist = handle.build_playlist().await.unwrap();
    let MediaItem::Episode(e) = &playlist[0].item else {
        panic!("expected an episode");
    };
    assert_eq!(e.id, EpisodeId::new("shared-s01e02"));

    // Replaying the same change must not flap anything.
    let library = handle.state().library_snapshot().await;
    assert!(library.shows[&ShowId::new("shared")].episodes[0].watched);
    handle.stop().await;
}

#[tokio::test]
async fn unreachable_shared_store_degrades_to_local_state() {
    let catalog = MemoryCatalog::new();
    catalog
        .insert_show(show("solo", vec![episode("solo", 1, 1, false)]))
        .await;
    let store = MemoryCatalog::new();
    store.set_unavailable(true).await;

    let mut config = Config::default();
    config.sync.enabled = true;
    let worker = EngineWorker::new(Arc::new(catalog), Some(Arc::new(store)), config);
    let handle = worker.start().await.unwrap();

    // Builds keep working off last-known state.
    let playlist = handle.build_playlist().await.unwrap();
    assert_eq!(playlist.len(), 1);
    handle.stop().await;
}

#[tokio::test]
async fn library_change_event_drops_a_removed_show() {
    let catalog = MemoryCatalog::new();
    catalog
        .insert_show(show("keep", vec![episode("keep", 1, 1, false)]))
        .await;
    catalog
        .insert_show(show("gone", vec![episode("gone", 1, 1, false)]))
        .await;

    let worker = EngineWorker::new(Arc::new(catalog.clone()), None, Config::default());
    let handle = worker.start().await.unwrap();
    assert!(handle.next_state(&ShowId::new("gone")).await.is_some());

    catalog.remove_show(&ShowId::new("gone")).await;
    handle.notify(EngineEventKind::LibraryChanged {
        show_id: Some(ShowId::new("gone")),
    });

    let probe = handle.clone();
    wait_for(move || {
        let probe = probe.clone();
        async move { probe.next_state(&ShowId::new("gone")).await.is_none() }
    })
    .await;
    assert!(handle.next_state(&ShowId::new("keep")).await.is_some());
    handle.stop().await;
}
