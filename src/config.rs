use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::models::ShowId;

/// Which episodes/movies a selection draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Unwatched,
    Watched,
    Both,
}

/// What content types a playlist build may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    TvOnly,
    TvAndMovies,
    MoviesOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub playlist: PlaylistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between periodic bulk rescans.
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    /// Deadline for a single catalog query before the cycle is skipped.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Capacity of the worker's event queue.
    #[serde(default = "default_event_queue")]
    pub event_queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between reconciliation passes against shared storage.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// Deadline for one shared-store round trip.
    #[serde(default = "default_query_timeout")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Target playlist length, clamped to 1..=50 at build time.
    #[serde(default = "default_length")]
    pub length: usize,

    #[serde(default = "default_content_mode")]
    pub content: ContentMode,

    #[serde(default = "default_selection")]
    pub episode_selection: SelectionMode,

    #[serde(default = "default_selection")]
    pub movie_selection: SelectionMode,

    /// Chance (0-100) of preferring the unwatched pool in `Both` mode.
    #[serde(default = "default_unwatched_chance")]
    pub unwatched_chance: u8,

    /// Movie-to-TV weight ratio in 0.0..=1.0. 0.0 means never draw a
    /// movie; 1.0 means movies and TV are drawn with equal probability.
    #[serde(default = "default_movie_ratio")]
    pub movie_ratio: f64,

    /// Allow one show to contribute more than one playlist slot.
    #[serde(default)]
    pub allow_same_show: bool,

    #[serde(default = "default_true")]
    pub prioritize_partial_episodes: bool,

    #[serde(default = "default_true")]
    pub prioritize_partial_movies: bool,

    /// Include series premieres (S01E01) as candidates.
    #[serde(default = "default_true")]
    pub include_series_premieres: bool,

    /// Include season premieres (S02E01, S03E01, ...) as candidates.
    #[serde(default = "default_true")]
    pub include_season_premieres: bool,

    /// Stamp emitted items with a seek-to-resume-point directive.
    #[serde(default = "default_true")]
    pub resume_partials: bool,

    /// Shows whose next-episode selection ignores sequential order.
    #[serde(default)]
    pub random_order_shows: Vec<ShowId>,

    /// Restrict candidate shows to this set when non-empty.
    #[serde(default)]
    pub show_filter: Vec<ShowId>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            debug!("Loading config from {:?}", config_path);
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            info!("Config loaded successfully");
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", config_path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("ondeck").join("config.toml"))
    }
}

impl PlaylistConfig {
    /// Length clamped to the supported 1..=50 range.
    pub fn bounded_length(&self) -> usize {
        self.length.clamp(1, 50)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh: RefreshConfig::default(),
            sync: SyncConfig::default(),
            playlist: PlaylistConfig::default(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            query_timeout_secs: default_query_timeout(),
            event_queue_capacity: default_event_queue(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sync_interval(),
            fetch_timeout_secs: default_query_timeout(),
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            length: default_length(),
            content: default_content_mode(),
            episode_selection: default_selection(),
            movie_selection: default_selection(),
            unwatched_chance: default_unwatched_chance(),
            movie_ratio: default_movie_ratio(),
            allow_same_show: false,
            prioritize_partial_episodes: default_true(),
            prioritize_partial_movies: default_true(),
            include_series_premieres: default_true(),
            include_season_premieres: default_true(),
            resume_partials: default_true(),
            random_order_shows: Vec::new(),
            show_filter: Vec::new(),
        }
    }
}

// Default value functions
fn default_refresh_interval() -> u64 {
    900
}
fn default_sync_interval() -> u64 {
    300
}
fn default_query_timeout() -> u64 {
    10
}
fn default_event_queue() -> usize {
    64
}
fn default_length() -> usize {
    10
}
fn default_content_mode() -> ContentMode {
    ContentMode::TvAndMovies
}
fn default_selection() -> SelectionMode {
    SelectionMode::Unwatched
}
fn default_unwatched_chance() -> u8 {
    50
}
fn default_movie_ratio() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}
