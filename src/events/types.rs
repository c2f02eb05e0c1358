use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ItemKey, ShowId};

/// An event consumed by the background worker's bounded queue.
///
/// Each event triggers a scoped partial recompute; a full rescan only
/// happens on startup or on the periodic interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub id: String,
    pub kind: EngineEventKind,
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(kind: EngineEventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEventKind {
    /// Playback of one item finished; only its show (if any) is recomputed.
    PlaybackFinished { item: ItemKey },
    /// The library changed. With a show id the recompute is scoped to that
    /// show; without one the next periodic rescan covers it.
    LibraryChanged { show_id: Option<ShowId> },
    /// Configuration changed; random-order membership may have moved, so
    /// affected shows are re-resolved.
    SettingsChanged,
    /// The viewing session ended (playback stopped by the user or the
    /// embedder shut down). Clears the session exclusion set.
    SessionEnded,
    /// On-demand request for a full rescan.
    RefreshRequested,
}

impl EngineEventKind {
    /// Event name for log fields and routing.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineEventKind::PlaybackFinished { .. } => "playback.finished",
            EngineEventKind::LibraryChanged { .. } => "library.changed",
            EngineEventKind::SettingsChanged => "settings.changed",
            EngineEventKind::SessionEnded => "session.ended",
            EngineEventKind::RefreshRequested => "refresh.requested",
        }
    }
}
