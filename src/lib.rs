//! Next-episode resolution and weighted playlist scheduling over a host
//! media library.
//!
//! The engine caches a view of the library, resolves one "correct" next
//! episode per show, indexes in-progress items by recency, and composes
//! bounded playback queues under ratio and prioritization rules. A single
//! background worker owns all mutation; embedders read committed
//! snapshots through [`services::WorkerHandle`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod state;

pub use catalog::{MediaCatalog, MemoryCatalog, SharedWatchStore};
pub use config::{Config, ContentMode, PlaylistConfig, SelectionMode};
pub use error::EngineError;
pub use events::{EngineEvent, EngineEventKind};
pub use services::{EngineWorker, WorkerHandle};
pub use services::core::{PartialIndex, PlaylistBuilder, ShowBuckets, TrackerService};

/// Install the default tracing subscriber, honoring `RUST_LOG` when set.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ondeck=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
