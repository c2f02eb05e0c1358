pub mod buckets;
pub mod partials;
pub mod playlist;
pub mod sync;
pub mod tracker;

pub use buckets::ShowBuckets;
pub use partials::PartialIndex;
pub use playlist::PlaylistBuilder;
pub use sync::SyncReconciler;
pub use tracker::{Resolution, TrackerService};
