pub mod memory;
pub mod traits;

pub use memory::MemoryCatalog;
pub use traits::{MediaCatalog, SharedWatchStore};
