mod types;

pub use types::{EngineEvent, EngineEventKind};
