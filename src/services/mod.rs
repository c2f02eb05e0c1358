pub mod core;
mod worker;

pub use worker::{EngineWorker, WorkerHandle};
