use thiserror::Error;

use crate::models::ShowId;

/// Engine error taxonomy.
///
/// Errors local to one show or movie never abort a whole build; the engine
/// degrades by omission. Only `CatalogUnavailable` at startup is fatal.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed episode ordering from the catalog adapter. Fatal to that
    /// show's resolution only; the show is excluded and the error logged.
    #[error("data integrity violation for show {show}: {detail}")]
    DataIntegrity { show: ShowId, detail: String },

    /// No shows or movies match the active filters at all. Distinct from a
    /// transient failure: there is genuinely nothing to play.
    #[error("no shows or movies match the current filters")]
    EmptyResult,

    /// Shared watch storage could not be reached. The reconciliation cycle
    /// is skipped and the engine continues on last-known state.
    #[error("shared watch store unavailable: {0}")]
    SyncUnavailable(String),

    /// The media catalog could not be reached at startup.
    #[error("media catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A catalog or store call exceeded its deadline.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
