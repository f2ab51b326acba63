use crate::catalog::CatalogError;
use crate::models::TrackStatus;
use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Terminal error of a generation run. Soft failures never get here; they
/// are logged by the stage that hit them.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum GenerationError {
    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Event {0} has no owner")]
    OwnerNotFound(String),

    #[error("Owner credential refresh failed: {0}")]
    OwnerCredential(String),

    #[error("Playlist creation failed: {0}")]
    PlaylistCreation(String),

    #[error("Generation already running for event {0}")]
    AlreadyRunning(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors of the manual curation operations.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum CurationError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Status {0} cannot be set by hand")]
    ForbiddenStatus(TrackStatus),

    #[error("Track {0} is already part of the event")]
    AlreadyPresent(String),

    #[error("Playlist {0} has no tracks")]
    EmptyPlaylist(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
