pub mod catalog;
pub mod config;
pub mod curation;
pub mod errors;
pub mod generation;
pub mod models;
pub mod spotify;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{CatalogClient, CredentialRefresher, RetryingCatalog};
pub use config::{AppConfig, GeneratorSettings, RetryPolicy};
pub use curation::TrackCurator;
pub use errors::{CurationError, GenerationError};
pub use generation::{GenerationOutcome, PlaylistGenerator};
pub use store::{EventStore, MemoryStore, SqliteStore};
