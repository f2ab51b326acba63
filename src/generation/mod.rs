//! Group playlist generation.
//!
//! A run for one event goes through fixed stages, each merging tracks into
//! a per-run [`CandidatePool`]:
//! 1. Refresh every member's credential (owner mandatory)
//! 2. Tracks present in every member's playlist library
//! 3. Top tracks of artists every member has in their top artists
//! 4. Genre-seeded recommendations, repeated until the pool is full
//!    or an iteration adds nothing
//! 5. Publish the pool as a remote playlist

pub mod common_library;
pub mod context;
pub mod credentials;
pub mod genre_recommendations;
pub mod lock;
pub mod materialize;
pub mod orchestrator;
pub mod pool;
pub mod top_tracks;

pub use context::GenerationContext;
pub use lock::{EventLockGuard, EventLocks};
pub use orchestrator::PlaylistGenerator;
pub use pool::{CandidatePool, Contribution};

use crate::models::AccessToken;
use serde::Serialize;

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub playlist_id: String,
    /// Freshly refreshed owner credential, handed back to the caller
    pub owner_token: AccessToken,
    /// Tracks submitted to the remote playlist
    pub submitted: usize,
    pub pool_size: usize,
}
