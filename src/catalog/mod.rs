//! Boundary to the remote music catalog.
//!
//! Generation only talks to the catalog through [`CatalogClient`] and
//! [`CredentialRefresher`], so the Spotify implementation can be swapped
//! for a scripted one in tests.

pub mod error;
pub mod metadata;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{AuthError, CatalogError};
pub use metadata::describe_track;
pub use retry::RetryingCatalog;
pub use traits::{CatalogClient, CredentialRefresher};
pub use types::{ArtistSummary, PlaylistSummary, RecommendedTrack, TrackDetails};
