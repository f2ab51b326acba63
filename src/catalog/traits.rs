use super::error::{AuthError, CatalogError};
use super::types::{ArtistSummary, PlaylistSummary, RecommendedTrack, TrackDetails};
use crate::models::{AccessToken, Member};
use async_trait::async_trait;
use std::collections::HashSet;

/// Typed façade over the remote catalog. Every call carries the bearer
/// credential it runs under.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Playlists in the user's library
    async fn list_playlists(&self, token: &AccessToken)
        -> Result<Vec<PlaylistSummary>, CatalogError>;

    /// Track ids of a playlist, skipping entries that aren't tracks
    async fn list_playlist_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<String>, CatalogError>;

    async fn top_artists(
        &self,
        token: &AccessToken,
        limit: usize,
    ) -> Result<Vec<ArtistSummary>, CatalogError>;

    async fn artist_top_tracks(
        &self,
        token: &AccessToken,
        artist_id: &str,
        market: &str,
        limit: usize,
    ) -> Result<Vec<String>, CatalogError>;

    async fn artist_genres(
        &self,
        token: &AccessToken,
        artist_id: &str,
    ) -> Result<Vec<String>, CatalogError>;

    /// Genres accepted as recommendation seeds
    async fn genre_seeds(&self, token: &AccessToken) -> Result<HashSet<String>, CatalogError>;

    async fn recommendations(
        &self,
        token: &AccessToken,
        genres: &[String],
        limit: usize,
    ) -> Result<Vec<RecommendedTrack>, CatalogError>;

    async fn get_track(
        &self,
        token: &AccessToken,
        track_id: &str,
    ) -> Result<TrackDetails, CatalogError>;

    /// Create a playlist owned by `owner_id`, returning its id
    async fn create_playlist(
        &self,
        token: &AccessToken,
        owner_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String, CatalogError>;

    async fn add_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError>;

    /// Remove every track from the playlist, then insert `uris` in
    /// batches of at most `batch_size`.
    async fn replace_all_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
        batch_size: usize,
    ) -> Result<(), CatalogError>;
}

/// Exchanges a member's stored refresh credential for a fresh access token.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self, member: &Member) -> Result<AccessToken, AuthError>;
}
