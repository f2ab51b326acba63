//! Durable storage of events, members, tracks and generation results.
//!
//! Writes are plain upserts without version checks; concurrent writers
//! resolve as last-writer-wins.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::models::{AccessToken, Event, Member, Playlist, Track, TrackAssociation};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage setup failed: {0}")]
    Setup(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Setup(e.to_string())
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, StoreError>;
    async fn upsert_event(&self, event: &Event) -> Result<(), StoreError>;

    async fn list_members(&self, event_id: &str) -> Result<Vec<Member>, StoreError>;
    async fn upsert_member(&self, member: &Member) -> Result<(), StoreError>;
    /// Remember the latest access token issued for a user
    async fn save_access_token(&self, user_id: &str, token: &AccessToken)
        -> Result<(), StoreError>;

    async fn find_track(&self, track_id: &str) -> Result<Option<Track>, StoreError>;
    /// Insert unless a track with the same id exists. Returns whether it inserted.
    async fn insert_track(&self, track: &Track) -> Result<bool, StoreError>;

    async fn find_association(
        &self,
        event_id: &str,
        track_id: &str,
    ) -> Result<Option<TrackAssociation>, StoreError>;
    async fn list_associations(&self, event_id: &str)
        -> Result<Vec<TrackAssociation>, StoreError>;
    /// Insert or overwrite the association of (event, track).
    async fn upsert_association(&self, association: &TrackAssociation) -> Result<(), StoreError>;
    /// Insert only when (event, track) has no association yet.
    async fn insert_association_if_absent(
        &self,
        association: &TrackAssociation,
    ) -> Result<bool, StoreError>;
    async fn delete_association(&self, event_id: &str, track_id: &str)
        -> Result<bool, StoreError>;

    async fn insert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError>;
    async fn find_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Option<Playlist>, StoreError>;
    async fn list_playlists(&self, event_id: &str) -> Result<Vec<Playlist>, StoreError>;
    async fn set_playlist_accepted(
        &self,
        event_id: &str,
        playlist_id: &str,
        accepted: bool,
    ) -> Result<(), StoreError>;
    async fn delete_playlist(&self, event_id: &str, playlist_id: &str)
        -> Result<bool, StoreError>;

    /// Link a track of the event to a playlist, appended at the end.
    /// Linking the same track twice is a no-op.
    async fn link_playlist_track(
        &self,
        event_id: &str,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<(), StoreError>;
    /// Associations linked to the playlist, in playlist order.
    async fn playlist_associations(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Vec<TrackAssociation>, StoreError>;

    /// Remove every association and playlist of the event.
    async fn reset_generation(&self, event_id: &str) -> Result<(), StoreError>;
}
