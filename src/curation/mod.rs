//! Manual curation of an event's tracks and generated playlists.

use crate::catalog::{describe_track, CatalogClient};
use crate::config::SAVE_BATCH_SIZE;
use crate::errors::CurationError;
use crate::models::{track_uri, AccessToken, Playlist, TrackAssociation, TrackStatus};
use crate::store::EventStore;
use std::sync::Arc;

pub struct TrackCurator {
    store: Arc<dyn EventStore>,
    catalog: Arc<dyn CatalogClient>,
    save_batch_size: usize,
}

impl TrackCurator {
    pub fn new(store: Arc<dyn EventStore>, catalog: Arc<dyn CatalogClient>) -> Self {
        Self {
            store,
            catalog,
            save_batch_size: SAVE_BATCH_SIZE,
        }
    }

    pub fn with_save_batch_size(mut self, size: usize) -> Self {
        self.save_batch_size = size.clamp(1, SAVE_BATCH_SIZE);
        self
    }

    /// Set a status by hand. Only the levels an admin may choose are accepted.
    pub async fn set_track_status(
        &self,
        event_id: &str,
        track_id: &str,
        status: TrackStatus,
    ) -> Result<TrackAssociation, CurationError> {
        if !status.is_manual() {
            return Err(CurationError::ForbiddenStatus(status));
        }

        let mut association = self
            .store
            .find_association(event_id, track_id)
            .await?
            .ok_or_else(|| {
                CurationError::NotFound(format!("track {} in event {}", track_id, event_id))
            })?;

        association.status = status;
        self.store.upsert_association(&association).await?;
        log::info!("Track {} of event {} set to {}", track_id, event_id, status);
        Ok(association)
    }

    /// Suggest a track for the event.
    pub async fn propose_track(
        &self,
        event_id: &str,
        track_id: &str,
        token: &AccessToken,
    ) -> Result<TrackAssociation, CurationError> {
        if self
            .store
            .find_association(event_id, track_id)
            .await?
            .is_some()
        {
            return Err(CurationError::AlreadyPresent(track_id.to_string()));
        }

        if self.store.find_track(track_id).await?.is_none() {
            let track = describe_track(self.catalog.as_ref(), token, track_id).await?;
            self.store.insert_track(&track).await?;
        }

        let association = TrackAssociation::new(event_id, track_id, TrackStatus::Proposed);
        if !self.store.insert_association_if_absent(&association).await? {
            return Err(CurationError::AlreadyPresent(track_id.to_string()));
        }
        log::info!("Track {} proposed for event {}", track_id, event_id);
        Ok(association)
    }

    pub async fn remove_track(&self, event_id: &str, track_id: &str) -> Result<(), CurationError> {
        if !self.store.delete_association(event_id, track_id).await? {
            return Err(CurationError::NotFound(format!(
                "track {} in event {}",
                track_id, event_id
            )));
        }
        Ok(())
    }

    /// Accept a generated playlist: its proposed tracks become
    /// `AcceptedPlaylist` and the playlist is flagged accepted.
    pub async fn accept_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Playlist, CurationError> {
        let mut playlist = self.find_playlist(event_id, playlist_id).await?;

        let mut promoted = 0;
        for mut association in self.store.playlist_associations(event_id, playlist_id).await? {
            if association.status == TrackStatus::Proposed {
                association.status = TrackStatus::AcceptedPlaylist;
                self.store.upsert_association(&association).await?;
                promoted += 1;
            }
        }

        self.store
            .set_playlist_accepted(event_id, playlist_id, true)
            .await?;
        playlist.accepted = true;
        log::info!(
            "Playlist {} accepted, {} proposed tracks promoted",
            playlist_id,
            promoted
        );
        Ok(playlist)
    }

    /// Forget a generated playlist. Its tracks stay in the event.
    pub async fn remove_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<(), CurationError> {
        if !self.store.delete_playlist(event_id, playlist_id).await? {
            return Err(CurationError::NotFound(format!("playlist {}", playlist_id)));
        }
        Ok(())
    }

    /// Overwrite the remote playlist with the tracks linked to it.
    /// Returns the number of tracks written.
    pub async fn save_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
        token: &AccessToken,
    ) -> Result<usize, CurationError> {
        self.find_playlist(event_id, playlist_id).await?;

        let uris: Vec<String> = self
            .store
            .playlist_associations(event_id, playlist_id)
            .await?
            .iter()
            .map(|a| track_uri(&a.track_id))
            .collect();
        if uris.is_empty() {
            return Err(CurationError::EmptyPlaylist(playlist_id.to_string()));
        }

        self.catalog
            .replace_all_tracks(token, playlist_id, &uris, self.save_batch_size)
            .await?;
        log::info!("Saved {} tracks to playlist {}", uris.len(), playlist_id);
        Ok(uris.len())
    }

    async fn find_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Playlist, CurationError> {
        self.store
            .find_playlist(event_id, playlist_id)
            .await?
            .ok_or_else(|| CurationError::NotFound(format!("playlist {}", playlist_id)))
    }
}
