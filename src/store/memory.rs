use super::{EventStore, StoreError};
use crate::models::{AccessToken, Event, Member, Playlist, Track, TrackAssociation};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    events: HashMap<String, Event>,
    members: Vec<Member>,
    access_tokens: HashMap<String, AccessToken>,
    tracks: HashMap<String, Track>,
    associations: Vec<TrackAssociation>,
    playlists: Vec<Playlist>,
    /// (playlist_id, event_id, track_id) in insertion order
    links: Vec<(String, String, String)>,
}

/// In-process [`EventStore`] kept entirely in maps.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn access_token(&self, user_id: &str) -> Option<AccessToken> {
        self.state.read().await.access_tokens.get(user_id).cloned()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, StoreError> {
        Ok(self.state.read().await.events.get(event_id).cloned())
    }

    async fn upsert_event(&self, event: &Event) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .events
            .insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn list_members(&self, event_id: &str) -> Result<Vec<Member>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .members
            .iter()
            .filter(|m| m.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn upsert_member(&self, member: &Member) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state
            .members
            .iter_mut()
            .find(|m| m.event_id == member.event_id && m.user_id == member.user_id)
        {
            Some(existing) => *existing = member.clone(),
            None => state.members.push(member.clone()),
        }
        Ok(())
    }

    async fn save_access_token(
        &self,
        user_id: &str,
        token: &AccessToken,
    ) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .access_tokens
            .insert(user_id.to_string(), token.clone());
        Ok(())
    }

    async fn find_track(&self, track_id: &str) -> Result<Option<Track>, StoreError> {
        Ok(self.state.read().await.tracks.get(track_id).cloned())
    }

    async fn insert_track(&self, track: &Track) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.tracks.contains_key(&track.id) {
            return Ok(false);
        }
        state.tracks.insert(track.id.clone(), track.clone());
        Ok(true)
    }

    async fn find_association(
        &self,
        event_id: &str,
        track_id: &str,
    ) -> Result<Option<TrackAssociation>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .associations
            .iter()
            .find(|a| a.event_id == event_id && a.track_id == track_id)
            .cloned())
    }

    async fn list_associations(
        &self,
        event_id: &str,
    ) -> Result<Vec<TrackAssociation>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .associations
            .iter()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn upsert_association(&self, association: &TrackAssociation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.associations.iter_mut().find(|a| {
            a.event_id == association.event_id && a.track_id == association.track_id
        }) {
            Some(existing) => existing.status = association.status,
            None => state.associations.push(association.clone()),
        }
        Ok(())
    }

    async fn insert_association_if_absent(
        &self,
        association: &TrackAssociation,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let exists = state.associations.iter().any(|a| {
            a.event_id == association.event_id && a.track_id == association.track_id
        });
        if exists {
            return Ok(false);
        }
        state.associations.push(association.clone());
        Ok(true)
    }

    async fn delete_association(
        &self,
        event_id: &str,
        track_id: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.associations.len();
        state
            .associations
            .retain(|a| !(a.event_id == event_id && a.track_id == track_id));
        state
            .links
            .retain(|(_, e, t)| !(e == event_id && t == track_id));
        Ok(state.associations.len() != before)
    }

    async fn insert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.playlists.retain(|p| p.id != playlist.id);
        state.playlists.push(playlist.clone());
        Ok(())
    }

    async fn find_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Option<Playlist>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .playlists
            .iter()
            .find(|p| p.event_id == event_id && p.id == playlist_id)
            .cloned())
    }

    async fn list_playlists(&self, event_id: &str) -> Result<Vec<Playlist>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .playlists
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn set_playlist_accepted(
        &self,
        event_id: &str,
        playlist_id: &str,
        accepted: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(playlist) = state
            .playlists
            .iter_mut()
            .find(|p| p.event_id == event_id && p.id == playlist_id)
        {
            playlist.accepted = accepted;
        }
        Ok(())
    }

    async fn delete_playlist(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.playlists.len();
        state
            .playlists
            .retain(|p| !(p.event_id == event_id && p.id == playlist_id));
        state.links.retain(|(p, e, _)| !(p == playlist_id && e == event_id));
        Ok(state.playlists.len() != before)
    }

    async fn link_playlist_track(
        &self,
        event_id: &str,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let exists = state
            .links
            .iter()
            .any(|(p, _, t)| p == playlist_id && t == track_id);
        if !exists {
            state.links.push((
                playlist_id.to_string(),
                event_id.to_string(),
                track_id.to_string(),
            ));
        }
        Ok(())
    }

    async fn playlist_associations(
        &self,
        event_id: &str,
        playlist_id: &str,
    ) -> Result<Vec<TrackAssociation>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .links
            .iter()
            .filter(|(p, e, _)| p == playlist_id && e == event_id)
            .filter_map(|(_, e, t)| {
                state
                    .associations
                    .iter()
                    .find(|a| &a.event_id == e && &a.track_id == t)
                    .cloned()
            })
            .collect())
    }

    async fn reset_generation(&self, event_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.associations.retain(|a| a.event_id != event_id);
        state.playlists.retain(|p| p.event_id != event_id);
        state.links.retain(|(_, e, _)| e != event_id);
        Ok(())
    }
}
