//! Scriptable catalog and credential doubles for unit tests.

use crate::catalog::{
    ArtistSummary, AuthError, CatalogClient, CatalogError, CredentialRefresher, PlaylistSummary,
    RecommendedTrack, TrackDetails,
};
use crate::models::{AccessToken, Event, Member, Role};
use crate::store::{EventStore, MemoryStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Default)]
struct MockState {
    /// token -> playlists with their track ids
    libraries: HashMap<String, Vec<(PlaylistSummary, Vec<String>)>>,
    top_artists: HashMap<String, Vec<ArtistSummary>>,
    artist_top_tracks: HashMap<String, Vec<String>>,
    artist_genres: HashMap<String, Vec<String>>,
    genre_seeds: HashSet<String>,
    recommendation_queue: VecDeque<Vec<RecommendedTrack>>,
    default_recommendations: Vec<RecommendedTrack>,
    recommendation_requests: Vec<Vec<String>>,
    tracks: HashMap<String, TrackDetails>,
    missing_tracks: HashSet<String>,
    failures: HashMap<String, VecDeque<CatalogError>>,
    /// errors returned after the write was applied
    lost_responses: HashMap<String, VecDeque<CatalogError>>,
    calls: Vec<String>,
    created_playlists: Vec<(String, String)>,
    added_batches: Vec<(String, Vec<String>)>,
    replaced: Vec<(String, Vec<String>)>,
}

/// In-memory [`CatalogClient`]. Unknown tracks get synthesized metadata
/// whose primary artist is `artist-<track id>`.
#[derive(Default)]
pub struct MockCatalog {
    state: Mutex<MockState>,
}

pub fn artist(id: &str, genres: &[&str]) -> ArtistSummary {
    ArtistSummary {
        id: id.to_string(),
        name: format!("Artist {}", id),
        genres: genres.iter().map(|g| g.to_string()).collect(),
    }
}

fn recommended(id: &str) -> RecommendedTrack {
    RecommendedTrack {
        id: id.to_string(),
        duration_ms: 200_000,
        artists: vec![format!("Artist {}", id)],
    }
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_library_playlist(&self, token: &str, playlist_id: &str, tracks: &[&str]) {
        self.state
            .lock()
            .libraries
            .entry(token.to_string())
            .or_default()
            .push((
                PlaylistSummary {
                    id: playlist_id.to_string(),
                    name: format!("Playlist {}", playlist_id),
                },
                tracks.iter().map(|t| t.to_string()).collect(),
            ));
    }

    pub fn set_top_artists(&self, token: &str, artists: Vec<ArtistSummary>) {
        self.state
            .lock()
            .top_artists
            .insert(token.to_string(), artists);
    }

    pub fn set_artist_top_tracks(&self, artist_id: &str, tracks: &[&str]) {
        self.state.lock().artist_top_tracks.insert(
            artist_id.to_string(),
            tracks.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub fn set_artist_genres(&self, artist_id: &str, genres: &[&str]) {
        self.state.lock().artist_genres.insert(
            artist_id.to_string(),
            genres.iter().map(|g| g.to_string()).collect(),
        );
    }

    pub fn set_genre_seeds(&self, genres: &[&str]) {
        self.state.lock().genre_seeds = genres.iter().map(|g| g.to_string()).collect();
    }

    /// Queue the answer of the next recommendation request.
    pub fn push_recommendations(&self, track_ids: &[&str]) {
        self.state
            .lock()
            .recommendation_queue
            .push_back(track_ids.iter().map(|id| recommended(id)).collect());
    }

    /// Answer of every recommendation request once the queue is empty.
    pub fn set_default_recommendations(&self, track_ids: &[&str]) {
        self.state.lock().default_recommendations =
            track_ids.iter().map(|id| recommended(id)).collect();
    }

    pub fn add_track(&self, details: TrackDetails) {
        self.state
            .lock()
            .tracks
            .insert(details.id.clone(), details);
    }

    pub fn mark_missing(&self, track_id: &str) {
        self.state.lock().missing_tracks.insert(track_id.to_string());
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &str, error: CatalogError) {
        self.state
            .lock()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    /// Apply the next write of `operation`, then answer with `error` as if
    /// the response never arrived.
    pub fn lose_response_next(&self, operation: &str, error: CatalogError) {
        self.state
            .lock()
            .lost_responses
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn recommendation_requests(&self) -> Vec<Vec<String>> {
        self.state.lock().recommendation_requests.clone()
    }

    /// (owner id, name) of each created playlist
    pub fn created_playlists(&self) -> Vec<(String, String)> {
        self.state.lock().created_playlists.clone()
    }

    pub fn added_batches(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .added_batches
            .iter()
            .map(|(_, uris)| uris.clone())
            .collect()
    }

    pub fn replaced(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().replaced.clone()
    }

    fn record(&self, operation: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        state.calls.push(operation.to_string());
        match state
            .failures
            .get_mut(operation)
            .and_then(|queue| queue.pop_front())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn answer(&self, operation: &str) -> Result<(), CatalogError> {
        match self
            .state
            .lock()
            .lost_responses
            .get_mut(operation)
            .and_then(|queue| queue.pop_front())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn list_playlists(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<PlaylistSummary>, CatalogError> {
        self.record("list_playlists")?;
        Ok(self
            .state
            .lock()
            .libraries
            .get(token.secret())
            .map(|playlists| playlists.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_playlist_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<String>, CatalogError> {
        self.record("list_playlist_tracks")?;
        self.state
            .lock()
            .libraries
            .get(token.secret())
            .and_then(|playlists| playlists.iter().find(|(p, _)| p.id == playlist_id))
            .map(|(_, tracks)| tracks.clone())
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))
    }

    async fn top_artists(
        &self,
        token: &AccessToken,
        limit: usize,
    ) -> Result<Vec<ArtistSummary>, CatalogError> {
        self.record("top_artists")?;
        Ok(self
            .state
            .lock()
            .top_artists
            .get(token.secret())
            .map(|artists| artists.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn artist_top_tracks(
        &self,
        _token: &AccessToken,
        artist_id: &str,
        _market: &str,
        limit: usize,
    ) -> Result<Vec<String>, CatalogError> {
        self.record("artist_top_tracks")?;
        Ok(self
            .state
            .lock()
            .artist_top_tracks
            .get(artist_id)
            .map(|tracks| tracks.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn artist_genres(
        &self,
        _token: &AccessToken,
        artist_id: &str,
    ) -> Result<Vec<String>, CatalogError> {
        self.record("artist_genres")?;
        Ok(self
            .state
            .lock()
            .artist_genres
            .get(artist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn genre_seeds(&self, _token: &AccessToken) -> Result<HashSet<String>, CatalogError> {
        self.record("genre_seeds")?;
        Ok(self.state.lock().genre_seeds.clone())
    }

    async fn recommendations(
        &self,
        _token: &AccessToken,
        genres: &[String],
        limit: usize,
    ) -> Result<Vec<RecommendedTrack>, CatalogError> {
        self.record("recommendations")?;
        let mut state = self.state.lock();
        state.recommendation_requests.push(genres.to_vec());
        let batch = match state.recommendation_queue.pop_front() {
            Some(batch) => batch,
            None => state.default_recommendations.clone(),
        };
        Ok(batch.into_iter().take(limit).collect())
    }

    async fn get_track(
        &self,
        _token: &AccessToken,
        track_id: &str,
    ) -> Result<TrackDetails, CatalogError> {
        self.record("get_track")?;
        let state = self.state.lock();
        if state.missing_tracks.contains(track_id) {
            return Err(CatalogError::NotFound(track_id.to_string()));
        }
        Ok(state
            .tracks
            .get(track_id)
            .cloned()
            .unwrap_or_else(|| TrackDetails {
                id: track_id.to_string(),
                name: format!("Track {}", track_id),
                duration_ms: 180_000,
                artist: Some((
                    format!("artist-{}", track_id),
                    format!("Artist {}", track_id),
                )),
                artwork_url: None,
            }))
    }

    async fn create_playlist(
        &self,
        _token: &AccessToken,
        owner_id: &str,
        name: &str,
        _description: &str,
        _public: bool,
    ) -> Result<String, CatalogError> {
        self.record("create_playlist")?;
        let id = {
            let mut state = self.state.lock();
            state
                .created_playlists
                .push((owner_id.to_string(), name.to_string()));
            format!("pl-{}", state.created_playlists.len())
        };
        self.answer("create_playlist")?;
        Ok(id)
    }

    async fn add_tracks(
        &self,
        _token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError> {
        self.record("add_tracks")?;
        self.state
            .lock()
            .added_batches
            .push((playlist_id.to_string(), uris.to_vec()));
        self.answer("add_tracks")
    }

    async fn replace_all_tracks(
        &self,
        _token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
        _batch_size: usize,
    ) -> Result<(), CatalogError> {
        self.record("replace_all_tracks")?;
        self.state
            .lock()
            .replaced
            .push((playlist_id.to_string(), uris.to_vec()));
        Ok(())
    }
}

/// Issues `tok-<user id>` for every member unless told to fail.
#[derive(Default)]
pub struct MockRefresher {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, user_id: &str) {
        self.failing.lock().insert(user_id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

pub fn token_for(user_id: &str) -> String {
    format!("tok-{}", user_id)
}

#[async_trait]
impl CredentialRefresher for MockRefresher {
    async fn refresh(&self, member: &Member) -> Result<AccessToken, AuthError> {
        self.calls.lock().push(member.user_id.clone());
        if self.failing.lock().contains(&member.user_id) {
            return Err(AuthError::Rejected {
                status: 400,
                message: "invalid_grant".to_string(),
            });
        }
        Ok(AccessToken::new(token_for(&member.user_id)))
    }
}

/// Store holding one event `e1` named "Party" with `owner` plus the
/// given participants, in that order.
pub async fn seeded_store(participants: &[&str]) -> MemoryStore {
    let store = MemoryStore::new();
    store
        .upsert_event(&Event {
            id: "e1".to_string(),
            name: "Party".to_string(),
            date: 1_700_000_000,
            locked: false,
        })
        .await
        .unwrap();

    let members = std::iter::once(("owner", Role::Owner))
        .chain(participants.iter().map(|p| (*p, Role::Participant)));
    for (user, role) in members {
        store
            .upsert_member(&Member {
                user_id: user.to_string(),
                event_id: "e1".to_string(),
                role,
                refresh_token: Some(format!("rt-{}", user)),
            })
            .await
            .unwrap();
    }
    store
}
