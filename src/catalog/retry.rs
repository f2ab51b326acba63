//! Bounded retry with exponential backoff around any [`CatalogClient`].
//!
//! Reads are retried on transient failures (network, 429, 5xx). Calls that
//! create or append on the remote side are retried on 429 only: a timeout
//! or a 5xx may arrive after the write was applied. Once the attempts are
//! used up the last error is handed back unchanged, so the caller's
//! soft-fail handling stays the terminal behaviour.

use super::error::CatalogError;
use super::traits::CatalogClient;
use super::types::{ArtistSummary, PlaylistSummary, RecommendedTrack, TrackDetails};
use crate::config::RetryPolicy;
use crate::models::AccessToken;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

pub struct RetryingCatalog<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: CatalogClient> RetryingCatalog<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, CatalogError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<T, CatalogError>> + Send,
        T: Send,
    {
        self.retry_when(operation, CatalogError::is_transient, call)
            .await
    }

    async fn retry_when<T, F, Fut>(
        &self,
        operation: &str,
        retryable: fn(&CatalogError) -> bool,
        call: F,
    ) -> Result<T, CatalogError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<T, CatalogError>> + Send,
        T: Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) && attempt < max_attempts => {
                    let delay = self.delay_for(attempt, e.retry_after());
                    log::warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {}ms",
                        operation,
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        log::warn!("{} gave up after {} attempts: {}", operation, attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Delay before the retry that follows failed attempt `attempt`.
    fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(after) = retry_after {
            return after;
        }

        let exp = self
            .policy
            .base_delay_ms
            .saturating_mul(1u64 << (attempt - 1).min(16));
        let capped = exp.min(self.policy.max_delay_ms);
        let jitter = if capped > 0 {
            rand::rng().random_range(0..=capped / 4)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }
}

#[async_trait]
impl<C: CatalogClient> CatalogClient for RetryingCatalog<C> {
    async fn list_playlists(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<PlaylistSummary>, CatalogError> {
        self.with_retry("list_playlists", || self.inner.list_playlists(token))
            .await
    }

    async fn list_playlist_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<String>, CatalogError> {
        self.with_retry("list_playlist_tracks", || {
            self.inner.list_playlist_tracks(token, playlist_id)
        })
        .await
    }

    async fn top_artists(
        &self,
        token: &AccessToken,
        limit: usize,
    ) -> Result<Vec<ArtistSummary>, CatalogError> {
        self.with_retry("top_artists", || self.inner.top_artists(token, limit))
            .await
    }

    async fn artist_top_tracks(
        &self,
        token: &AccessToken,
        artist_id: &str,
        market: &str,
        limit: usize,
    ) -> Result<Vec<String>, CatalogError> {
        self.with_retry("artist_top_tracks", || {
            self.inner.artist_top_tracks(token, artist_id, market, limit)
        })
        .await
    }

    async fn artist_genres(
        &self,
        token: &AccessToken,
        artist_id: &str,
    ) -> Result<Vec<String>, CatalogError> {
        self.with_retry("artist_genres", || self.inner.artist_genres(token, artist_id))
            .await
    }

    async fn genre_seeds(&self, token: &AccessToken) -> Result<HashSet<String>, CatalogError> {
        self.with_retry("genre_seeds", || self.inner.genre_seeds(token))
            .await
    }

    async fn recommendations(
        &self,
        token: &AccessToken,
        genres: &[String],
        limit: usize,
    ) -> Result<Vec<RecommendedTrack>, CatalogError> {
        self.with_retry("recommendations", || {
            self.inner.recommendations(token, genres, limit)
        })
        .await
    }

    async fn get_track(
        &self,
        token: &AccessToken,
        track_id: &str,
    ) -> Result<TrackDetails, CatalogError> {
        self.with_retry("get_track", || self.inner.get_track(token, track_id))
            .await
    }

    async fn create_playlist(
        &self,
        token: &AccessToken,
        owner_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String, CatalogError> {
        self.retry_when("create_playlist", CatalogError::is_rate_limited, || {
            self.inner
                .create_playlist(token, owner_id, name, description, public)
        })
        .await
    }

    async fn add_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError> {
        self.retry_when("add_tracks", CatalogError::is_rate_limited, || {
            self.inner.add_tracks(token, playlist_id, uris)
        })
        .await
    }

    async fn replace_all_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
        batch_size: usize,
    ) -> Result<(), CatalogError> {
        // Clears before inserting, so running it again converges on `uris`.
        self.with_retry("replace_all_tracks", || {
            self.inner
                .replace_all_tracks(token, playlist_id, uris, batch_size)
        })
        .await
    }
}
