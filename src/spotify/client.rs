use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

use super::models::*;
use crate::catalog::{
    ArtistSummary, CatalogClient, CatalogError, PlaylistSummary, RecommendedTrack, TrackDetails,
};
use crate::config::{API_BASE_URL, REQUEST_TIMEOUT_SECONDS};
use crate::models::AccessToken;

/// Safety stop for `next` link chains.
const MAX_PAGES: usize = 50;
const PAGE_SIZE: usize = 50;
/// Page and delete size of the tracks endpoint.
const TRACKS_PAGE_SIZE: usize = 100;
/// Reads allowed while clearing, enough for the largest playlists.
const MAX_CLEAR_ROUNDS: usize = 250;

/// A delete whose effect is checked on the next read of the same offset.
struct PendingDelete {
    total_before: Option<usize>,
    page_len: usize,
    requested: usize,
}

/// Spotify Web API implementation of [`CatalogClient`].
#[derive(Clone)]
pub struct SpotifyCatalog {
    client: Client,
    base_url: String,
}

impl SpotifyCatalog {
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_base_url(API_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .user_agent(concat!("groupmix/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str, token: &AccessToken) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token.secret())
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &str,
    ) -> Result<Response, CatalogError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let error = classify_status(status, retry_after, &body);

        log::debug!("{} failed ({}): {}", operation, status, error);
        Err(error)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        url: &str,
        query: &[(&str, String)],
        operation: &str,
    ) -> Result<T, CatalogError> {
        let builder = self.request(Method::GET, url, token).query(query);
        let response = self.send(builder, operation).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| CatalogError::Parse(format!("{}: {}", operation, e)))
    }

    /// Follow `next` links until the listing is exhausted.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        first_url: &str,
        query: &[(&str, String)],
        operation: &str,
    ) -> Result<Vec<T>, CatalogError> {
        let mut page: Paging<T> = self.get_json(token, first_url, query, operation).await?;
        let mut items = std::mem::take(&mut page.items);
        let mut pages = 1;

        while let Some(next) = page.next.take() {
            if pages >= MAX_PAGES {
                log::warn!("{}: stopping after {} pages", operation, pages);
                break;
            }
            page = self.get_json(token, &next, &[], operation).await?;
            items.append(&mut page.items);
            pages += 1;
        }

        log::debug!("{}: {} items over {} pages", operation, items.len(), pages);
        Ok(items)
    }

    async fn playlist_tracks_page(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        offset: usize,
    ) -> Result<Paging<PlaylistItem>, CatalogError> {
        let url = self.url(&format!(
            "/playlists/{}/tracks",
            urlencoding::encode(playlist_id)
        ));
        self.get_json(
            token,
            &url,
            &[
                ("limit", TRACKS_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ],
            "playlist_tracks_page",
        )
        .await
    }

    /// Remove every deletable entry of a playlist. Returns the number of
    /// entries removed.
    async fn clear_playlist(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<usize, CatalogError> {
        let url = self.url(&format!(
            "/playlists/{}/tracks",
            urlencoding::encode(playlist_id)
        ));

        // Deleting shifts the listing, so the offset only moves past
        // entries that can't be removed.
        let mut offset = 0;
        let mut removed = 0;
        let mut last_delete: Option<PendingDelete> = None;

        for _ in 0..MAX_CLEAR_ROUNDS {
            let page = self.playlist_tracks_page(token, playlist_id, offset).await?;
            let total = page.total.map(|t| t as usize);

            if let Some(pending) = last_delete.take() {
                match (pending.total_before, total) {
                    (Some(before), Some(now)) if now >= before => {
                        log::warn!(
                            "Delete left playlist {} at {} entries, skipping {} at offset {}",
                            playlist_id,
                            now,
                            pending.page_len,
                            offset
                        );
                        offset += pending.page_len;
                        continue;
                    }
                    (Some(before), Some(now)) => removed += before - now,
                    _ => removed += pending.requested,
                }
            }

            if page.items.is_empty() {
                return Ok(removed);
            }

            let page_len = page.items.len();
            let uris: Vec<String> = page
                .items
                .into_iter()
                .filter_map(|item| item.track.and_then(|t| t.uri))
                .collect();
            if uris.is_empty() {
                offset += page_len;
                continue;
            }

            let requested = uris.len();
            let body = RemoveTracksRequest {
                tracks: uris.into_iter().map(|uri| UriRef { uri }).collect(),
            };
            let builder = self.request(Method::DELETE, &url, token).json(&body);
            self.send(builder, "remove_tracks").await?;
            last_delete = Some(PendingDelete {
                total_before: total,
                page_len,
                requested,
            });
        }

        log::warn!(
            "Stopped clearing playlist {} after {} rounds",
            playlist_id,
            MAX_CLEAR_ROUNDS
        );
        Ok(removed)
    }
}

/// Map a non-success response onto the error taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> CatalogError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| match envelope.error {
            ErrorDetail::Api { message } => message,
            ErrorDetail::Code(code) => code,
        })
        .unwrap_or_else(|_| body.trim().to_string());

    match status.as_u16() {
        401 | 403 => CatalogError::Unauthorized(message),
        404 => CatalogError::NotFound(message),
        429 => CatalogError::RateLimited { retry_after_secs },
        code if status.is_server_error() => CatalogError::Server {
            status: code,
            message,
        },
        code => CatalogError::Api {
            status: code,
            message,
        },
    }
}

#[async_trait]
impl CatalogClient for SpotifyCatalog {
    async fn list_playlists(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<PlaylistSummary>, CatalogError> {
        let playlists: Vec<SimplifiedPlaylist> = self
            .get_all_pages(
                token,
                &self.url("/me/playlists"),
                &[("limit", PAGE_SIZE.to_string())],
                "list_playlists",
            )
            .await?;
        Ok(playlists.into_iter().map(PlaylistSummary::from).collect())
    }

    async fn list_playlist_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<String>, CatalogError> {
        let url = self.url(&format!(
            "/playlists/{}/tracks",
            urlencoding::encode(playlist_id)
        ));
        let items: Vec<PlaylistItem> = self
            .get_all_pages(
                token,
                &url,
                &[("limit", TRACKS_PAGE_SIZE.to_string())],
                "list_playlist_tracks",
            )
            .await?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.track.and_then(|t| t.id))
            .collect())
    }

    async fn top_artists(
        &self,
        token: &AccessToken,
        limit: usize,
    ) -> Result<Vec<ArtistSummary>, CatalogError> {
        let page: Paging<FullArtist> = self
            .get_json(
                token,
                &self.url("/me/top/artists"),
                &[("limit", limit.to_string())],
                "top_artists",
            )
            .await?;
        Ok(page.items.into_iter().map(ArtistSummary::from).collect())
    }

    async fn artist_top_tracks(
        &self,
        token: &AccessToken,
        artist_id: &str,
        market: &str,
        limit: usize,
    ) -> Result<Vec<String>, CatalogError> {
        let url = self.url(&format!(
            "/artists/{}/top-tracks",
            urlencoding::encode(artist_id)
        ));
        let response: TracksResponse = self
            .get_json(
                token,
                &url,
                &[("market", market.to_string())],
                "artist_top_tracks",
            )
            .await?;

        Ok(response
            .tracks
            .into_iter()
            .filter_map(|t| t.id)
            .take(limit)
            .collect())
    }

    async fn artist_genres(
        &self,
        token: &AccessToken,
        artist_id: &str,
    ) -> Result<Vec<String>, CatalogError> {
        let url = self.url(&format!("/artists/{}", urlencoding::encode(artist_id)));
        let artist: FullArtist = self.get_json(token, &url, &[], "artist_genres").await?;
        Ok(artist.genres)
    }

    async fn genre_seeds(&self, token: &AccessToken) -> Result<HashSet<String>, CatalogError> {
        let response: GenreSeedsResponse = self
            .get_json(
                token,
                &self.url("/recommendations/available-genre-seeds"),
                &[],
                "genre_seeds",
            )
            .await?;
        Ok(response.genres.into_iter().collect())
    }

    async fn recommendations(
        &self,
        token: &AccessToken,
        genres: &[String],
        limit: usize,
    ) -> Result<Vec<RecommendedTrack>, CatalogError> {
        let response: TracksResponse = self
            .get_json(
                token,
                &self.url("/recommendations"),
                &[
                    ("seed_genres", genres.join(",")),
                    ("limit", limit.to_string()),
                ],
                "recommendations",
            )
            .await?;

        Ok(response
            .tracks
            .into_iter()
            .filter_map(FullTrack::into_recommended)
            .collect())
    }

    async fn get_track(
        &self,
        token: &AccessToken,
        track_id: &str,
    ) -> Result<TrackDetails, CatalogError> {
        let url = self.url(&format!("/tracks/{}", urlencoding::encode(track_id)));
        let track: FullTrack = self.get_json(token, &url, &[], "get_track").await?;
        track
            .into_details()
            .ok_or_else(|| CatalogError::Parse(format!("Track {} has no id", track_id)))
    }

    async fn create_playlist(
        &self,
        token: &AccessToken,
        owner_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String, CatalogError> {
        let url = self.url(&format!("/users/{}/playlists", urlencoding::encode(owner_id)));
        let builder = self
            .request(Method::POST, &url, token)
            .json(&CreatePlaylistRequest {
                name,
                description,
                public,
            });
        let response = self.send(builder, "create_playlist").await?;
        let created: CreatedPlaylist = response.json().await?;

        match created.id {
            Some(id) if !id.is_empty() => {
                log::info!("Created playlist {} for owner {}", id, owner_id);
                Ok(id)
            }
            _ => Err(CatalogError::Parse(
                "Playlist creation returned no id".to_string(),
            )),
        }
    }

    async fn add_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError> {
        let url = self.url(&format!(
            "/playlists/{}/tracks",
            urlencoding::encode(playlist_id)
        ));
        let builder = self
            .request(Method::POST, &url, token)
            .json(&AddTracksRequest { uris });
        self.send(builder, "add_tracks").await?;
        log::debug!("Added {} tracks to playlist {}", uris.len(), playlist_id);
        Ok(())
    }

    async fn replace_all_tracks(
        &self,
        token: &AccessToken,
        playlist_id: &str,
        uris: &[String],
        batch_size: usize,
    ) -> Result<(), CatalogError> {
        let removed = self.clear_playlist(token, playlist_id).await?;

        for batch in uris.chunks(batch_size.max(1)) {
            self.add_tracks(token, playlist_id, batch).await?;
        }

        log::info!(
            "Replaced tracks of playlist {}: removed {}, inserted {}",
            playlist_id,
            removed,
            uris.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, Some(4), "");
        assert!(matches!(
            err,
            CatalogError::RateLimited {
                retry_after_secs: Some(4)
            }
        ));
    }

    #[test]
    fn test_classify_uses_api_message() {
        let err = classify_status(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{ "error": { "status": 401, "message": "The access token expired" } }"#,
        );
        match err {
            CatalogError::Unauthorized(msg) => assert_eq!(msg, "The access token expired"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_server_and_client_errors() {
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, "upstream"),
            CatalogError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, ""),
            CatalogError::NotFound(_)
        ));
        match classify_status(StatusCode::BAD_REQUEST, None, "  invalid seed  ") {
            CatalogError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid seed");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_base_url_is_normalized() {
        let catalog = SpotifyCatalog::with_base_url("http://localhost:9000/v1/").unwrap();
        assert_eq!(catalog.url("/me/playlists"), "http://localhost:9000/v1/me/playlists");
    }

    mod against_local_api {
        use super::*;
        use axum::extract::{Query, State};
        use axum::routing::get;
        use axum::{Json, Router};
        use parking_lot::Mutex;
        use serde_json::{json, Value};
        use std::collections::HashMap;
        use std::sync::Arc;

        /// Playlists of `/me/playlists` come two per page; `entries` is the
        /// track listing of every playlist, `None` standing for a null track.
        #[derive(Default)]
        struct FakeApi {
            base_url: String,
            playlists: Vec<String>,
            entries: Vec<Option<String>>,
            /// uris the delete call leaves in place
            pinned: HashSet<String>,
            deletes: usize,
        }

        type Shared = Arc<Mutex<FakeApi>>;

        fn param(query: &HashMap<String, String>, key: &str, default: usize) -> usize {
            query
                .get(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        async fn my_playlists(
            State(api): State<Shared>,
            Query(query): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            let api = api.lock();
            let offset = param(&query, "offset", 0);
            let items: Vec<Value> = api
                .playlists
                .iter()
                .enumerate()
                .skip(offset)
                .take(2)
                .map(|(i, name)| json!({ "id": format!("p{}", i), "name": name }))
                .collect();
            let next = (offset + 2 < api.playlists.len())
                .then(|| format!("{}/me/playlists?offset={}", api.base_url, offset + 2));
            Json(json!({ "items": items, "next": next, "total": api.playlists.len() }))
        }

        async fn playlist_tracks(
            State(api): State<Shared>,
            Query(query): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            let api = api.lock();
            let offset = param(&query, "offset", 0);
            let limit = param(&query, "limit", TRACKS_PAGE_SIZE);
            let items: Vec<Value> = api
                .entries
                .iter()
                .skip(offset)
                .take(limit)
                .map(|entry| match entry {
                    Some(uri) => json!({ "track": { "id": uri.rsplit(':').next(), "uri": uri } }),
                    None => json!({ "track": null }),
                })
                .collect();
            let next = (offset + limit < api.entries.len()).then(|| {
                format!(
                    "{}/playlists/pl/tracks?offset={}&limit={}",
                    api.base_url,
                    offset + limit,
                    limit
                )
            });
            Json(json!({ "items": items, "next": next, "total": api.entries.len() }))
        }

        async fn add_tracks(State(api): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
            let mut api = api.lock();
            for uri in body["uris"].as_array().into_iter().flatten() {
                if let Some(uri) = uri.as_str() {
                    api.entries.push(Some(uri.to_string()));
                }
            }
            Json(json!({ "snapshot_id": "s" }))
        }

        async fn remove_tracks(State(api): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
            let mut api = api.lock();
            api.deletes += 1;
            let uris: HashSet<String> = body["tracks"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|t| t["uri"].as_str().map(str::to_string))
                .collect();
            let pinned = api.pinned.clone();
            api.entries.retain(|entry| match entry {
                Some(uri) => !uris.contains(uri) || pinned.contains(uri),
                None => true,
            });
            Json(json!({ "snapshot_id": "s" }))
        }

        async fn serve(api: FakeApi) -> (SpotifyCatalog, Shared) {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let shared = Arc::new(Mutex::new(FakeApi {
                base_url: base_url.clone(),
                ..api
            }));

            let app = Router::new()
                .route("/me/playlists", get(my_playlists))
                .route(
                    "/playlists/:id/tracks",
                    get(playlist_tracks).post(add_tracks).delete(remove_tracks),
                )
                .with_state(shared.clone());
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            (SpotifyCatalog::with_base_url(&base_url).unwrap(), shared)
        }

        fn uri(id: &str) -> String {
            format!("spotify:track:{}", id)
        }

        #[tokio::test]
        async fn test_listing_follows_next_links() {
            let (catalog, _) = serve(FakeApi {
                playlists: (1..=5).map(|i| format!("Mix {}", i)).collect(),
                ..Default::default()
            })
            .await;

            let playlists = catalog
                .list_playlists(&AccessToken::new("tok"))
                .await
                .unwrap();

            let names: Vec<String> = playlists.into_iter().map(|p| p.name).collect();
            assert_eq!(names, vec!["Mix 1", "Mix 2", "Mix 3", "Mix 4", "Mix 5"]);
        }

        #[tokio::test]
        async fn test_track_listing_pages_and_skips_null_tracks() {
            let mut entries: Vec<Option<String>> =
                (0..150).map(|i| Some(uri(&format!("t{}", i)))).collect();
            entries[3] = None;
            let (catalog, _) = serve(FakeApi {
                entries,
                ..Default::default()
            })
            .await;

            let ids = catalog
                .list_playlist_tracks(&AccessToken::new("tok"), "pl")
                .await
                .unwrap();

            assert_eq!(ids.len(), 149);
            assert_eq!(ids[3], "t4");
            assert_eq!(ids.last().map(String::as_str), Some("t149"));
        }

        #[tokio::test]
        async fn test_replace_clears_tracks_behind_a_page_of_null_entries() {
            let mut entries: Vec<Option<String>> = vec![None; 100];
            entries.extend((0..30).map(|i| Some(uri(&format!("old{}", i)))));
            let (catalog, api) = serve(FakeApi {
                entries,
                ..Default::default()
            })
            .await;

            let new = vec![uri("n1"), uri("n2")];
            catalog
                .replace_all_tracks(&AccessToken::new("tok"), "pl", &new, 100)
                .await
                .unwrap();

            let api = api.lock();
            let remaining: Vec<&String> = api.entries.iter().flatten().collect();
            assert_eq!(remaining, vec![&new[0], &new[1]]);
            assert_eq!(api.entries.len(), 102);
        }

        #[tokio::test]
        async fn test_replace_moves_past_entries_delete_ignores() {
            let local = "spotify:local:Artist:Album:Song:200".to_string();
            let (catalog, api) = serve(FakeApi {
                entries: vec![Some(local.clone()), Some(uri("old"))],
                pinned: [local.clone()].into_iter().collect(),
                ..Default::default()
            })
            .await;

            catalog
                .replace_all_tracks(&AccessToken::new("tok"), "pl", &[uri("n1")], 100)
                .await
                .unwrap();

            let api = api.lock();
            assert_eq!(api.entries, vec![Some(local), Some(uri("n1"))]);
            assert_eq!(api.deletes, 2);
        }
    }
}
