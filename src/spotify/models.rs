use serde::{Deserialize, Serialize};

use crate::catalog::{ArtistSummary, PlaylistSummary, RecommendedTrack, TrackDetails};

/// One page of a paged Web API listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next: Option<String>,
    #[serde(default)]
    pub total: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<SimplifiedPlaylist> for PlaylistSummary {
    fn from(p: SimplifiedPlaylist) -> Self {
        PlaylistSummary {
            id: p.id,
            name: p.name,
        }
    }
}

/// Entry of a playlist's track listing. `track` is null for removed
/// items and local files carry no id.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<TrackRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackRef {
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullArtist {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl From<FullArtist> for ArtistSummary {
    fn from(a: FullArtist) -> Self {
        ArtistSummary {
            id: a.id,
            name: a.name,
            genres: a.genres,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimplifiedAlbum {
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullTrack {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub album: Option<SimplifiedAlbum>,
}

impl FullTrack {
    pub fn into_details(self) -> Option<TrackDetails> {
        let id = self.id?;
        let artist = self
            .artists
            .into_iter()
            .next()
            .and_then(|a| a.id.map(|artist_id| (artist_id, a.name)));
        let artwork_url = self
            .album
            .and_then(|album| album.images.into_iter().next())
            .map(|image| image.url);

        Some(TrackDetails {
            id,
            name: self.name,
            duration_ms: self.duration_ms,
            artist,
            artwork_url,
        })
    }

    pub fn into_recommended(self) -> Option<RecommendedTrack> {
        Some(RecommendedTrack {
            id: self.id?,
            duration_ms: self.duration_ms,
            artists: self.artists.into_iter().map(|a| a.name).collect(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracksResponse {
    #[serde(default)]
    pub tracks: Vec<FullTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreSeedsResponse {
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPlaylist {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTracksRequest<'a> {
    pub uris: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveTracksRequest {
    pub tracks: Vec<UriRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UriRef {
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Error envelope of the Web API (`{"error": {"status": 404, "message": ".."}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Api { message: String },
    /// Accounts service style: `{"error": "invalid_grant", "error_description": ".."}`
    Code(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_items_skip_missing_tracks() {
        let page: Paging<PlaylistItem> = serde_json::from_str(
            r#"{
                "items": [
                    { "track": { "id": "t1", "uri": "spotify:track:t1" } },
                    { "track": null },
                    { "track": { "id": null, "uri": "spotify:local:x" } }
                ],
                "next": null,
                "total": 3
            }"#,
        )
        .unwrap();

        let ids: Vec<String> = page
            .items
            .into_iter()
            .filter_map(|item| item.track.and_then(|t| t.id))
            .collect();
        assert_eq!(ids, vec!["t1"]);
    }

    #[test]
    fn test_full_track_into_details() {
        let track: FullTrack = serde_json::from_str(
            r#"{
                "id": "t9",
                "name": "Song",
                "duration_ms": 201000,
                "artists": [{ "id": "a1", "name": "First" }, { "id": "a2", "name": "Second" }],
                "album": { "images": [{ "url": "https://img/large" }, { "url": "https://img/small" }] }
            }"#,
        )
        .unwrap();

        let details = track.into_details().unwrap();
        assert_eq!(details.id, "t9");
        assert_eq!(details.artist, Some(("a1".to_string(), "First".to_string())));
        assert_eq!(details.artwork_url.as_deref(), Some("https://img/large"));
    }

    #[test]
    fn test_full_track_without_album_images() {
        let track: FullTrack =
            serde_json::from_str(r#"{ "id": "t2", "name": "X", "artists": [], "album": { "images": [] } }"#)
                .unwrap();
        let details = track.into_details().unwrap();
        assert_eq!(details.artwork_url, None);
        assert_eq!(details.artist, None);
    }

    #[test]
    fn test_error_envelope_shapes() {
        let api: ErrorEnvelope =
            serde_json::from_str(r#"{ "error": { "status": 401, "message": "The access token expired" } }"#)
                .unwrap();
        assert!(matches!(api.error, ErrorDetail::Api { ref message } if message.contains("expired")));

        let accounts: ErrorEnvelope =
            serde_json::from_str(r#"{ "error": "invalid_grant", "error_description": "Refresh token revoked" }"#)
                .unwrap();
        assert!(matches!(accounts.error, ErrorDetail::Code(ref code) if code == "invalid_grant"));
    }
}
