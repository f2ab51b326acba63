//! Catalog data as seen by generation, independent of the wire format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
}

/// Track returned by a genre-seeded recommendation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedTrack {
    pub id: String,
    pub duration_ms: i64,
    pub artists: Vec<String>,
}

/// Full metadata of a single track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDetails {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    /// Primary artist as (id, name)
    pub artist: Option<(String, String)>,
    pub artwork_url: Option<String>,
}
