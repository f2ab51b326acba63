use super::{CatalogClient, CatalogError};
use crate::models::{AccessToken, Track};

pub const UNKNOWN_GENRE: &str = "Unknown";

/// Build the stored form of a track from the catalog.
///
/// Genres come from the primary artist, comma separated. A failed genre
/// lookup only degrades them to "Unknown"; a failed track lookup is an error.
pub async fn describe_track(
    catalog: &dyn CatalogClient,
    token: &AccessToken,
    track_id: &str,
) -> Result<Track, CatalogError> {
    let details = catalog.get_track(token, track_id).await?;
    let (artist_id, artist_name) = details.artist.unwrap_or_default();

    let genre = if artist_id.is_empty() {
        UNKNOWN_GENRE.to_string()
    } else {
        match catalog.artist_genres(token, &artist_id).await {
            Ok(genres) if !genres.is_empty() => genres.join(","),
            Ok(_) => UNKNOWN_GENRE.to_string(),
            Err(e) => {
                log::warn!("Genres of artist {} unavailable: {}", artist_id, e);
                UNKNOWN_GENRE.to_string()
            }
        }
    };

    Ok(Track {
        id: details.id,
        name: details.name,
        duration_ms: details.duration_ms,
        genre,
        artist_id,
        artist_name,
        artwork_url: details.artwork_url.unwrap_or_default(),
    })
}
