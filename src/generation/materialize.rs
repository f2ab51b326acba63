use super::{CandidatePool, GenerationContext};
use crate::config::ADD_BATCH_SIZE;
use crate::errors::GenerationError;
use crate::models::{track_uri, Member, Playlist, TrackAssociation};
use chrono::Utc;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub playlist_id: String,
    pub submitted: usize,
}

/// Keep the first association of every track id.
pub fn dedup_by_track_id(entries: Vec<TrackAssociation>) -> Vec<TrackAssociation> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let first = seen.insert(entry.track_id.clone());
            if !first {
                log::warn!("Dropping duplicate track {} from the playlist", entry.track_id);
            }
            first
        })
        .collect()
}

/// Publish the pool as a new remote playlist owned by `owner`.
///
/// Failing to create the playlist ends the run; a failed batch upload is
/// only logged.
pub async fn run(
    ctx: &GenerationContext<'_>,
    owner: &Member,
    pool: CandidatePool,
) -> Result<Materialized, GenerationError> {
    let token = ctx.authoritative();
    let playlist_id = ctx
        .catalog
        .create_playlist(
            token,
            &owner.user_id,
            &ctx.event.name,
            &ctx.settings.playlist_description,
            ctx.settings.playlist_public,
        )
        .await
        .map_err(|e| {
            log::error!("Creating playlist for event {} failed: {}", ctx.event.id, e);
            GenerationError::PlaylistCreation(e.to_string())
        })?;

    ctx.store
        .insert_playlist(&Playlist {
            id: playlist_id.clone(),
            event_id: ctx.event.id.clone(),
            accepted: false,
            created_at: Utc::now().timestamp(),
        })
        .await?;

    let publishable: Vec<TrackAssociation> = dedup_by_track_id(pool.into_entries())
        .into_iter()
        .filter(|entry| entry.status.is_publishable())
        .collect();

    let batch_size = ctx.settings.add_batch_size.clamp(1, ADD_BATCH_SIZE);
    let mut submitted = 0;
    for batch in publishable.chunks(batch_size) {
        let uris: Vec<String> = batch.iter().map(|entry| track_uri(&entry.track_id)).collect();
        if let Err(e) = ctx.catalog.add_tracks(token, &playlist_id, &uris).await {
            log::warn!(
                "Adding {} tracks to playlist {} failed: {}",
                uris.len(),
                playlist_id,
                e
            );
        }

        for entry in batch {
            ctx.store.insert_association_if_absent(entry).await?;
            ctx.store
                .link_playlist_track(&ctx.event.id, &playlist_id, &entry.track_id)
                .await?;
        }
        submitted += batch.len();
    }

    log::info!(
        "Playlist {} for event {} created with {} tracks",
        playlist_id,
        ctx.event.id,
        submitted
    );
    Ok(Materialized {
        playlist_id,
        submitted,
    })
}
