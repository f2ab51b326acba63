//! Top tracks of the artists every member listens to.

use super::{CandidatePool, GenerationContext};
use crate::catalog::ArtistSummary;
use crate::store::StoreError;
use futures_util::future::join_all;
use std::collections::HashSet;

/// Artist ids present in every list, in the order of the first list.
pub fn common_artists(lists: Vec<Vec<ArtistSummary>>) -> Vec<String> {
    let mut lists = lists.into_iter();
    let Some(first) = lists.next() else {
        return Vec::new();
    };

    let first: Vec<String> = first.into_iter().map(|a| a.id).collect();
    lists.fold(first, |common, list| {
        let ids: HashSet<String> = list.into_iter().map(|a| a.id).collect();
        common.into_iter().filter(|id| ids.contains(id)).collect()
    })
}

pub async fn run(
    ctx: &GenerationContext<'_>,
    pool: &mut CandidatePool,
) -> Result<usize, StoreError> {
    let limit = ctx.settings.amount_artists;
    let lists = join_all(ctx.credentials.valid().map(|token| async move {
        match ctx.catalog.top_artists(token, limit).await {
            Ok(artists) => artists,
            Err(e) => {
                log::warn!("Top artists unavailable for a member: {}", e);
                Vec::new()
            }
        }
    }))
    .await;

    let artists = common_artists(lists);
    if artists.is_empty() {
        log::info!("No top artist shared by all members");
        return Ok(0);
    }
    log::info!("{} top artists shared by all members", artists.len());

    let budget = ctx.stage_budget();
    let mut tracks: Vec<String> = Vec::new();
    for artist_id in &artists {
        if tracks.len() >= budget {
            break;
        }
        match ctx
            .catalog
            .artist_top_tracks(
                ctx.authoritative(),
                artist_id,
                &ctx.settings.market,
                ctx.settings.tracks_per_artist,
            )
            .await
        {
            Ok(top) => tracks.extend(top),
            Err(e) => log::warn!("Top tracks of artist {} unavailable: {}", artist_id, e),
        }
    }
    tracks.truncate(budget);

    let added = pool.contribute_all(ctx, &tracks).await?;
    pool.flush(ctx.store).await?;
    log::info!("Top-artist stage added {} of {} tracks", added, tracks.len());
    Ok(added)
}
