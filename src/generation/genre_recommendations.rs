//! Recommendations seeded by the genres the group listens to most.
//!
//! Repeats until the pool reaches the target size or an iteration adds no
//! new track, so a catalog that keeps answering with known tracks can't
//! keep the loop alive.

use super::{CandidatePool, GenerationContext};
use crate::config::MAX_SEED_GENRES;
use crate::store::StoreError;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};

/// Genre frequencies that remember first-seen order for ties.
#[derive(Debug, Default)]
pub struct GenreTally {
    counts: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl GenreTally {
    pub fn record(&mut self, genre: &str) {
        match self.index.get(genre) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(genre.to_string(), self.counts.len());
                self.counts.push((genre.to_string(), 1));
            }
        }
    }

    /// The `n` most frequent genres, most frequent first.
    pub fn top(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<&(String, usize)> = self.counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(n)
            .map(|(genre, _)| genre.clone())
            .collect()
    }
}

async fn seed_genres(ctx: &GenerationContext<'_>) -> Vec<String> {
    let vocabulary: HashSet<String> = match ctx.catalog.genre_seeds(ctx.authoritative()).await {
        Ok(seeds) => seeds,
        Err(e) => {
            log::warn!("Genre seed vocabulary unavailable: {}", e);
            return Vec::new();
        }
    };
    if vocabulary.is_empty() {
        return Vec::new();
    }

    let limit = ctx.settings.genre_artist_limit;
    let lists = join_all(ctx.credentials.valid().map(|token| async move {
        match ctx.catalog.top_artists(token, limit).await {
            Ok(artists) => artists,
            Err(e) => {
                log::warn!("Top artists unavailable for genre tally: {}", e);
                Vec::new()
            }
        }
    }))
    .await;

    let mut tally = GenreTally::default();
    for genre in lists.iter().flatten().flat_map(|a| a.genres.iter()) {
        if vocabulary.contains(genre) {
            tally.record(genre);
        }
    }
    tally.top(ctx.settings.max_seed_genres.min(MAX_SEED_GENRES))
}

/// One round. Returns the number of tracks new to the pool.
async fn iterate(
    ctx: &GenerationContext<'_>,
    pool: &mut CandidatePool,
) -> Result<usize, StoreError> {
    let genres = seed_genres(ctx).await;
    if genres.is_empty() {
        log::info!("No seed genre qualifies");
        return Ok(0);
    }
    log::info!("Requesting recommendations for genres {:?}", genres);

    let tracks = match ctx
        .catalog
        .recommendations(
            ctx.authoritative(),
            &genres,
            ctx.settings.amount_recommendations,
        )
        .await
    {
        Ok(tracks) => tracks,
        Err(e) => {
            log::warn!("Recommendations unavailable: {}", e);
            Vec::new()
        }
    };

    let added = pool
        .contribute_all(ctx, tracks.into_iter().map(|t| t.id))
        .await?;
    pool.flush(ctx.store).await?;
    Ok(added)
}

pub async fn run(
    ctx: &GenerationContext<'_>,
    pool: &mut CandidatePool,
) -> Result<usize, StoreError> {
    let target = ctx.settings.target_size;
    let mut total = 0;
    let mut rounds = 0;

    while pool.len() < target {
        rounds += 1;
        let added = iterate(ctx, pool).await?;
        log::debug!("Genre round {} added {} tracks", rounds, added);
        if added == 0 {
            break;
        }
        total += added;
    }

    log::info!(
        "Genre stage added {} tracks in {} rounds, pool at {}/{}",
        total,
        rounds,
        pool.len(),
        target
    );
    Ok(total)
}
