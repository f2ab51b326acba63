//! Tracks that already sit in every member's playlist library.

use super::{CandidatePool, GenerationContext};
use crate::models::AccessToken;
use crate::store::StoreError;
use futures_util::future::join_all;
use std::collections::HashSet;

/// Union of the tracks of all of one member's playlists, in first-seen order.
/// `None` when the member's playlists couldn't be listed.
async fn member_library(ctx: &GenerationContext<'_>, token: &AccessToken) -> Option<Vec<String>> {
    let playlists = match ctx.catalog.list_playlists(token).await {
        Ok(playlists) => playlists,
        Err(e) => {
            log::warn!("Listing playlists failed, skipping member: {}", e);
            return None;
        }
    };

    let mut seen = HashSet::new();
    let mut library = Vec::new();
    for playlist in playlists {
        match ctx.catalog.list_playlist_tracks(token, &playlist.id).await {
            Ok(tracks) => {
                for id in tracks {
                    if seen.insert(id.clone()) {
                        library.push(id);
                    }
                }
            }
            Err(e) => log::warn!("Tracks of playlist {} unavailable: {}", playlist.id, e),
        }
    }
    Some(library)
}

/// Fold the member libraries into their intersection, keeping the order of
/// the first library present. Missing libraries are skipped.
pub fn intersect_libraries(libraries: Vec<Option<Vec<String>>>) -> Vec<String> {
    let mut libraries = libraries.into_iter().flatten();
    let Some(first) = libraries.next() else {
        return Vec::new();
    };

    libraries.fold(first, |common, library| {
        let library: HashSet<String> = library.into_iter().collect();
        common
            .into_iter()
            .filter(|id| library.contains(id))
            .collect()
    })
}

/// Returns the number of tracks new to the pool.
pub async fn run(
    ctx: &GenerationContext<'_>,
    pool: &mut CandidatePool,
) -> Result<usize, StoreError> {
    let libraries = join_all(ctx.credentials.slots().map(|slot| async move {
        match slot {
            Some(token) => member_library(ctx, token).await,
            None => None,
        }
    }))
    .await;

    let common = intersect_libraries(libraries);
    if common.is_empty() {
        log::info!("No tracks common to all member libraries");
        return Ok(0);
    }

    let budget = ctx.stage_budget();
    log::info!(
        "{} tracks common to all member libraries, taking up to {}",
        common.len(),
        budget
    );

    let added = pool
        .contribute_all(ctx, common.into_iter().take(budget))
        .await?;
    pool.flush(ctx.store).await?;
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;
    use crate::config::GeneratorSettings;
    use crate::models::{Event, MemberCredentials, TrackStatus};
    use crate::store::{EventStore, MemoryStore};
    use crate::testing::MockCatalog;

    fn lib(ids: &[&str]) -> Option<Vec<String>> {
        Some(ids.iter().map(|s| s.to_string()).collect())
    }

    fn event() -> Event {
        Event {
            id: "e1".to_string(),
            name: "Party".to_string(),
            date: 0,
            locked: false,
        }
    }

    #[test]
    fn test_intersection_skips_missing_members() {
        let common = intersect_libraries(vec![
            lib(&["t1", "t2", "t3"]),
            None,
            lib(&["t3", "t2", "t9"]),
        ]);
        assert_eq!(common, vec!["t2", "t3"]);
    }

    #[test]
    fn test_intersection_set_is_order_independent() {
        let a = lib(&["t1", "t2", "t3", "t5"]);
        let b = lib(&["t5", "t2", "t4"]);
        let c = lib(&["t2", "t5", "t7"]);

        let forward: HashSet<String> =
            intersect_libraries(vec![a.clone(), b.clone(), c.clone()]).into_iter().collect();
        let backward: HashSet<String> = intersect_libraries(vec![c, b, a]).into_iter().collect();

        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
    }

    #[test]
    fn test_empty_library_empties_intersection() {
        assert!(intersect_libraries(vec![lib(&["t1"]), lib(&[])]).is_empty());
        assert!(intersect_libraries(vec![None, None]).is_empty());
    }

    #[tokio::test]
    async fn test_two_members_share_two_tracks() {
        let catalog = MockCatalog::new();
        catalog.add_library_playlist("a", "pa", &["t1", "t2", "t3"]);
        catalog.add_library_playlist("b", "pb", &["t2", "t3", "t4"]);
        let store = MemoryStore::new();
        let credentials =
            MemberCredentials::new(AccessToken::new("a"), vec![Some(AccessToken::new("b"))]);
        let settings = GeneratorSettings::default();
        let event = event();
        let ctx = GenerationContext {
            event: &event,
            credentials: &credentials,
            catalog: &catalog,
            store: &store,
            settings: &settings,
        };
        let mut pool = CandidatePool::new("e1");

        assert_eq!(ctx.stage_budget(), 50);
        let added = run(&ctx, &mut pool).await.unwrap();

        assert_eq!(added, 2);
        let stored = store.list_associations("e1").await.unwrap();
        let ids: HashSet<_> = stored.iter().map(|a| a.track_id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["t2", "t3"]));
        assert!(stored.iter().all(|a| a.status == TrackStatus::Generated));
    }

    #[tokio::test]
    async fn test_budget_caps_contribution() {
        let catalog = MockCatalog::new();
        let many: Vec<String> = (0..40).map(|i| format!("t{}", i)).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        for token in ["a", "b", "c"] {
            catalog.add_library_playlist(token, &format!("p{}", token), &many);
        }
        let store = MemoryStore::new();
        let credentials = MemberCredentials::new(
            AccessToken::new("a"),
            vec![Some(AccessToken::new("b")), Some(AccessToken::new("c"))],
        );
        let settings = GeneratorSettings {
            target_size: 30,
            reserved_slack: 10,
            ..GeneratorSettings::default()
        };
        let event = event();
        let ctx = GenerationContext {
            event: &event,
            credentials: &credentials,
            catalog: &catalog,
            store: &store,
            settings: &settings,
        };
        let mut pool = CandidatePool::new("e1");

        let added = run(&ctx, &mut pool).await.unwrap();

        assert_eq!(added, 18);
        assert_eq!(pool.entries()[0].track_id, "t0");
    }

    #[tokio::test]
    async fn test_failed_member_does_not_shrink_intersection() {
        let catalog = MockCatalog::new();
        catalog.add_library_playlist("a", "pa", &["t1", "t2"]);
        catalog.add_library_playlist("b", "pb", &["t2"]);
        catalog.fail_next("list_playlists", CatalogError::Unauthorized("expired".into()));
        let store = MemoryStore::new();
        let credentials =
            MemberCredentials::new(AccessToken::new("a"), vec![None, Some(AccessToken::new("b"))]);
        let settings = GeneratorSettings::default();
        let event = event();
        let ctx = GenerationContext {
            event: &event,
            credentials: &credentials,
            catalog: &catalog,
            store: &store,
            settings: &settings,
        };
        let mut pool = CandidatePool::new("e1");

        run(&ctx, &mut pool).await.unwrap();

        let ids: Vec<_> = pool.entries().iter().map(|a| a.track_id.as_str()).collect();
        assert_eq!(ids, vec!["t2"]);
    }
}
