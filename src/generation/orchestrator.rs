use super::{
    common_library, credentials, genre_recommendations, materialize, top_tracks, CandidatePool,
    EventLocks, GenerationContext, GenerationOutcome,
};
use crate::catalog::{CatalogClient, CredentialRefresher};
use crate::config::GeneratorSettings;
use crate::errors::GenerationError;
use crate::store::EventStore;
use std::sync::Arc;

/// Runs the generation stages for one event at a time.
pub struct PlaylistGenerator {
    catalog: Arc<dyn CatalogClient>,
    refresher: Arc<dyn CredentialRefresher>,
    store: Arc<dyn EventStore>,
    settings: GeneratorSettings,
    locks: EventLocks,
}

impl PlaylistGenerator {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        refresher: Arc<dyn CredentialRefresher>,
        store: Arc<dyn EventStore>,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            catalog,
            refresher,
            store,
            settings,
            locks: EventLocks::new(),
        }
    }

    /// Share locks with other generators working on the same store.
    pub fn with_locks(mut self, locks: EventLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &EventLocks {
        &self.locks
    }

    /// Throw away the event's previous generation and build a new playlist.
    pub async fn generate(&self, event_id: &str) -> Result<GenerationOutcome, GenerationError> {
        let _guard = self
            .locks
            .try_acquire(event_id)
            .ok_or_else(|| GenerationError::AlreadyRunning(event_id.to_string()))?;

        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| GenerationError::EventNotFound(event_id.to_string()))?;
        log::info!("Generating playlist for event {} ({})", event.id, event.name);

        // 1. Credentials, before anything is reset
        let members = self.store.list_members(event_id).await?;
        let (owner, credentials) = credentials::refresh_members(
            event_id,
            &members,
            self.refresher.as_ref(),
            self.store.as_ref(),
        )
        .await?;

        // 2. Hard reset of the previous generation
        self.store.reset_generation(event_id).await?;

        let ctx = GenerationContext {
            event: &event,
            credentials: &credentials,
            catalog: self.catalog.as_ref(),
            store: self.store.as_ref(),
            settings: &self.settings,
        };
        log::info!(
            "Stage budget {} for {} members",
            ctx.stage_budget(),
            credentials.member_count()
        );

        // 3. Stages, each flushing what it merged
        let mut pool = CandidatePool::new(event_id);
        let common = common_library::run(&ctx, &mut pool).await?;
        log::info!("Common-library stage added {} tracks", common);
        top_tracks::run(&ctx, &mut pool).await?;
        genre_recommendations::run(&ctx, &mut pool).await?;

        // 4. Publish
        let pool_size = pool.len();
        let published = materialize::run(&ctx, &owner, pool).await?;

        Ok(GenerationOutcome {
            playlist_id: published.playlist_id,
            owner_token: credentials.authoritative().clone(),
            submitted: published.submitted,
            pool_size,
        })
    }
}
