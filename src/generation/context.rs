use crate::catalog::CatalogClient;
use crate::config::GeneratorSettings;
use crate::models::{AccessToken, Event, MemberCredentials};
use crate::store::EventStore;

/// Everything a stage needs besides the pool it writes into.
#[derive(Clone, Copy)]
pub struct GenerationContext<'a> {
    pub event: &'a Event,
    pub credentials: &'a MemberCredentials,
    pub catalog: &'a dyn CatalogClient,
    pub store: &'a dyn EventStore,
    pub settings: &'a GeneratorSettings,
}

impl<'a> GenerationContext<'a> {
    pub fn authoritative(&self) -> &'a AccessToken {
        self.credentials.authoritative()
    }

    /// Per-stage cap, shared by every member whether their refresh worked or not.
    pub fn stage_budget(&self) -> usize {
        self.settings.stage_budget(self.credentials.member_count())
    }
}
