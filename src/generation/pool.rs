//! Working set of a single generation run.
//!
//! Every stage contributes tracks through [`CandidatePool::contribute`],
//! which applies [`TrackStatus::merge_generated`] and keeps the durable
//! association of (event, track) unique.

use super::GenerationContext;
use crate::catalog::describe_track;
use crate::models::{TrackAssociation, TrackStatus};
use crate::store::{EventStore, StoreError};
use std::collections::{HashMap, HashSet};

/// What a contribution did to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
    /// New association at `Generated`
    Created,
    /// Association found in the store, pulled into the pool
    Adopted,
    /// Already pooled, status raised to `Generated`
    Promoted,
    /// Already pooled, status kept
    Unchanged,
    /// Metadata unavailable, track left out
    Skipped,
}

impl Contribution {
    pub fn is_new(self) -> bool {
        matches!(self, Contribution::Created | Contribution::Adopted)
    }
}

pub struct CandidatePool {
    event_id: String,
    entries: Vec<TrackAssociation>,
    index: HashMap<String, usize>,
    dirty: HashSet<String>,
}

impl CandidatePool {
    pub fn new(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            entries: Vec::new(),
            index: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    /// Pool over already built associations. Entries are kept as given,
    /// lookups resolve to the first entry of a track.
    pub fn with_entries(event_id: &str, entries: Vec<TrackAssociation>) -> Self {
        let mut index = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            index.entry(entry.track_id.clone()).or_insert(i);
        }
        Self {
            event_id: event_id.to_string(),
            entries,
            index,
            dirty: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, track_id: &str) -> Option<&TrackAssociation> {
        self.index.get(track_id).map(|&i| &self.entries[i])
    }

    /// Associations in the order they entered the pool.
    pub fn entries(&self) -> &[TrackAssociation] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TrackAssociation> {
        self.entries
    }

    /// Merge one track into the pool.
    pub async fn contribute(
        &mut self,
        ctx: &GenerationContext<'_>,
        track_id: &str,
    ) -> Result<Contribution, StoreError> {
        if let Some(&i) = self.index.get(track_id) {
            let entry = &mut self.entries[i];
            let merged = entry.status.merge_generated();
            if merged == entry.status {
                return Ok(Contribution::Unchanged);
            }
            log::debug!("Promoting {} from {} to {}", track_id, entry.status, merged);
            entry.status = merged;
            self.dirty.insert(track_id.to_string());
            return Ok(Contribution::Promoted);
        }

        if let Some(mut existing) = ctx.store.find_association(&self.event_id, track_id).await? {
            let merged = existing.status.merge_generated();
            if merged != existing.status {
                log::debug!("Promoting {} from {} to {}", track_id, existing.status, merged);
                existing.status = merged;
                self.dirty.insert(track_id.to_string());
            }
            self.push(existing);
            return Ok(Contribution::Adopted);
        }

        if !ensure_track(ctx, track_id).await? {
            return Ok(Contribution::Skipped);
        }

        self.push(TrackAssociation::new(
            &self.event_id,
            track_id,
            TrackStatus::Generated,
        ));
        self.dirty.insert(track_id.to_string());
        Ok(Contribution::Created)
    }

    /// Contribute each id in order and count the tracks new to the pool.
    pub async fn contribute_all<I, S>(
        &mut self,
        ctx: &GenerationContext<'_>,
        track_ids: I,
    ) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for id in track_ids {
            if self.contribute(ctx, id.as_ref()).await?.is_new() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Write every association changed since the last flush.
    pub async fn flush(&mut self, store: &dyn EventStore) -> Result<usize, StoreError> {
        let mut written = 0;
        for entry in &self.entries {
            if self.dirty.contains(&entry.track_id) {
                store.upsert_association(entry).await?;
                written += 1;
            }
        }
        self.dirty.clear();
        Ok(written)
    }

    fn push(&mut self, association: TrackAssociation) {
        self.index
            .insert(association.track_id.clone(), self.entries.len());
        self.entries.push(association);
    }
}

/// Make sure the track's metadata is stored, fetching it on first sight.
/// Returns false when the catalog can't describe the track.
async fn ensure_track(ctx: &GenerationContext<'_>, track_id: &str) -> Result<bool, StoreError> {
    if ctx.store.find_track(track_id).await?.is_some() {
        return Ok(true);
    }

    match describe_track(ctx.catalog, ctx.authoritative(), track_id).await {
        Ok(track) => {
            ctx.store.insert_track(&track).await?;
            Ok(true)
        }
        Err(e) => {
            log::warn!("Skipping track {}, metadata unavailable: {}", track_id, e);
            Ok(false)
        }
    }
}
