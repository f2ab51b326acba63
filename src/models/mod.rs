use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Catalog metadata for a single track.
///
/// Created the first time a track id is seen and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    /// Comma separated genres of the primary artist, or "Unknown"
    pub genre: String,
    pub artist_id: String,
    pub artist_name: String,
    pub artwork_url: String,
}

impl Track {
    pub fn uri(&self) -> String {
        track_uri(&self.id)
    }
}

pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

/// Curation state of a track inside one event.
///
/// The levels form a hierarchy: every level carries the rights of the
/// levels below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackStatus {
    Denied,
    Proposed,
    AcceptedPlaylist,
    Generated,
    Accepted,
}

impl TrackStatus {
    pub const ALL: [TrackStatus; 5] = [
        TrackStatus::Denied,
        TrackStatus::Proposed,
        TrackStatus::AcceptedPlaylist,
        TrackStatus::Generated,
        TrackStatus::Accepted,
    ];

    pub fn rank(self) -> u8 {
        match self {
            TrackStatus::Denied => 0,
            TrackStatus::Proposed => 1,
            TrackStatus::AcceptedPlaylist => 2,
            TrackStatus::Generated => 3,
            TrackStatus::Accepted => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackStatus::Denied => "DENIED",
            TrackStatus::Proposed => "PROPOSED",
            TrackStatus::AcceptedPlaylist => "ACCEPTED_PLAYLIST",
            TrackStatus::Generated => "GENERATED",
            TrackStatus::Accepted => "ACCEPTED",
        }
    }

    /// Status after the generator independently discovers the track again.
    ///
    /// `Denied` is a sticky floor and anything at or above `Generated` is
    /// kept; every other level is raised to `Generated`.
    pub fn merge_generated(self) -> TrackStatus {
        match self {
            TrackStatus::Denied => TrackStatus::Denied,
            s if s >= TrackStatus::Generated => s,
            _ => TrackStatus::Generated,
        }
    }

    /// Whether generation may push the track to the remote playlist.
    pub fn is_publishable(self) -> bool {
        matches!(
            self,
            TrackStatus::Generated | TrackStatus::AcceptedPlaylist | TrackStatus::Accepted
        )
    }

    /// Whether an admin may set this status by hand.
    pub fn is_manual(self) -> bool {
        !matches!(self, TrackStatus::Proposed | TrackStatus::Generated)
    }
}

impl PartialOrd for TrackStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrackStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Invalid track status: '{}'. Valid: denied, proposed, accepted_playlist, generated, accepted",
                    s
                )
            })
    }
}

/// A track's membership in an event, at most one per (event, track).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAssociation {
    pub id: String,
    pub event_id: String,
    pub track_id: String,
    pub status: TrackStatus,
}

impl TrackAssociation {
    pub fn new(event_id: &str, track_id: &str, status: TrackStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            track_id: track_id.to_string(),
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: String,
    pub name: String,
    /// Unix timestamp (seconds)
    pub date: i64,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Participant => "participant",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "participant" => Ok(Role::Participant),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(format!(
                "Invalid role: '{}'. Valid: participant, admin, owner",
                s
            )),
        }
    }
}

/// A user's participation in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Catalog user id
    pub user_id: String,
    pub event_id: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
}

/// A generated remote playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Remote playlist id
    pub id: String,
    pub event_id: String,
    pub accepted: bool,
    pub created_at: i64,
}

/// Short-lived bearer credential for the catalog.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Refreshed credentials of every member, owner first.
///
/// A member whose refresh failed keeps a `None` slot so the per-member
/// budget still counts them.
#[derive(Debug, Clone)]
pub struct MemberCredentials {
    owner: AccessToken,
    others: Vec<Option<AccessToken>>,
}

impl MemberCredentials {
    pub fn new(owner: AccessToken, others: Vec<Option<AccessToken>>) -> Self {
        Self { owner, others }
    }

    /// Token for lookups that don't depend on who is asking.
    pub fn authoritative(&self) -> &AccessToken {
        &self.owner
    }

    /// All slots in order, owner at index 0.
    pub fn slots(&self) -> impl Iterator<Item = Option<&AccessToken>> {
        std::iter::once(Some(&self.owner)).chain(self.others.iter().map(Option::as_ref))
    }

    pub fn valid(&self) -> impl Iterator<Item = &AccessToken> {
        self.slots().flatten()
    }

    pub fn member_count(&self) -> usize {
        1 + self.others.len()
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }
}
