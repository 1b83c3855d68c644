use std::time::SystemTime;

use crate::state::{
    participant::{Participant, ParticipantId, Score},
    position::PositionResult,
};

/// Immutable snapshot of the standings handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    /// Ranked window, best first.
    pub entries: Vec<RankedEntry>,
    /// Tracked participant when it sits outside the window.
    pub tracked: Option<TrackedStanding>,
    /// True when the window holds no participant.
    pub empty: bool,
    /// True while an authoritative refresh is in flight.
    pub refreshing: bool,
    /// True when the last refresh failed; cleared by the next successful one.
    pub has_error: bool,
    /// Time of the last failed refresh.
    pub last_error_at: Option<SystemTime>,
    /// True while the push feed is connected.
    pub live: bool,
    /// Incremented on every published snapshot.
    pub revision: u64,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            tracked: None,
            empty: true,
            refreshing: false,
            has_error: false,
            last_error_at: None,
            live: false,
            revision: 0,
        }
    }
}

impl ViewModel {
    /// Entry for `id`, if it is in the window.
    pub fn entry(&self, id: &ParticipantId) -> Option<&RankedEntry> {
        self.entries.iter().find(|entry| &entry.participant.id == id)
    }
}

/// A window entry with its rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    /// 1-based rank inside the window.
    pub rank: usize,
    /// Participant record.
    pub participant: Participant,
    /// True for the locally tracked participant.
    pub is_tracked: bool,
    /// True when the score shown is a local, unconfirmed value.
    pub provisional: bool,
}

/// Standing of the tracked participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedStanding {
    /// Tracked identity.
    pub id: ParticipantId,
    /// Score known locally, provisional or confirmed.
    pub score: Option<Score>,
    /// Rank, exact or estimated.
    pub position: PositionResult,
    /// True when `score` has not been confirmed by the store yet.
    pub provisional: bool,
}
