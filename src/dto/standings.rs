use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::{
        position::PositionResult,
        sync_machine::RefreshRequest,
        view_model::{RankedEntry, TrackedStanding, ViewModel},
    },
};

/// Ranked window and sync status, as served by `GET /standings` and the SSE stream.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct StandingsResponse {
    /// Ranked window, best first.
    pub entries: Vec<StandingEntry>,
    /// Present when the tracked participant sits outside the window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked: Option<TrackedStandingSummary>,
    /// True when no participant is known yet.
    pub empty: bool,
    /// True while an authoritative refresh is in flight.
    pub refreshing: bool,
    /// True when the last refresh failed.
    pub has_error: bool,
    /// RFC 3339 time of the last failed refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<String>,
    /// True while the push feed is connected.
    pub live: bool,
    /// Monotonic snapshot counter.
    pub revision: u64,
}

/// One row of the ranked window.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct StandingEntry {
    pub rank: usize,
    pub id: String,
    pub label: String,
    pub points: u64,
    pub items: u64,
    /// True for the locally tracked participant.
    pub is_tracked: bool,
    /// True when the score is a local estimate awaiting confirmation.
    pub provisional: bool,
}

/// Standing of the tracked participant when it is outside the window.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct TrackedStandingSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<u64>,
    pub position: PositionSummary,
    pub provisional: bool,
}

/// Rank of a participant, exact or estimated.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionSummary {
    /// Rank confirmed by the store.
    Exact { rank: usize },
    /// Best rank the participant can hold given the window.
    Estimated { rank: usize },
    /// No score known yet.
    Unknown,
}

/// Outcome of `POST /standings/refresh`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    /// False when a refresh was already in flight and a follow-up got queued instead.
    pub started: bool,
    pub message: String,
}

impl From<&ViewModel> for StandingsResponse {
    fn from(view: &ViewModel) -> Self {
        Self {
            entries: view.entries.iter().map(StandingEntry::from).collect(),
            tracked: view.tracked.as_ref().map(TrackedStandingSummary::from),
            empty: view.empty,
            refreshing: view.refreshing,
            has_error: view.has_error,
            last_error_at: view.last_error_at.map(format_system_time),
            live: view.live,
            revision: view.revision,
        }
    }
}

impl From<&RankedEntry> for StandingEntry {
    fn from(entry: &RankedEntry) -> Self {
        Self {
            rank: entry.rank,
            id: entry.participant.id.to_string(),
            label: entry.participant.label.clone(),
            points: entry.participant.score.primary,
            items: entry.participant.score.secondary,
            is_tracked: entry.is_tracked,
            provisional: entry.provisional,
        }
    }
}

impl From<&TrackedStanding> for TrackedStandingSummary {
    fn from(tracked: &TrackedStanding) -> Self {
        Self {
            id: tracked.id.to_string(),
            points: tracked.score.map(|score| score.primary),
            items: tracked.score.map(|score| score.secondary),
            position: tracked.position.into(),
            provisional: tracked.provisional,
        }
    }
}

impl From<PositionResult> for PositionSummary {
    fn from(position: PositionResult) -> Self {
        match position {
            PositionResult::Exact(rank) => PositionSummary::Exact { rank },
            PositionResult::Estimated(rank) => PositionSummary::Estimated { rank },
            PositionResult::Unknown => PositionSummary::Unknown,
        }
    }
}

impl From<RefreshRequest> for RefreshResponse {
    fn from(request: RefreshRequest) -> Self {
        match request {
            RefreshRequest::Started(cycle) => Self {
                started: true,
                message: format!("refresh cycle {cycle} started"),
            },
            RefreshRequest::Deferred => Self {
                started: false,
                message: "refresh already in flight; follow-up queued".into(),
            },
        }
    }
}
