#[cfg(feature = "http-source")]
pub mod http;
pub mod memory;

use futures::{future::BoxFuture, stream::BoxStream};

use crate::{
    dao::storage::StorageResult,
    state::participant::{ChangeEvent, Participant, ParticipantId, Score},
};

/// Outcome of a direct position lookup for a single participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionLookup {
    /// The store knows the participant's global rank and score.
    Found {
        /// 1-based rank among all participants.
        rank: usize,
        /// Authoritative score.
        score: Score,
    },
    /// The store has no record for the participant yet.
    NotFound,
    /// The store does not offer direct lookups; callers estimate instead.
    Unsupported,
}

/// Stream of change notifications pushed by the backing store.
pub type ChangeFeed = BoxStream<'static, ChangeEvent>;

/// Abstraction over the remote store holding every participant's score.
pub trait ParticipantSource: Send + Sync {
    /// Fetch up to `limit` participants, best first.
    fn fetch_top_window(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<Participant>>>;
    /// Look up the global rank and score of a single participant.
    fn fetch_exact_position(
        &self,
        id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<PositionLookup>>;
    /// Open the push feed of participant mutations.
    fn subscribe_changes(&self) -> BoxFuture<'static, StorageResult<ChangeFeed>>;
}
