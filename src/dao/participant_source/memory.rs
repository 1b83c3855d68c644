//! In-process participant source used for local development and tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use futures::{FutureExt, StreamExt, future::BoxFuture};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    dao::storage::{StorageError, StorageResult},
    state::participant::{
        ChangeEvent, ChangedFields, FieldChange, Participant, ParticipantId, Score,
        standings_order,
    },
};

use super::{ChangeFeed, ParticipantSource, PositionLookup};

const FEED_CAPACITY: usize = 256;

/// Participant store kept entirely in memory.
///
/// Every mutation goes through [`MemorySource::upsert`] or [`MemorySource::set_score`], which
/// publish a [`ChangeEvent`] on the push feed exactly like a remote store would.
#[derive(Clone)]
pub struct MemorySource {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    participants: Mutex<HashMap<ParticipantId, Participant>>,
    feed: broadcast::Sender<ChangeEvent>,
    knobs: Mutex<Knobs>,
    feed_available: AtomicBool,
    position_lookup: AtomicBool,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Default)]
struct Knobs {
    fetch_delay: Duration,
    failures_remaining: usize,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    /// Create an empty store with an available feed and direct position lookups.
    pub fn new() -> Self {
        let (feed, _receiver) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                participants: Mutex::new(HashMap::new()),
                feed,
                knobs: Mutex::new(Knobs::default()),
                feed_available: AtomicBool::new(true),
                position_lookup: AtomicBool::new(true),
                fetches: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Build a store pre-filled with `participants`, without publishing change events.
    pub fn with_participants(participants: impl IntoIterator<Item = Participant>) -> Self {
        let source = Self::new();
        {
            let mut guard = source.participants();
            for participant in participants {
                guard.insert(participant.id.clone(), participant);
            }
        }
        source
    }

    /// Insert or replace a participant and publish the corresponding change event.
    pub fn upsert(&self, participant: Participant) {
        let previous = self
            .participants()
            .insert(participant.id.clone(), participant.clone());
        let changes = diff(previous.as_ref(), &participant);
        self.publish(ChangeEvent {
            id: participant.id,
            changes,
            at: SystemTime::now(),
        });
    }

    /// Apply a score change to an existing participant and publish it.
    ///
    /// Returns the new score, or `None` when the participant is unknown.
    pub fn set_score(&self, id: &ParticipantId, score: Score) -> Option<Score> {
        let existing = self.participants().get(id).cloned()?;
        self.upsert(Participant { score, ..existing });
        Some(score)
    }

    /// Delay every subsequent fetch by `delay` (tokio time).
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.knobs().fetch_delay = delay;
    }

    /// Make the next `count` fetches fail.
    pub fn fail_next_fetches(&self, count: usize) {
        self.knobs().failures_remaining = count;
    }

    /// Toggle whether the push feed can be established.
    pub fn set_feed_available(&self, available: bool) {
        self.inner.feed_available.store(available, Ordering::SeqCst);
    }

    /// Toggle support for direct position lookups.
    pub fn set_position_lookup(&self, supported: bool) {
        self.inner.position_lookup.store(supported, Ordering::SeqCst);
    }

    /// Number of window fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of window fetches observed running at the same time.
    pub fn max_concurrent_fetches(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn publish(&self, event: ChangeEvent) {
        // No subscriber is a normal state before the feed supervisor connects.
        let _ = self.inner.feed.send(event);
    }

    fn participants(&self) -> MutexGuard<'_, HashMap<ParticipantId, Participant>> {
        self.inner
            .participants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn knobs(&self) -> MutexGuard<'_, Knobs> {
        self.inner
            .knobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the delay and consume one scripted failure, if any.
    fn next_fetch_plan(&self) -> (Duration, bool) {
        let mut knobs = self.knobs();
        let fail = knobs.failures_remaining > 0;
        if fail {
            knobs.failures_remaining -= 1;
        }
        (knobs.fetch_delay, fail)
    }

    fn ranked(&self) -> Vec<Participant> {
        let mut all: Vec<Participant> = self.participants().values().cloned().collect();
        all.sort_by(standings_order);
        all
    }
}

impl ParticipantSource for MemorySource {
    fn fetch_top_window(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<Participant>>> {
        let this = self.clone();
        async move {
            let inner = &this.inner;
            inner.fetches.fetch_add(1, Ordering::SeqCst);
            let running = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_in_flight.fetch_max(running, Ordering::SeqCst);
            let _in_flight = InFlight(&inner.in_flight);

            let (delay, fail) = this.next_fetch_plan();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if fail {
                return Err(StorageError::rejected("scripted fetch failure"));
            }

            let mut window = this.ranked();
            window.truncate(limit);
            Ok(window)
        }
        .boxed()
    }

    fn fetch_exact_position(
        &self,
        id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<PositionLookup>> {
        let this = self.clone();
        async move {
            if !this.inner.position_lookup.load(Ordering::SeqCst) {
                return Ok(PositionLookup::Unsupported);
            }

            let lookup = this
                .ranked()
                .into_iter()
                .enumerate()
                .find(|(_, participant)| participant.id == id)
                .map(|(index, participant)| PositionLookup::Found {
                    rank: index + 1,
                    score: participant.score,
                })
                .unwrap_or(PositionLookup::NotFound);
            Ok(lookup)
        }
        .boxed()
    }

    fn subscribe_changes(&self) -> BoxFuture<'static, StorageResult<ChangeFeed>> {
        let this = self.clone();
        async move {
            if !this.inner.feed_available.load(Ordering::SeqCst) {
                return Err(StorageError::rejected("change feed disabled"));
            }

            let receiver = this.inner.feed.subscribe();
            // Lagged receivers skip the dropped notifications; the next refresh catches up.
            let feed = BroadcastStream::new(receiver).filter_map(|item| async move { item.ok() });
            Ok(feed.boxed())
        }
        .boxed()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn diff(previous: Option<&Participant>, next: &Participant) -> ChangedFields {
    let old_label = previous.map(|p| p.label.clone());
    let old_score = previous.map(|p| p.score);

    ChangedFields {
        label: (old_label.as_deref() != Some(next.label.as_str())).then(|| FieldChange {
            old: old_label.clone(),
            new: next.label.clone(),
        }),
        primary: (old_score.map(|s| s.primary) != Some(next.score.primary)).then(|| {
            FieldChange {
                old: old_score.map(|s| s.primary),
                new: next.score.primary,
            }
        }),
        secondary: (old_score.map(|s| s.secondary) != Some(next.score.secondary)).then(|| {
            FieldChange {
                old: old_score.map(|s| s.secondary),
                new: next.score.secondary,
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemorySource {
        MemorySource::with_participants([
            Participant::new("a", "A", Score::new(100, 5)),
            Participant::new("c", "C", Score::new(90, 9)),
            Participant::new("b", "B", Score::new(100, 3)),
            Participant::new("d", "D", Score::new(80, 0)),
        ])
    }

    #[tokio::test]
    async fn window_is_ranked_and_truncated() {
        let source = seeded();
        let window = source.fetch_top_window(3).await.unwrap();
        let ids: Vec<_> = window.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn position_lookup_reports_global_rank() {
        let source = seeded();
        let lookup = source.fetch_exact_position("d".into()).await.unwrap();
        assert_eq!(
            lookup,
            PositionLookup::Found {
                rank: 4,
                score: Score::new(80, 0)
            }
        );
        assert_eq!(
            source.fetch_exact_position("zz".into()).await.unwrap(),
            PositionLookup::NotFound
        );

        source.set_position_lookup(false);
        assert_eq!(
            source.fetch_exact_position("d".into()).await.unwrap(),
            PositionLookup::Unsupported
        );
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed() {
        let source = seeded();
        source.fail_next_fetches(1);
        assert!(source.fetch_top_window(10).await.is_err());
        assert!(source.fetch_top_window(10).await.is_ok());
    }

    #[tokio::test]
    async fn feed_publishes_score_changes() {
        let source = seeded();
        let mut feed = source.subscribe_changes().await.unwrap();

        source.set_score(&"d".into(), Score::new(120, 0));
        let event = feed.next().await.unwrap();

        assert_eq!(event.id.as_str(), "d");
        assert_eq!(
            event.changes.primary,
            Some(FieldChange {
                old: Some(80),
                new: 120
            })
        );
        assert!(event.changes.secondary.is_none());
        assert!(event.changes.label.is_none());
    }

    #[tokio::test]
    async fn unavailable_feed_is_an_error() {
        let source = seeded();
        source.set_feed_available(false);
        assert!(source.subscribe_changes().await.is_err());
    }
}
