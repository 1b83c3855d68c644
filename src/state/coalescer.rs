//! Filtering and debouncing of change notifications before they trigger a refresh.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

use crate::state::{
    participant::{ChangeEvent, ParticipantId},
    registry::RankedRegistry,
};

/// Default quiet period per participant.
pub const DEFAULT_PER_IDENTITY_DEBOUNCE: Duration = Duration::from_millis(1_000);
/// Default quiet period across all participants.
pub const DEFAULT_GLOBAL_DEBOUNCE: Duration = Duration::from_millis(2_000);

/// What the coalescer decided for a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDecision {
    /// One authoritative refresh should be scheduled.
    Emit,
    /// Nothing to do for this event.
    Suppressed(SuppressReason),
}

/// Why an event did not trigger a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The change cannot affect the visible window.
    Irrelevant,
    /// The same participant signalled within the per-identity window.
    IdentityDebounced,
    /// Another participant signalled within the global window.
    GlobalDebounced,
}

/// Turns bursts of change events into at most one refresh signal per window.
///
/// Holds only signal timestamps, never participant data, and can be reset at any time.
#[derive(Debug, Clone)]
pub struct UpdateCoalescer {
    per_identity: Duration,
    global: Duration,
    last_by_identity: IndexMap<ParticipantId, Instant>,
    last_global: Option<Instant>,
    deferred: bool,
}

impl Default for UpdateCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_PER_IDENTITY_DEBOUNCE, DEFAULT_GLOBAL_DEBOUNCE)
    }
}

impl UpdateCoalescer {
    /// Build a coalescer with the given debounce windows.
    pub fn new(per_identity: Duration, global: Duration) -> Self {
        Self {
            per_identity,
            global,
            last_by_identity: IndexMap::new(),
            last_global: None,
            deferred: false,
        }
    }

    /// Classify `event` against the current window at time `now`.
    pub fn on_event(
        &mut self,
        event: &ChangeEvent,
        registry: &RankedRegistry,
        now: Instant,
    ) -> SignalDecision {
        self.prune(now);

        if !is_significant(event, registry) {
            return SignalDecision::Suppressed(SuppressReason::Irrelevant);
        }

        if let Some(last) = self.last_by_identity.get(&event.id)
            && now.duration_since(*last) < self.per_identity
        {
            self.deferred = true;
            return SignalDecision::Suppressed(SuppressReason::IdentityDebounced);
        }

        if self.global_window_open(now) {
            self.deferred = true;
            return SignalDecision::Suppressed(SuppressReason::GlobalDebounced);
        }

        self.last_by_identity.insert(event.id.clone(), now);
        self.record_emit(now);
        SignalDecision::Emit
    }

    /// Time at which a suppressed burst may be flushed, if one is waiting.
    pub fn deferred_deadline(&self) -> Option<Instant> {
        if !self.deferred {
            return None;
        }
        Some(
            self.last_global
                .map(|last| last + self.global)
                .unwrap_or_else(Instant::now),
        )
    }

    /// Emit once for significant events suppressed earlier, if the global window allows it.
    pub fn flush_deferred(&mut self, now: Instant) -> SignalDecision {
        if !self.deferred {
            return SignalDecision::Suppressed(SuppressReason::Irrelevant);
        }
        if self.global_window_open(now) {
            return SignalDecision::Suppressed(SuppressReason::GlobalDebounced);
        }
        self.record_emit(now);
        SignalDecision::Emit
    }

    /// Forget every timestamp and deferred signal.
    pub fn reset(&mut self) {
        self.last_by_identity.clear();
        self.last_global = None;
        self.deferred = false;
    }

    fn record_emit(&mut self, now: Instant) {
        self.last_global = Some(now);
        self.deferred = false;
    }

    fn global_window_open(&self, now: Instant) -> bool {
        self.last_global
            .is_some_and(|last| now.duration_since(last) < self.global)
    }

    /// Drop identities whose debounce window has elapsed.
    fn prune(&mut self, now: Instant) {
        let window = self.per_identity;
        self.last_by_identity
            .retain(|_, last| now.duration_since(*last) < window);
    }
}

/// True when `event` could change what the window shows.
///
/// The event must modify a score, and the participant must either be in the window or
/// be able to enter it: the window has a free slot, or the new primary score beats the
/// lowest one shown.
pub fn is_significant(event: &ChangeEvent, registry: &RankedRegistry) -> bool {
    if !event.changes.touches_score() {
        return false;
    }

    if registry.lookup(&event.id).is_some() || !registry.is_full() {
        return true;
    }

    match (registry.lowest_score(), &event.changes.primary) {
        (None, _) => true,
        (Some(lowest), Some(primary)) => primary.new > lowest.primary,
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::participant::{ChangedFields, FieldChange, Participant, Score};

    fn full_registry() -> RankedRegistry {
        let mut registry = RankedRegistry::new(3);
        registry.replace(vec![
            Participant::new("a", "A", Score::new(100, 5)),
            Participant::new("b", "B", Score::new(100, 3)),
            Participant::new("c", "C", Score::new(90, 9)),
        ]);
        registry
    }

    fn raise(id: &str, primary: u64) -> ChangeEvent {
        ChangeEvent::score_change(id, None, Score::new(primary, 0))
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn label_change_is_never_significant() {
        let registry = full_registry();
        let event = ChangeEvent {
            id: "a".into(),
            changes: ChangedFields {
                label: Some(FieldChange {
                    old: Some("A".into()),
                    new: "Ada".into(),
                }),
                ..ChangedFields::default()
            },
            at: SystemTime::now(),
        };

        let mut coalescer = UpdateCoalescer::default();
        assert_eq!(
            coalescer.on_event(&event, &registry, Instant::now()),
            SignalDecision::Suppressed(SuppressReason::Irrelevant)
        );
        assert_eq!(coalescer.deferred_deadline(), None);
    }

    #[test]
    fn outsider_must_beat_lowest_primary() {
        let registry = full_registry();
        assert!(!is_significant(&raise("z", 90), &registry));
        assert!(is_significant(&raise("z", 91), &registry));
    }

    #[test]
    fn window_member_change_is_significant() {
        let registry = full_registry();
        assert!(is_significant(&raise("c", 1), &registry));
    }

    #[test]
    fn any_score_change_matters_while_window_has_room() {
        let mut registry = RankedRegistry::new(10);
        assert!(is_significant(&raise("z", 0), &registry));

        registry.replace(vec![Participant::new("a", "A", Score::new(100, 5))]);
        assert!(is_significant(&raise("z", 1), &registry));
    }

    #[test]
    fn secondary_only_change_cannot_displace_full_window() {
        let registry = full_registry();
        let event = ChangeEvent {
            id: "z".into(),
            changes: ChangedFields {
                secondary: Some(FieldChange { old: None, new: 50 }),
                ..ChangedFields::default()
            },
            at: SystemTime::now(),
        };
        assert!(!is_significant(&event, &registry));
    }

    #[test]
    fn burst_for_one_identity_emits_once() {
        let registry = full_registry();
        let mut coalescer = UpdateCoalescer::default();
        let start = Instant::now();

        let emits = (0..5)
            .map(|i| coalescer.on_event(&raise("a", 101 + i), &registry, start + ms(i * 100)))
            .filter(|decision| *decision == SignalDecision::Emit)
            .count();
        assert_eq!(emits, 1);
    }

    #[test]
    fn identity_may_signal_again_after_both_windows() {
        let registry = full_registry();
        let mut coalescer = UpdateCoalescer::default();
        let start = Instant::now();

        assert_eq!(
            coalescer.on_event(&raise("a", 101), &registry, start),
            SignalDecision::Emit
        );
        assert_eq!(
            coalescer.on_event(&raise("a", 102), &registry, start + ms(1_500)),
            SignalDecision::Suppressed(SuppressReason::GlobalDebounced)
        );
        assert_eq!(
            coalescer.on_event(&raise("a", 103), &registry, start + ms(2_000)),
            SignalDecision::Emit
        );
    }

    #[test]
    fn burst_across_identities_collapses_to_one_signal() {
        let registry = full_registry();
        let mut coalescer = UpdateCoalescer::default();
        let start = Instant::now();

        assert_eq!(
            coalescer.on_event(&raise("a", 101), &registry, start),
            SignalDecision::Emit
        );
        for (offset, id) in ["b", "c", "x", "y"].into_iter().enumerate() {
            assert_eq!(
                coalescer.on_event(&raise(id, 200), &registry, start + ms(offset as u64 * 10)),
                SignalDecision::Suppressed(SuppressReason::GlobalDebounced)
            );
        }
    }

    #[test]
    fn suppressed_burst_is_flushed_once_after_global_window() {
        let registry = full_registry();
        let mut coalescer = UpdateCoalescer::default();
        let start = Instant::now();

        coalescer.on_event(&raise("a", 101), &registry, start);
        coalescer.on_event(&raise("b", 150), &registry, start + ms(300));
        assert_eq!(coalescer.deferred_deadline(), Some(start + ms(2_000)));

        assert_eq!(
            coalescer.flush_deferred(start + ms(1_999)),
            SignalDecision::Suppressed(SuppressReason::GlobalDebounced)
        );
        assert_eq!(coalescer.flush_deferred(start + ms(2_000)), SignalDecision::Emit);
        assert_eq!(coalescer.deferred_deadline(), None);
        assert_eq!(
            coalescer.flush_deferred(start + ms(5_000)),
            SignalDecision::Suppressed(SuppressReason::Irrelevant)
        );
    }

    #[test]
    fn expired_identities_are_pruned() {
        let registry = full_registry();
        let mut coalescer = UpdateCoalescer::default();
        let start = Instant::now();

        coalescer.on_event(&raise("a", 101), &registry, start);
        assert_eq!(coalescer.last_by_identity.len(), 1);

        coalescer.on_event(&raise("b", 101), &registry, start + ms(5_000));
        assert_eq!(coalescer.last_by_identity.len(), 1);
        assert!(coalescer.last_by_identity.contains_key(&ParticipantId::from("b")));
    }

    #[test]
    fn reset_forgets_timers() {
        let registry = full_registry();
        let mut coalescer = UpdateCoalescer::default();
        let start = Instant::now();

        coalescer.on_event(&raise("a", 101), &registry, start);
        coalescer.reset();
        assert_eq!(
            coalescer.on_event(&raise("a", 102), &registry, start + ms(10)),
            SignalDecision::Emit
        );
    }
}
