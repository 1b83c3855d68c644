//! Ordered top-N window of participants.

use std::collections::HashSet;

use crate::state::participant::{Participant, ParticipantId, Score, standings_order};

/// Largest window the registry accepts.
pub const MAX_WINDOW_SIZE: usize = 50;
/// Window size used when none is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// In-memory ranked window of the best participants.
///
/// Entries are always ordered best first by [`standings_order`]; the rank of an entry is
/// its 1-based position in the window.
#[derive(Debug, Clone)]
pub struct RankedRegistry {
    capacity: usize,
    entries: Vec<Participant>,
}

impl RankedRegistry {
    /// Create an empty registry tracking at most `capacity` participants.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_WINDOW_SIZE);
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Swap the tracked window for a freshly fetched one.
    ///
    /// The input must already be ordered and fit the capacity; see [`prepare_window`].
    pub fn replace(&mut self, window: Vec<Participant>) {
        debug_assert!(is_ordered(&window), "window must be ordered best first");
        debug_assert!(window.len() <= self.capacity, "window exceeds capacity");
        self.entries = window;
    }

    /// Find a participant, returning its 1-based rank and record.
    pub fn lookup(&self, id: &ParticipantId) -> Option<(usize, &Participant)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, participant)| &participant.id == id)
            .map(|(index, participant)| (index + 1, participant))
    }

    /// Score of the last entry, if any.
    pub fn lowest_score(&self) -> Option<Score> {
        self.entries.last().map(|participant| participant.score)
    }

    /// Move an existing entry to the slot matching `score`.
    ///
    /// Used for provisional local updates; returns the new rank, or `None` when the
    /// participant is not in the window.
    pub fn reposition(&mut self, id: &ParticipantId, score: Score) -> Option<usize> {
        let index = self.entries.iter().position(|p| &p.id == id)?;
        let mut participant = self.entries.remove(index);
        participant.score = score;

        let slot = self
            .entries
            .partition_point(|existing| standings_order(existing, &participant).is_lt());
        self.entries.insert(slot, participant);
        Some(slot + 1)
    }

    /// Ordered entries, best first.
    pub fn entries(&self) -> &[Participant] {
        &self.entries
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no participant is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the window holds `capacity` entries.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

/// True when every adjacent pair respects [`standings_order`] strictly.
pub fn is_ordered(window: &[Participant]) -> bool {
    window
        .windows(2)
        .all(|pair| standings_order(&pair[0], &pair[1]).is_lt())
}

/// A fetched window made safe for [`RankedRegistry::replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWindow {
    /// Ordered, de-duplicated, truncated entries.
    pub entries: Vec<Participant>,
    /// True when the input was out of order and had to be sorted.
    pub resorted: bool,
    /// Number of duplicate identities dropped.
    pub duplicates: usize,
}

/// Order, de-duplicate and truncate a fetched window.
///
/// Duplicate identities keep their best-ranked record.
pub fn prepare_window(mut window: Vec<Participant>, capacity: usize) -> PreparedWindow {
    let resorted = !is_ordered(&window);
    if resorted {
        window.sort_by(standings_order);
    }

    let before = window.len();
    let mut seen = HashSet::new();
    window.retain(|participant| seen.insert(participant.id.clone()));
    let duplicates = before - window.len();

    window.truncate(capacity);

    PreparedWindow {
        entries: window,
        resorted,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str, primary: u64, secondary: u64) -> Participant {
        Participant::new(id, id.to_uppercase(), Score::new(primary, secondary))
    }

    fn sample() -> RankedRegistry {
        let mut registry = RankedRegistry::new(3);
        registry.replace(vec![
            participant("a", 100, 5),
            participant("b", 100, 3),
            participant("c", 90, 9),
        ]);
        registry
    }

    #[test]
    fn lookup_reports_rank_with_secondary_tie_break() {
        let registry = sample();
        let (rank, found) = registry.lookup(&"b".into()).unwrap();
        assert_eq!(rank, 2);
        assert_eq!(found.score, Score::new(100, 3));
        assert!(registry.lookup(&"zz".into()).is_none());
    }

    #[test]
    fn lowest_score_is_last_entry() {
        assert_eq!(sample().lowest_score(), Some(Score::new(90, 9)));
        assert_eq!(RankedRegistry::new(10).lowest_score(), None);
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(RankedRegistry::new(0).capacity(), 1);
        assert_eq!(RankedRegistry::new(500).capacity(), MAX_WINDOW_SIZE);
    }

    #[test]
    fn reposition_moves_entry_down() {
        let mut registry = sample();
        let rank = registry.reposition(&"a".into(), Score::new(50, 6));
        assert_eq!(rank, Some(3));

        let ids: Vec<_> = registry.entries().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
        assert!(is_ordered(registry.entries()));
    }

    #[test]
    fn reposition_moves_entry_up() {
        let mut registry = sample();
        assert_eq!(registry.reposition(&"c".into(), Score::new(100, 4)), Some(2));
        let ids: Vec<_> = registry.entries().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "b"]);
    }

    #[test]
    fn reposition_ignores_unknown_participant() {
        let mut registry = sample();
        assert_eq!(registry.reposition(&"zz".into(), Score::new(1, 1)), None);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn identical_scores_are_ordered_by_identity() {
        let window = vec![participant("y", 10, 1), participant("x", 10, 1)];
        assert!(!is_ordered(&window));

        let prepared = prepare_window(window, 10);
        let ids: Vec<_> = prepared.entries.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["x", "y"]);
        assert!(prepared.resorted);
    }

    #[test]
    fn prepare_window_sorts_dedupes_and_truncates() {
        let window = vec![
            participant("c", 90, 9),
            participant("a", 100, 5),
            participant("a", 10, 0),
            participant("b", 100, 3),
            participant("d", 80, 0),
        ];

        let prepared = prepare_window(window, 3);
        let ids: Vec<_> = prepared.entries.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(prepared.entries[0].score, Score::new(100, 5));
        assert!(prepared.resorted);
        assert_eq!(prepared.duplicates, 1);
        assert!(is_ordered(&prepared.entries));
    }

    #[test]
    fn prepare_window_keeps_ordered_input_untouched() {
        let prepared = prepare_window(sample().entries().to_vec(), 10);
        assert!(!prepared.resorted);
        assert_eq!(prepared.duplicates, 0);
        assert_eq!(prepared.entries.len(), 3);
    }
}
