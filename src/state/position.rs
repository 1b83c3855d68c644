//! Rank resolution for a single participant against the tracked window.

use crate::state::{
    participant::{ParticipantId, Score},
    registry::RankedRegistry,
};

/// Rank of a participant as far as the local window can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionResult {
    /// Participant found at this 1-based rank.
    Exact(usize),
    /// Participant outside the window; its true rank is this value or worse.
    Estimated(usize),
    /// No score known for the participant yet.
    Unknown,
}

impl PositionResult {
    /// Rank carried by the result, exact or estimated.
    pub fn rank(&self) -> Option<usize> {
        match self {
            PositionResult::Exact(rank) | PositionResult::Estimated(rank) => Some(*rank),
            PositionResult::Unknown => None,
        }
    }
}

/// Resolves ranks against a borrowed [`RankedRegistry`].
pub struct PositionTracker<'a> {
    registry: &'a RankedRegistry,
}

impl<'a> PositionTracker<'a> {
    /// Track positions within `registry`.
    pub fn new(registry: &'a RankedRegistry) -> Self {
        Self { registry }
    }

    /// Exact rank when `id` is in the window, otherwise a conservative estimate from
    /// `known_score`.
    ///
    /// The estimate counts window entries ranking at least as high as `known_score`, so it
    /// is a lower bound of the rank number: participants outside the window can only push
    /// the true rank further down.
    pub fn resolve(&self, id: &ParticipantId, known_score: Option<Score>) -> PositionResult {
        if let Some((rank, _)) = self.registry.lookup(id) {
            return PositionResult::Exact(rank);
        }

        let Some(score) = known_score else {
            return PositionResult::Unknown;
        };

        let ahead = self
            .registry
            .entries()
            .iter()
            .filter(|entry| entry.score.ranks_at_least(&score))
            .count();
        PositionResult::Estimated(ahead + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::participant::Participant;

    fn registry() -> RankedRegistry {
        let mut registry = RankedRegistry::new(10);
        registry.replace(vec![
            Participant::new("a", "A", Score::new(100, 5)),
            Participant::new("b", "B", Score::new(100, 3)),
            Participant::new("c", "C", Score::new(90, 9)),
        ]);
        registry
    }

    #[test]
    fn participant_in_window_is_exact() {
        let registry = registry();
        let tracker = PositionTracker::new(&registry);
        assert_eq!(
            tracker.resolve(&"b".into(), Some(Score::new(1, 1))),
            PositionResult::Exact(2)
        );
    }

    #[test]
    fn participant_outside_window_is_estimated() {
        let registry = registry();
        let tracker = PositionTracker::new(&registry);
        assert_eq!(
            tracker.resolve(&"d".into(), Some(Score::new(80, 0))),
            PositionResult::Estimated(4)
        );
    }

    #[test]
    fn equal_score_counts_as_ahead() {
        let registry = registry();
        let tracker = PositionTracker::new(&registry);
        assert_eq!(
            tracker.resolve(&"d".into(), Some(Score::new(100, 3))),
            PositionResult::Estimated(3)
        );
        assert_eq!(
            tracker.resolve(&"d".into(), Some(Score::new(100, 4))),
            PositionResult::Estimated(2)
        );
    }

    #[test]
    fn missing_score_is_unknown() {
        let registry = registry();
        let tracker = PositionTracker::new(&registry);
        assert_eq!(tracker.resolve(&"d".into(), None), PositionResult::Unknown);
    }

    #[test]
    fn estimate_is_lower_bound_of_true_rank() {
        // Full population, of which the window only sees the top three.
        let population = [
            Score::new(100, 5),
            Score::new(100, 3),
            Score::new(90, 9),
            Score::new(85, 2),
            Score::new(85, 2),
            Score::new(80, 0),
            Score::new(10, 10),
        ];
        let registry = registry();
        let tracker = PositionTracker::new(&registry);

        for (index, score) in population.iter().enumerate().skip(3) {
            let true_rank = index + 1;
            let estimate = tracker
                .resolve(&ParticipantId::new(format!("p{index}")), Some(*score))
                .rank()
                .unwrap();
            assert!(estimate <= true_rank, "estimate {estimate} exceeds {true_rank}");
        }
    }
}
