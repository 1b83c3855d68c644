use std::{cmp::Ordering, fmt, time::SystemTime};

use serde::{Deserialize, Serialize};

use crate::dao::models::{RawChangeEvent, RawFieldChange, RawParticipant};

/// Stable, opaque identifier of a participant in the competition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap an identifier received from the backing store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Points held by a participant: the primary score ranks, the secondary count breaks ties.
///
/// The derived ordering compares `primary` first, then `secondary`, both ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Score {
    /// Points accumulated by the participant.
    pub primary: u64,
    /// Tie-break count (items acquired).
    pub secondary: u64,
}

impl Score {
    /// Build a score from its two components.
    pub const fn new(primary: u64, secondary: u64) -> Self {
        Self { primary, secondary }
    }

    /// Apply a signed delta, saturating at zero on both components.
    pub fn apply_delta(self, delta: ScoreDelta) -> Self {
        Self {
            primary: self.primary.saturating_add_signed(delta.primary),
            secondary: self.secondary.saturating_add_signed(delta.secondary),
        }
    }

    /// True when `self` ranks at least as high as `other`.
    pub fn ranks_at_least(&self, other: &Score) -> bool {
        self >= other
    }
}

/// Signed change applied by a locally committed action (e.g. spending points on an item).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreDelta {
    /// Change to the primary score.
    pub primary: i64,
    /// Change to the secondary score.
    pub secondary: i64,
}

impl ScoreDelta {
    /// Build a delta from its two components.
    pub const fn new(primary: i64, secondary: i64) -> Self {
        Self { primary, secondary }
    }
}

/// Normalized participant record held by the ranked window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Unique identity.
    pub id: ParticipantId,
    /// Name shown to users.
    pub label: String,
    /// Current score.
    pub score: Score,
}

impl Participant {
    /// Build a participant from already normalized parts.
    pub fn new(id: impl Into<ParticipantId>, label: impl Into<String>, score: Score) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            score,
        }
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Total order used by the window: higher score first, then identity ascending.
pub fn standings_order(a: &Participant, b: &Participant) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Reason a wire record could not be turned into a [`Participant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidParticipant {
    /// The record carries no usable identity.
    #[error("participant record has no identity")]
    MissingIdentity,
}

impl TryFrom<RawParticipant> for Participant {
    type Error = InvalidParticipant;

    fn try_from(value: RawParticipant) -> Result<Self, Self::Error> {
        let id = value
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(InvalidParticipant::MissingIdentity)?;

        let label = value
            .label
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| id.clone());

        Ok(Self {
            id: ParticipantId(id),
            label,
            score: normalize_score(value.points, value.items),
        })
    }
}

/// Clamp loosely typed wire numbers into a [`Score`], defaulting missing values to zero.
pub fn normalize_score(points: Option<i64>, items: Option<i64>) -> Score {
    Score {
        primary: clamp_non_negative(points),
        secondary: clamp_non_negative(items),
    }
}

fn clamp_non_negative(value: Option<i64>) -> u64 {
    value.map(|v| v.max(0) as u64).unwrap_or(0)
}

/// Old and new value of a field touched by a change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange<T> {
    /// Value before the change, if the feed reported one.
    pub old: Option<T>,
    /// Value after the change.
    pub new: T,
}

impl<T: PartialEq> FieldChange<T> {
    /// True unless the feed reported identical old and new values.
    pub fn is_effective(&self) -> bool {
        self.old.as_ref() != Some(&self.new)
    }
}

/// Fields of a participant record modified by a single store mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFields {
    /// Display label change.
    pub label: Option<FieldChange<String>>,
    /// Primary score change.
    pub primary: Option<FieldChange<u64>>,
    /// Secondary score change.
    pub secondary: Option<FieldChange<u64>>,
}

impl ChangedFields {
    /// True when the mutation actually modified a score component.
    pub fn touches_score(&self) -> bool {
        self.primary.as_ref().is_some_and(FieldChange::is_effective)
            || self.secondary.as_ref().is_some_and(FieldChange::is_effective)
    }
}

/// Notification pushed by the backing store whenever a participant record changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Participant whose record changed.
    pub id: ParticipantId,
    /// Fields modified by the mutation.
    pub changes: ChangedFields,
    /// Time the store recorded the change.
    pub at: SystemTime,
}

impl ChangeEvent {
    /// Convenience constructor for a score-only change.
    pub fn score_change(id: impl Into<ParticipantId>, old: Option<Score>, new: Score) -> Self {
        Self {
            id: id.into(),
            changes: ChangedFields {
                label: None,
                primary: Some(FieldChange {
                    old: old.map(|s| s.primary),
                    new: new.primary,
                }),
                secondary: Some(FieldChange {
                    old: old.map(|s| s.secondary),
                    new: new.secondary,
                }),
            },
            at: SystemTime::now(),
        }
    }
}

impl TryFrom<RawChangeEvent> for ChangeEvent {
    type Error = InvalidParticipant;

    fn try_from(value: RawChangeEvent) -> Result<Self, Self::Error> {
        let id = value
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(InvalidParticipant::MissingIdentity)?;

        let changes = ChangedFields {
            label: value.label.map(|change| FieldChange {
                old: change.old,
                new: change.new.unwrap_or_default(),
            }),
            primary: value.points.map(numeric_change),
            secondary: value.items.map(numeric_change),
        };

        let at = value
            .at_ms
            .map(|ms| SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(ms))
            .unwrap_or_else(SystemTime::now);

        Ok(Self {
            id: ParticipantId(id.trim().to_string()),
            changes,
            at,
        })
    }
}

fn numeric_change(change: RawFieldChange<i64>) -> FieldChange<u64> {
    FieldChange {
        old: change.old.map(|v| v.max(0) as u64),
        new: clamp_non_negative(change.new),
    }
}
