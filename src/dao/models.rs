use serde::{Deserialize, Serialize};

/// Participant record as returned by the backing store.
///
/// Every field is optional and the numbers are signed: the store is loosely typed, so
/// normalization into [`crate::state::participant::Participant`] happens at this boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawParticipant {
    /// Stable identifier of the participant.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub label: Option<String>,
    /// Points accumulated (primary score).
    #[serde(default)]
    pub points: Option<i64>,
    /// Items acquired (secondary score).
    #[serde(default)]
    pub items: Option<i64>,
}

/// Answer of the direct position lookup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawPosition {
    /// 1-based rank among all participants.
    pub rank: u64,
    /// Points accumulated (primary score).
    #[serde(default)]
    pub points: Option<i64>,
    /// Items acquired (secondary score).
    #[serde(default)]
    pub items: Option<i64>,
}

/// Old/new pair reported for a single field by the change feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawFieldChange<T> {
    /// Value before the mutation.
    #[serde(default)]
    pub old: Option<T>,
    /// Value after the mutation.
    #[serde(default)]
    pub new: Option<T>,
}

/// Change notification as pushed by the backing store feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawChangeEvent {
    /// Participant whose record changed.
    #[serde(default)]
    pub id: Option<String>,
    /// Label change, if any.
    #[serde(default)]
    pub label: Option<RawFieldChange<String>>,
    /// Points change, if any.
    #[serde(default)]
    pub points: Option<RawFieldChange<i64>>,
    /// Items change, if any.
    #[serde(default)]
    pub items: Option<RawFieldChange<i64>>,
    /// Store-side timestamp (milliseconds since the Unix epoch).
    #[serde(default)]
    pub at_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_event_accepts_partial_payloads() {
        let raw: RawChangeEvent =
            serde_json::from_str(r#"{"id":"p-7","points":{"old":10,"new":25}}"#).unwrap();
        assert_eq!(raw.id.as_deref(), Some("p-7"));
        assert_eq!(
            raw.points,
            Some(RawFieldChange {
                old: Some(10),
                new: Some(25)
            })
        );
        assert!(raw.items.is_none());
        assert!(raw.label.is_none());
    }

    #[test]
    fn participant_tolerates_missing_scores() {
        let raw: RawParticipant = serde_json::from_str(r#"{"id":"p-1","label":"Ada"}"#).unwrap();
        assert_eq!(raw.points, None);
        assert_eq!(raw.items, None);
    }
}
