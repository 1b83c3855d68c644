use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{standings::PositionSummary, validation::validate_participant_id};

/// Local action whose effect on the score is already known.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ActionCommittedRequest {
    #[validate(custom(function = "validate_participant_id"))]
    pub participant_id: String,
    /// Change applied to the points.
    #[serde(default)]
    pub primary_delta: i64,
    /// Change applied to the item count.
    #[serde(default)]
    pub secondary_delta: i64,
}

/// Provisional standing after applying a committed action.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionCommittedResponse {
    pub participant_id: String,
    pub position: PositionSummary,
}
