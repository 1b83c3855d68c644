use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::actions::{ActionCommittedRequest, ActionCommittedResponse},
    error::AppError,
    services::standings_service,
    state::SharedState,
};

/// Endpoints used by collaborators to report local actions.
pub fn router() -> Router<SharedState> {
    Router::new().route("/actions/committed", post(action_committed))
}

#[utoipa::path(
    post,
    path = "/actions/committed",
    tag = "actions",
    request_body = ActionCommittedRequest,
    responses(
        (status = 200, description = "Provisional standing applied", body = ActionCommittedResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Participant is not the tracked one"),
        (status = 409, description = "Tracked participant has no known score yet")
    )
)]
/// Apply the known score effect of a committed local action before the store confirms it.
pub async fn action_committed(
    State(state): State<SharedState>,
    Json(payload): Json<ActionCommittedRequest>,
) -> Result<Json<ActionCommittedResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        standings_service::commit_action(&state, payload).await?,
    ))
}
