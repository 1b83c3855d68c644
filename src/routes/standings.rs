use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::standings::{RefreshResponse, StandingsResponse},
    services::standings_service,
    state::SharedState,
};

/// Read access to the standings window and manual refresh.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/standings", get(get_standings))
        .route("/standings/refresh", post(refresh_standings))
}

#[utoipa::path(
    get,
    path = "/standings",
    tag = "standings",
    responses((status = 200, description = "Current standings", body = StandingsResponse))
)]
/// Return the ranked window, the tracked participant and the sync status.
pub async fn get_standings(State(state): State<SharedState>) -> Json<StandingsResponse> {
    Json(standings_service::get_standings(&state))
}

#[utoipa::path(
    post,
    path = "/standings/refresh",
    tag = "standings",
    responses((status = 200, description = "Refresh started or queued", body = RefreshResponse))
)]
/// Request an authoritative refresh, e.g. after an error.
pub async fn refresh_standings(State(state): State<SharedState>) -> Json<RefreshResponse> {
    Json(standings_service::refresh(&state).await)
}
