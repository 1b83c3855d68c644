use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/standings",
    tag = "sse",
    responses((status = 200, description = "Standings SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream the current standings, then every update, to connected frontends.
pub async fn standings_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (receiver, snapshot) = sse_service::subscribe_standings(&state);
    info!(
        subscribers = state.standings_sse().subscriber_count(),
        "New standings SSE connection"
    );
    sse_service::to_sse_stream(receiver, snapshot)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/standings", get(standings_stream))
}
