use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether standings are live and fresh, logging when they are not.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let view = state.orchestrator().view_model();
    let health = HealthResponse::from_view(&view);

    if !health.is_ok() {
        let snapshot = state.orchestrator().sync_snapshot().await;
        warn!(
            live = view.live,
            has_error = view.has_error,
            phase = ?snapshot.phase,
            "standings degraded"
        );
    }

    health
}
