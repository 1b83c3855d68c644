use tracing::info;

use crate::{
    dto::{
        actions::{ActionCommittedRequest, ActionCommittedResponse},
        standings::{RefreshResponse, StandingsResponse},
    },
    error::ServiceError,
    state::{
        SharedState,
        participant::{ParticipantId, ScoreDelta},
    },
};

/// Current standings as last published by the orchestrator.
pub fn get_standings(state: &SharedState) -> StandingsResponse {
    StandingsResponse::from(state.orchestrator().view_model().as_ref())
}

/// Manual retry: start an authoritative refresh or queue one behind the in-flight cycle.
pub async fn refresh(state: &SharedState) -> RefreshResponse {
    let request = state.orchestrator().request_refresh().await;
    info!(?request, "manual standings refresh requested");
    request.into()
}

/// Apply a committed local action to the tracked participant's standing.
pub async fn commit_action(
    state: &SharedState,
    request: ActionCommittedRequest,
) -> Result<ActionCommittedResponse, ServiceError> {
    let id = ParticipantId::new(request.participant_id.trim());
    let delta = ScoreDelta::new(request.primary_delta, request.secondary_delta);

    let position = state
        .orchestrator()
        .on_local_action_committed(&id, delta)
        .await?;

    Ok(ActionCommittedResponse {
        participant_id: id.to_string(),
        position: position.into(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::SyncConfig,
        dao::participant_source::memory::MemorySource,
        dto::standings::PositionSummary,
        services::sync_orchestrator::SyncOrchestrator,
        state::{
            AppState,
            participant::{Participant, Score},
        },
    };

    async fn state_tracking(id: &str) -> SharedState {
        let source = MemorySource::with_participants([
            Participant::new("a", "Alpha", Score::new(300, 0)),
            Participant::new("b", "Bravo", Score::new(200, 0)),
            Participant::new("me", "Me", Score::new(100, 2)),
        ]);
        let config = SyncConfig {
            window_size: 2,
            ..SyncConfig::default()
        };
        let orchestrator = SyncOrchestrator::new(Arc::new(source), config, Some(id.into()));
        orchestrator.start().await;
        AppState::new(orchestrator)
    }

    #[tokio::test(start_paused = true)]
    async fn standings_expose_window_and_tracked() {
        let state = state_tracking("me").await;
        let standings = get_standings(&state);

        assert_eq!(standings.entries.len(), 2);
        let tracked = standings.tracked.unwrap();
        assert_eq!(tracked.position, PositionSummary::Exact { rank: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn committed_action_returns_provisional_position() {
        let state = state_tracking("me").await;
        let response = commit_action(
            &state,
            ActionCommittedRequest {
                participant_id: " me ".into(),
                primary_delta: 150,
                secondary_delta: 0,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.participant_id, "me");
        assert_eq!(response.position, PositionSummary::Estimated { rank: 2 });
        assert!(get_standings(&state).tracked.unwrap().provisional);
    }

    #[tokio::test(start_paused = true)]
    async fn committed_action_for_other_participant_is_not_found() {
        let state = state_tracking("me").await;
        let err = commit_action(
            &state,
            ActionCommittedRequest {
                participant_id: "a".into(),
                primary_delta: 1,
                secondary_delta: 0,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_reports_started_cycle() {
        let state = state_tracking("me").await;
        let response = refresh(&state).await;
        assert!(response.started);
    }
}
