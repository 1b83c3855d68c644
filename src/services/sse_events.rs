use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{
    dto::{sse::ServerEvent, standings::StandingsResponse},
    state::{SharedState, view_model::ViewModel},
};

pub(crate) const EVENT_STANDINGS_UPDATED: &str = "standings.updated";
pub(crate) const EVENT_STANDINGS_SNAPSHOT: &str = "standings.snapshot";

/// Broadcast a freshly published view model to standings subscribers.
pub fn broadcast_standings(state: &SharedState, view: &ViewModel) {
    let payload = StandingsResponse::from(view);
    send_standings_event(state, EVENT_STANDINGS_UPDATED, &payload);
}

/// Forward every view model the orchestrator publishes onto the standings SSE stream.
pub fn spawn_standings_broadcaster(state: &SharedState) -> JoinHandle<()> {
    let shared = state.clone();
    state
        .orchestrator()
        .on_view_model_change(move |view| broadcast_standings(&shared, &view))
}

/// Build the event sent to a subscriber right after it connects.
pub fn standings_snapshot_event(view: &ViewModel) -> Option<ServerEvent> {
    let payload = StandingsResponse::from(view);
    match ServerEvent::json(EVENT_STANDINGS_SNAPSHOT.to_string(), &payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialise standings snapshot");
            None
        }
    }
}

fn send_standings_event<T: Serialize>(state: &SharedState, event: &str, payload: &T) {
    match ServerEvent::json(event.to_string(), payload) {
        Ok(message) => state.standings_sse().broadcast(message),
        Err(err) => warn!(event, error = %err, "failed to serialise SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::SyncConfig,
        dao::participant_source::memory::MemorySource,
        services::sync_orchestrator::SyncOrchestrator,
        state::{
            AppState,
            participant::{Participant, Score},
        },
    };

    #[tokio::test(start_paused = true)]
    async fn published_view_models_reach_sse_subscribers() {
        let source =
            MemorySource::with_participants([Participant::new("a", "Alpha", Score::new(10, 0))]);
        let orchestrator =
            SyncOrchestrator::new(Arc::new(source), SyncConfig::default(), None);
        let state = AppState::new(Arc::clone(&orchestrator));
        let mut receiver = state.standings_sse().subscribe();
        let _broadcaster = spawn_standings_broadcaster(&state);

        orchestrator.start().await;

        let revision = orchestrator.view_model().revision;
        loop {
            let event = receiver.recv().await.unwrap();
            assert_eq!(event.event.as_deref(), Some(EVENT_STANDINGS_UPDATED));
            let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
            if payload["revision"] == revision {
                assert_eq!(payload["entries"][0]["id"], "a");
                assert_eq!(payload["refreshing"], false);
                break;
            }
        }
    }

    #[test]
    fn snapshot_event_is_named() {
        let event = standings_snapshot_event(&ViewModel::default()).unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_STANDINGS_SNAPSHOT));
        assert!(event.data.contains("\"empty\":true"));
    }
}
