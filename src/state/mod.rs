pub mod coalescer;
pub mod participant;
pub mod position;
pub mod registry;
mod sse;
pub mod sync_machine;
pub mod view_model;

use std::sync::Arc;

use crate::services::sync_orchestrator::SyncOrchestrator;

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 16;

/// Central application state shared by the HTTP handlers and background tasks.
pub struct AppState {
    orchestrator: Arc<SyncOrchestrator>,
    standings_sse: SseHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> SharedState {
        Arc::new(Self {
            orchestrator,
            standings_sse: SseHub::new(SSE_CAPACITY),
        })
    }

    /// Orchestrator owning the standings window.
    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Broadcast hub used for the standings SSE stream.
    pub fn standings_sse(&self) -> &SseHub {
        &self.standings_sse
    }
}
