//! Drives authoritative refreshes of the standings and reconciles local optimistic updates.

use std::{sync::Arc, time::SystemTime};

use tokio::{
    sync::{Mutex, watch},
    task::{JoinError, JoinHandle},
    time::{Instant, sleep_until, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    config::SyncConfig,
    dao::{
        participant_source::{ParticipantSource, PositionLookup},
        storage::StorageError,
    },
    error::{ServiceError, SyncError},
    state::{
        coalescer::{SignalDecision, SuppressReason, UpdateCoalescer},
        participant::{ChangeEvent, Participant, ParticipantId, Score, ScoreDelta},
        position::{PositionResult, PositionTracker},
        registry::{RankedRegistry, prepare_window},
        sync_machine::{CycleId, RefreshRequest, SyncMachine, SyncSnapshot},
        view_model::{RankedEntry, TrackedStanding, ViewModel},
    },
};

/// Owner of the ranked window and of the tracked participant's score.
///
/// All mutations happen under one lock; the only suspension points are the calls to the
/// [`ParticipantSource`], which run outside it. At most one refresh cycle is in flight.
pub struct SyncOrchestrator {
    source: Arc<dyn ParticipantSource>,
    config: SyncConfig,
    tracked_id: Option<ParticipantId>,
    inner: Mutex<SyncInner>,
    view: watch::Sender<Arc<ViewModel>>,
}

struct SyncInner {
    registry: RankedRegistry,
    coalescer: UpdateCoalescer,
    machine: SyncMachine,
    tracked: Option<TrackedParticipant>,
    has_error: bool,
    last_error_at: Option<SystemTime>,
    live: bool,
    trailing_armed: bool,
    revision: u64,
}

struct TrackedParticipant {
    id: ParticipantId,
    confirmed: Option<Score>,
    provisional: Option<Score>,
    remote_rank: Option<usize>,
}

/// Result of one authoritative fetch.
struct FetchedStandings {
    window: Vec<Participant>,
    tracked: Option<PositionLookup>,
}

type FetchOutcome = Result<FetchedStandings, SyncError>;

impl SyncOrchestrator {
    /// Wire the orchestrator to its source; `tracked_id` is the local participant, if known.
    pub fn new(
        source: Arc<dyn ParticipantSource>,
        config: SyncConfig,
        tracked_id: Option<ParticipantId>,
    ) -> Arc<Self> {
        let inner = SyncInner {
            registry: RankedRegistry::new(config.window_size),
            coalescer: UpdateCoalescer::new(config.per_identity_debounce, config.global_debounce),
            machine: SyncMachine::new(),
            tracked: tracked_id.clone().map(|id| TrackedParticipant {
                id,
                confirmed: None,
                provisional: None,
                remote_rank: None,
            }),
            has_error: false,
            last_error_at: None,
            live: false,
            trailing_armed: false,
            revision: 0,
        };
        let (view, _receiver) = watch::channel(Arc::new(inner.view_model()));

        Arc::new(Self {
            source,
            config,
            tracked_id,
            inner: Mutex::new(inner),
            view,
        })
    }

    /// Source the orchestrator fetches from.
    pub fn source(&self) -> Arc<dyn ParticipantSource> {
        Arc::clone(&self.source)
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run the initial authoritative fetch, including any follow-up it queues.
    ///
    /// A failure leaves an empty window flagged with `has_error`; it is never fatal.
    pub async fn start(self: &Arc<Self>) {
        let request = {
            let mut inner = self.inner.lock().await;
            let request = inner.machine.request_refresh();
            self.publish(&mut inner);
            request
        };

        match request {
            RefreshRequest::Started(cycle) => Arc::clone(self).run_cycles(cycle).await,
            RefreshRequest::Deferred => debug!("initial refresh already in flight"),
        }

        let view = self.view_model();
        if view.has_error {
            warn!("initial standings fetch failed; starting with an empty window");
        } else {
            info!(entries = view.entries.len(), "initial standings loaded");
        }
    }

    /// Feed a change notification through the coalescer and refresh when it emits.
    pub async fn on_change_event(self: &Arc<Self>, event: ChangeEvent) -> SignalDecision {
        let mut inner = self.inner.lock().await;
        let decision = {
            let SyncInner {
                coalescer,
                registry,
                ..
            } = &mut *inner;
            coalescer.on_event(&event, registry, Instant::now())
        };

        match decision {
            SignalDecision::Emit => {
                debug!(id = %event.id, "significant change; refreshing standings");
                self.trigger_refresh(&mut inner);
            }
            SignalDecision::Suppressed(reason) => {
                debug!(id = %event.id, ?reason, "change event suppressed");
                if reason != SuppressReason::Irrelevant {
                    self.arm_trailing_flush(&mut inner);
                }
            }
        }

        decision
    }

    /// Ask for an authoritative refresh outside the coalescer (manual retry, fallback polling).
    pub async fn request_refresh(self: &Arc<Self>) -> RefreshRequest {
        let mut inner = self.inner.lock().await;
        self.trigger_refresh(&mut inner)
    }

    /// Apply the known effect of a local action to the tracked participant right away.
    ///
    /// The resulting score is provisional and is overwritten by the next successful refresh.
    pub async fn apply_optimistic_mutation(
        &self,
        id: &ParticipantId,
        delta: ScoreDelta,
    ) -> Result<PositionResult, ServiceError> {
        let mut inner = self.inner.lock().await;
        let SyncInner {
            tracked, registry, ..
        } = &mut *inner;

        let Some(tracked) = tracked.as_mut().filter(|tracked| &tracked.id == id) else {
            return Err(ServiceError::untracked(id));
        };
        let Some(base) = tracked.score() else {
            return Err(ServiceError::InvalidState(format!(
                "no known score for participant `{id}` yet"
            )));
        };

        let score = base.apply_delta(delta);
        tracked.provisional = Some(score);
        registry.reposition(id, score);
        let position = tracked.position(registry);

        info!(
            %id,
            primary = score.primary,
            secondary = score.secondary,
            ?position,
            "applied provisional score"
        );
        self.publish(&mut inner);
        Ok(position)
    }

    /// Entry point for collaborators reporting a committed local action.
    pub async fn on_local_action_committed(
        &self,
        id: &ParticipantId,
        delta: ScoreDelta,
    ) -> Result<PositionResult, ServiceError> {
        let result = self.apply_optimistic_mutation(id, delta).await;
        if let Err(err) = &result {
            warn!(%id, error = %err, "ignoring local action");
        }
        result
    }

    /// Record whether the push feed is connected.
    pub async fn set_feed_available(&self, live: bool) {
        let mut inner = self.inner.lock().await;
        if inner.live == live {
            return;
        }
        if live {
            // Debounce state predates the outage; the reconnect refresh supersedes it.
            inner.coalescer.reset();
        }
        inner.live = live;
        self.publish(&mut inner);
    }

    /// True while the push feed is connected.
    pub fn feed_available(&self) -> bool {
        self.view.borrow().live
    }

    /// Latest published view model.
    pub fn view_model(&self) -> Arc<ViewModel> {
        Arc::clone(&self.view.borrow())
    }

    /// Receiver notified every time a new view model is published.
    pub fn subscribe_view_model(&self) -> watch::Receiver<Arc<ViewModel>> {
        self.view.subscribe()
    }

    /// Invoke `handler` with every view model published from now on.
    pub fn on_view_model_change<F>(&self, handler: F) -> JoinHandle<()>
    where
        F: Fn(Arc<ViewModel>) + Send + 'static,
    {
        let mut receiver = self.view.subscribe();
        receiver.mark_unchanged();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let view = Arc::clone(&receiver.borrow_and_update());
                handler(view);
            }
        })
    }

    /// Snapshot of the refresh state machine.
    pub async fn sync_snapshot(&self) -> SyncSnapshot {
        self.inner.lock().await.machine.snapshot()
    }

    /// Start a cycle or queue a follow-up; the caller holds the lock.
    fn trigger_refresh(self: &Arc<Self>, inner: &mut SyncInner) -> RefreshRequest {
        let request = inner.machine.request_refresh();
        match request {
            RefreshRequest::Started(cycle) => {
                self.publish(inner);
                tokio::spawn(Arc::clone(self).run_cycles(cycle));
            }
            RefreshRequest::Deferred => debug!("refresh in flight; queued a follow-up"),
        }
        request
    }

    /// Schedule a flush of debounced events once the global window closes.
    fn arm_trailing_flush(self: &Arc<Self>, inner: &mut SyncInner) {
        if inner.trailing_armed {
            return;
        }
        let Some(deadline) = inner.coalescer.deferred_deadline() else {
            return;
        };

        inner.trailing_armed = true;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            sleep_until(deadline).await;
            this.flush_deferred().await;
        });
    }

    async fn flush_deferred(self: Arc<Self>) {
        let mut inner = self.inner.lock().await;
        inner.trailing_armed = false;
        match inner.coalescer.flush_deferred(Instant::now()) {
            SignalDecision::Emit => {
                debug!("flushing debounced changes");
                self.trigger_refresh(&mut inner);
            }
            SignalDecision::Suppressed(SuppressReason::Irrelevant) => {}
            SignalDecision::Suppressed(_) => self.arm_trailing_flush(&mut inner),
        }
    }

    /// Run `cycle` and every follow-up queued while it was in flight.
    async fn run_cycles(self: Arc<Self>, mut cycle: CycleId) {
        loop {
            let (outcome, late) = self.fetch_with_timeout().await;
            let next = self.settle(cycle, outcome).await;

            if let Some(late) = late {
                let this = Arc::clone(&self);
                let settled = cycle;
                tokio::spawn(async move {
                    let outcome = joined(late.await);
                    this.settle(settled, outcome).await;
                });
            }

            match next {
                Some(next) => cycle = next,
                None => break,
            }
        }
    }

    /// Fetch the window and tracked position, bounded by the configured timeout.
    ///
    /// On timeout the fetch keeps running; its handle is returned so the late response
    /// can be settled (and discarded) against the cycle counter.
    async fn fetch_with_timeout(&self) -> (FetchOutcome, Option<JoinHandle<FetchOutcome>>) {
        let mut fetch = tokio::spawn(fetch_standings(
            self.source(),
            self.config.window_size,
            self.tracked_id.clone(),
        ));

        match timeout(self.config.fetch_timeout, &mut fetch).await {
            Ok(result) => (joined(result), None),
            Err(_) => (
                Err(SyncError::FetchTimeout {
                    limit: self.config.fetch_timeout,
                }),
                Some(fetch),
            ),
        }
    }

    /// Apply the outcome of `cycle`, returning the follow-up cycle to run, if any.
    async fn settle(&self, cycle: CycleId, outcome: FetchOutcome) -> Option<CycleId> {
        let mut inner = self.inner.lock().await;

        match outcome {
            Ok(fetched) => {
                if let Err(err) = inner.machine.complete(cycle) {
                    debug!(cycle, error = %err, "discarding stale standings response");
                    return None;
                }
                inner.apply_fetched(fetched);
                inner.has_error = false;
                debug!(cycle, entries = inner.registry.len(), "standings refreshed");
            }
            Err(err) => {
                if let Err(stale) = inner.machine.fail(cycle) {
                    debug!(cycle, error = %stale, "discarding stale standings failure");
                    return None;
                }
                warn!(cycle, error = %err, "standings refresh failed; keeping previous window");
                inner.has_error = true;
                inner.last_error_at = Some(SystemTime::now());
                if let Err(err) = inner.machine.recover() {
                    warn!(error = %err, "failed to leave failed refresh state");
                }
            }
        }

        let next = inner.machine.start_pending();
        self.publish(&mut inner);
        next
    }

    /// Bump the revision and hand a fresh snapshot to subscribers.
    fn publish(&self, inner: &mut SyncInner) {
        inner.revision += 1;
        self.view.send_replace(Arc::new(inner.view_model()));
    }
}

impl SyncInner {
    fn apply_fetched(&mut self, fetched: FetchedStandings) {
        let prepared = prepare_window(fetched.window, self.registry.capacity());
        if prepared.resorted || prepared.duplicates > 0 {
            let err = SyncError::InvariantViolation {
                duplicates: prepared.duplicates,
            };
            warn!(error = %err, "repaired fetched standings window");
        }
        self.registry.replace(prepared.entries);

        let Some(tracked) = self.tracked.as_mut() else {
            return;
        };
        tracked.provisional = None;

        if let Some((_, participant)) = self.registry.lookup(&tracked.id) {
            tracked.confirmed = Some(participant.score);
            tracked.remote_rank = None;
            return;
        }

        match fetched.tracked {
            Some(PositionLookup::Found { rank, score }) => {
                tracked.confirmed = Some(score);
                tracked.remote_rank = Some(rank);
            }
            Some(PositionLookup::NotFound) => {
                tracked.confirmed = None;
                tracked.remote_rank = None;
            }
            Some(PositionLookup::Unsupported) | None => tracked.remote_rank = None,
        }
    }

    fn view_model(&self) -> ViewModel {
        let tracked = self.tracked.as_ref();
        let entries = self
            .registry
            .entries()
            .iter()
            .enumerate()
            .map(|(index, participant)| {
                let is_tracked = tracked.is_some_and(|t| t.id == participant.id);
                RankedEntry {
                    rank: index + 1,
                    participant: participant.clone(),
                    is_tracked,
                    provisional: is_tracked && tracked.is_some_and(|t| t.provisional.is_some()),
                }
            })
            .collect::<Vec<_>>();

        let outside = tracked
            .filter(|t| self.registry.lookup(&t.id).is_none())
            .map(|t| TrackedStanding {
                id: t.id.clone(),
                score: t.score(),
                position: t.position(&self.registry),
                provisional: t.provisional.is_some(),
            });

        ViewModel {
            empty: entries.is_empty(),
            entries,
            tracked: outside,
            refreshing: self.machine.is_refreshing(),
            has_error: self.has_error,
            last_error_at: self.last_error_at,
            live: self.live,
            revision: self.revision,
        }
    }
}

impl TrackedParticipant {
    /// Provisional score if any, otherwise the last confirmed one.
    fn score(&self) -> Option<Score> {
        self.provisional.or(self.confirmed)
    }

    fn position(&self, registry: &RankedRegistry) -> PositionResult {
        match (self.provisional, self.remote_rank) {
            (None, Some(rank)) if registry.lookup(&self.id).is_none() => {
                PositionResult::Exact(rank)
            }
            _ => PositionTracker::new(registry).resolve(&self.id, self.score()),
        }
    }
}

/// Fetch the window, then the tracked participant's position when it is not in it.
async fn fetch_standings(
    source: Arc<dyn ParticipantSource>,
    window_size: usize,
    tracked_id: Option<ParticipantId>,
) -> FetchOutcome {
    let window = source
        .fetch_top_window(window_size)
        .await
        .map_err(SyncError::FetchFailure)?;

    let tracked = match tracked_id {
        Some(id) if window.iter().any(|participant| participant.id == id) => None,
        Some(id) => Some(
            source
                .fetch_exact_position(id)
                .await
                .map_err(SyncError::FetchFailure)?,
        ),
        None => None,
    };

    Ok(FetchedStandings { window, tracked })
}

fn joined(result: Result<FetchOutcome, JoinError>) -> FetchOutcome {
    result.unwrap_or_else(|err| {
        Err(SyncError::FetchFailure(StorageError::unavailable(
            "fetch task aborted".into(),
            err,
        )))
    })
}
