use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::{error::SyncError, services::sync_orchestrator::SyncOrchestrator};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Keep the push feed connected, forwarding every change event to the orchestrator.
///
/// While the feed is down the orchestrator is flagged as not live, which lets
/// [`run_fallback_refresh`] poll instead.
pub async fn run(orchestrator: Arc<SyncOrchestrator>) {
    let mut delay = INITIAL_DELAY;
    let mut connected_before = false;

    loop {
        match orchestrator.source().subscribe_changes().await {
            Ok(mut feed) => {
                info!("change feed established; leaving fallback polling");
                orchestrator.set_feed_available(true).await;
                delay = INITIAL_DELAY;

                if connected_before {
                    // Changes published while disconnected were never seen.
                    orchestrator.request_refresh().await;
                }
                connected_before = true;

                while let Some(event) = feed.next().await {
                    orchestrator.on_change_event(event).await;
                }

                warn!("change feed closed; falling back to periodic refresh");
                orchestrator.set_feed_available(false).await;
            }
            Err(err) => {
                let err = SyncError::FeedUnavailable(err);
                warn!(error = %err, retry_in = ?delay, "change feed subscription failed");
                orchestrator.set_feed_available(false).await;
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Request a refresh every `fallback_refresh_interval` while the push feed is down.
pub async fn run_fallback_refresh(orchestrator: Arc<SyncOrchestrator>) {
    let mut ticker = interval(orchestrator.config().fallback_refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial fetch already covered it.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if orchestrator.feed_available() {
            continue;
        }
        debug!("change feed unavailable; running fallback refresh");
        orchestrator.request_refresh().await;
    }
}
