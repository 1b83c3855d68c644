//! Neon Beat Standings binary entrypoint wiring the participant source, sync orchestrator and HTTP/SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neon_beat_standings::{
    config::SyncConfig,
    dao::participant_source::{ParticipantSource, memory::MemorySource},
    routes,
    services::{feed_supervisor, sse_events, sync_orchestrator::SyncOrchestrator},
    state::{AppState, SharedState, participant::ParticipantId},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = SyncConfig::load();
    let source = build_source()?;
    let tracked_id = env::var("STANDINGS_TRACKED_ID")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(ParticipantId::from);
    match &tracked_id {
        Some(id) => info!(%id, "tracking local participant"),
        None => info!("no tracked participant configured"),
    }

    let orchestrator = SyncOrchestrator::new(source, config, tracked_id);
    let app_state = AppState::new(Arc::clone(&orchestrator));
    sse_events::spawn_standings_broadcaster(&app_state);

    orchestrator.start().await;
    tokio::spawn(feed_supervisor::run(Arc::clone(&orchestrator)));
    tokio::spawn(feed_supervisor::run_fallback_refresh(Arc::clone(
        &orchestrator,
    )));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the participant source named by `STANDINGS_SOURCE` (`http` by default).
fn build_source() -> anyhow::Result<Arc<dyn ParticipantSource>> {
    let kind = env::var("STANDINGS_SOURCE").unwrap_or_else(|_| "http".into());
    match kind.as_str() {
        "memory" => {
            warn!("using the in-memory participant source; standings start empty");
            Ok(Arc::new(MemorySource::new()))
        }
        "http" => http_source(),
        other => anyhow::bail!("unknown STANDINGS_SOURCE `{other}` (expected `http` or `memory`)"),
    }
}

#[cfg(feature = "http-source")]
fn http_source() -> anyhow::Result<Arc<dyn ParticipantSource>> {
    use neon_beat_standings::dao::participant_source::http::{
        HttpParticipantSource, HttpSourceConfig,
    };

    let config = HttpSourceConfig::from_env().context("configuring HTTP participant source")?;
    info!(base_url = %config.base_url, "using HTTP participant source");
    let source =
        HttpParticipantSource::connect(config).context("building HTTP participant source")?;
    Ok(Arc::new(source))
}

#[cfg(not(feature = "http-source"))]
fn http_source() -> anyhow::Result<Arc<dyn ParticipantSource>> {
    anyhow::bail!("built without the `http-source` feature; set STANDINGS_SOURCE=memory")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
