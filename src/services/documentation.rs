use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Neon Beat Standings.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::standings_stream,
        crate::routes::standings::get_standings,
        crate::routes::standings::refresh_standings,
        crate::routes::actions::action_committed,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::standings::StandingsResponse,
            crate::dto::standings::StandingEntry,
            crate::dto::standings::TrackedStandingSummary,
            crate::dto::standings::PositionSummary,
            crate::dto::standings::RefreshResponse,
            crate::dto::actions::ActionCommittedRequest,
            crate::dto::actions::ActionCommittedResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "standings", description = "Ranked standings window and refresh control"),
        (name = "actions", description = "Local actions reported by collaborators"),
    )
)]
pub struct ApiDoc;
