/// OpenAPI documentation generation.
pub mod documentation;
/// Push feed supervision and fallback polling.
pub mod feed_supervisor;
/// Health check service.
pub mod health_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Standings queries, manual refresh and local actions.
pub mod standings_service;
/// Authoritative refresh cycles and optimistic updates.
pub mod sync_orchestrator;
