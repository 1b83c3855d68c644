use serde::Serialize;
use utoipa::ToSchema;

use crate::state::view_model::ViewModel;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the push feed is connected.
    pub live: bool,
    /// Whether the last standings refresh failed.
    pub has_error: bool,
}

impl HealthResponse {
    /// Derive the health of the service from the latest standings snapshot.
    ///
    /// The service is degraded while the push feed is down or the last refresh failed.
    pub fn from_view(view: &ViewModel) -> Self {
        let status = if view.live && !view.has_error {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            live: view.live,
            has_error: view.has_error,
        }
    }

    /// True when the status is `ok`.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_view_without_error_is_ok() {
        let view = ViewModel {
            live: true,
            ..ViewModel::default()
        };
        assert!(HealthResponse::from_view(&view).is_ok());
    }

    #[test]
    fn feed_down_or_failed_refresh_is_degraded() {
        let offline = ViewModel::default();
        assert_eq!(HealthResponse::from_view(&offline).status, "degraded");

        let failing = ViewModel {
            live: true,
            has_error: true,
            ..ViewModel::default()
        };
        let health = HealthResponse::from_view(&failing);
        assert_eq!(health.status, "degraded");
        assert!(health.has_error);
    }
}
