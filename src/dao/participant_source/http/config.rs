use super::error::{HttpSourceError, HttpSourceResult};

/// Runtime configuration describing how to reach the remote standings store.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl HttpSourceConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> HttpSourceResult<Self> {
        let base_url = std::env::var("STANDINGS_SOURCE_URL").map_err(|_| {
            HttpSourceError::MissingEnvVar {
                var: "STANDINGS_SOURCE_URL",
            }
        })?;

        let mut config = Self::new(base_url);
        if let Some(token) = std::env::var("STANDINGS_SOURCE_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
        {
            config = config.with_token(token);
        }

        Ok(config)
    }
}
