//! Error types shared by the HTTP participant source.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`HttpSourceError`] failures.
pub type HttpSourceResult<T> = Result<T, HttpSourceError>;

/// Failures that can occur while talking to the remote standings store.
#[derive(Debug, Error)]
pub enum HttpSourceError {
    /// Required environment variable is missing.
    #[error("missing standings source environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build standings HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send standings request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The store returned an unexpected status code.
    #[error("unexpected standings response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be decoded.
    #[error("failed to decode standings response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A line of the change feed was not valid JSON.
    #[error("failed to decode change feed line")]
    DecodeFeedLine {
        #[source]
        source: serde_json::Error,
    },
}

impl From<HttpSourceError> for StorageError {
    fn from(err: HttpSourceError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
