use std::sync::Arc;

use async_stream::stream;
use futures::{FutureExt, StreamExt, future::BoxFuture};
use reqwest::{Client, Method, StatusCode, header::ACCEPT};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    dao::{
        models::{RawChangeEvent, RawParticipant, RawPosition},
        participant_source::{ChangeFeed, ParticipantSource, PositionLookup},
        storage::StorageResult,
    },
    state::participant::{ChangeEvent, Participant, ParticipantId, normalize_score},
};

use super::{
    config::HttpSourceConfig,
    error::{HttpSourceError, HttpSourceResult},
};

const STANDINGS_PATH: &str = "standings";
const POSITION_PATH: &str = "position";
const CHANGES_PATH: &str = "changes";

/// Participant source talking to the remote standings store over HTTP.
///
/// - `GET {base}/standings?limit=N` returns the best `N` participants.
/// - `GET {base}/position?id=ID` returns `{rank, points, items}`, `404` when unknown and
///   `501` when the store does not support direct lookups.
/// - `GET {base}/changes` streams newline-delimited JSON change events.
#[derive(Clone)]
pub struct HttpParticipantSource {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl HttpParticipantSource {
    /// Build the HTTP client for the configured store.
    pub fn connect(config: HttpSourceConfig) -> HttpSourceResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| HttpSourceError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            token: config.token.map(Arc::from),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        if let Some(ref token) = self.token {
            builder.bearer_auth(token.as_ref())
        } else {
            builder
        }
    }

    async fn get_json<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> HttpSourceResult<(StatusCode, Option<T>)>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, path)
            .query(query)
            .send()
            .await
            .map_err(|source| HttpSourceError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Ok((status, None));
        }

        let payload =
            response
                .json::<T>()
                .await
                .map_err(|source| HttpSourceError::DecodeResponse {
                    path: path.to_string(),
                    source,
                })?;
        Ok((status, Some(payload)))
    }

    async fn top_window(&self, limit: usize) -> HttpSourceResult<Vec<Participant>> {
        let query = [("limit", limit.to_string())];
        match self
            .get_json::<Vec<RawParticipant>>(STANDINGS_PATH, &query)
            .await?
        {
            (_, Some(records)) => Ok(records
                .into_iter()
                .filter_map(|raw| match Participant::try_from(raw) {
                    Ok(participant) => Some(participant),
                    Err(err) => {
                        warn!(error = %err, "dropping malformed participant record");
                        None
                    }
                })
                .collect()),
            (status, None) => Err(HttpSourceError::RequestStatus {
                path: STANDINGS_PATH.to_string(),
                status,
            }),
        }
    }

    async fn position(&self, id: ParticipantId) -> HttpSourceResult<PositionLookup> {
        let query = [("id", id.to_string())];
        match self.get_json::<RawPosition>(POSITION_PATH, &query).await? {
            (_, Some(position)) => Ok(PositionLookup::Found {
                rank: usize::try_from(position.rank.max(1)).unwrap_or(usize::MAX),
                score: normalize_score(position.points, position.items),
            }),
            (StatusCode::NOT_FOUND, None) => Ok(PositionLookup::NotFound),
            (StatusCode::NOT_IMPLEMENTED | StatusCode::METHOD_NOT_ALLOWED, None) => {
                Ok(PositionLookup::Unsupported)
            }
            (status, None) => Err(HttpSourceError::RequestStatus {
                path: POSITION_PATH.to_string(),
                status,
            }),
        }
    }

    async fn open_feed(&self) -> HttpSourceResult<ChangeFeed> {
        let response = self
            .request(Method::GET, CHANGES_PATH)
            .header(ACCEPT, "application/x-ndjson")
            .send()
            .await
            .map_err(|source| HttpSourceError::RequestSend {
                path: CHANGES_PATH.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(HttpSourceError::RequestStatus {
                path: CHANGES_PATH.to_string(),
                status: response.status(),
            });
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let feed = stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        warn!(error = %err, "change feed transport error; closing feed");
                        break;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    if let Some(event) = decode_feed_line(&line) {
                        yield event;
                    }
                }
            }
        };

        Ok(feed.boxed())
    }
}

/// Decode one NDJSON line, skipping blanks and malformed records.
fn decode_feed_line(line: &[u8]) -> Option<ChangeEvent> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    let raw = match serde_json::from_slice::<RawChangeEvent>(line) {
        Ok(raw) => raw,
        Err(source) => {
            let err = HttpSourceError::DecodeFeedLine { source };
            warn!(error = %err, "skipping change feed line");
            return None;
        }
    };

    match ChangeEvent::try_from(raw) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(error = %err, "skipping change event without identity");
            None
        }
    }
}

impl ParticipantSource for HttpParticipantSource {
    fn fetch_top_window(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<Participant>>> {
        let this = self.clone();
        async move { this.top_window(limit).await.map_err(Into::into) }.boxed()
    }

    fn fetch_exact_position(
        &self,
        id: ParticipantId,
    ) -> BoxFuture<'static, StorageResult<PositionLookup>> {
        let this = self.clone();
        async move { this.position(id).await.map_err(Into::into) }.boxed()
    }

    fn subscribe_changes(&self) -> BoxFuture<'static, StorageResult<ChangeFeed>> {
        let this = self.clone();
        async move { this.open_feed().await.map_err(Into::into) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::participant::FieldChange;

    #[test]
    fn feed_line_is_normalized() {
        let event =
            decode_feed_line(br#"{"id":"p-3","points":{"old":5,"new":-2},"at_ms":1000}"#)
                .unwrap();
        assert_eq!(event.id.as_str(), "p-3");
        assert_eq!(
            event.changes.primary,
            Some(FieldChange {
                old: Some(5),
                new: 0
            })
        );
    }

    #[test]
    fn blank_and_malformed_lines_are_skipped() {
        assert!(decode_feed_line(b"   \n").is_none());
        assert!(decode_feed_line(b"{not json}\n").is_none());
        assert!(decode_feed_line(br#"{"points":{"new":3}}"#).is_none());
    }
}
