//! Outbound HTTP calls to the ingestion, tagging and sizing endpoints.
//!
//! Everything that touches the network goes through the [`Dispatch`] trait so
//! the fleet initializer and the check-in scheduler can be exercised against
//! an in-process fake.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::config::{Config, Credentials, Endpoints};
use crate::metrics::{SeriesPayload, ServiceCheck};

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while talking to a remote endpoint
#[derive(Debug)]
pub enum DispatchError {
    /// Building, sending or reading the request failed (includes timeouts)
    Transport(reqwest::Error),

    /// The request body could not be serialized
    Encode(serde_json::Error),

    /// A collaborator answered with a body we could not interpret
    MalformedResponse(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Transport(err) => write!(f, "request failed: {}", err),
            DispatchError::Encode(err) => write!(f, "failed to encode request body: {}", err),
            DispatchError::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Transport(err) => Some(err),
            DispatchError::Encode(err) => Some(err),
            DispatchError::MalformedResponse(_) => None,
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Encode(err)
    }
}

/// What is kept of a response: enough to log it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl DispatchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of a tag registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagsPayload {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Sizing {
    count: i64,
}

#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// POST one metrics payload to the series endpoint
    async fn submit_series(&self, payload: &SeriesPayload) -> DispatchResult<DispatchResponse>;

    /// POST one service check to the check-run endpoint
    async fn submit_service_check(&self, check: &ServiceCheck)
    -> DispatchResult<DispatchResponse>;

    /// DELETE every tag currently registered for `host`
    async fn clear_tags(&self, host: &str) -> DispatchResult<DispatchResponse>;

    /// POST the tag set for `host`
    async fn register_tags(
        &self,
        host: &str,
        tags: &TagsPayload,
    ) -> DispatchResult<DispatchResponse>;

    /// Ask the sizing collaborator for its count. `None` when no collaborator
    /// is configured.
    async fn container_count(&self) -> DispatchResult<Option<i64>>;
}

/// [`Dispatch`] over a single shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    endpoints: Endpoints,
    credentials: Credentials,
}

impl HttpDispatcher {
    pub fn new(config: &Config) -> DispatchResult<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;

        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
            credentials: config.credentials.clone(),
        })
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .query(&[
                ("api_key", self.credentials.api_key.as_str()),
                ("application_key", self.credentials.app_key.as_str()),
            ])
            .header(CONTENT_TYPE, "application/json")
    }

    fn tag_url(&self, host: &str) -> String {
        format!("{}/{}", self.endpoints.tags.trim_end_matches('/'), host)
    }

    async fn send(&self, request: RequestBuilder) -> DispatchResult<DispatchResponse> {
        let response = request.send().await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();
        let body = response.text().await?;

        if status.is_success() {
            debug!("response status: {status}");
        } else {
            warn!("response status: {status}");
        }
        debug!("response headers: {headers:?}");
        debug!("response body: {body}");

        Ok(DispatchResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl Dispatch for HttpDispatcher {
    #[instrument(skip_all)]
    async fn submit_series(&self, payload: &SeriesPayload) -> DispatchResult<DispatchResponse> {
        let body = payload.to_json()?;
        trace!("series payload: {body}");

        let request = self
            .authenticated(self.client.post(&self.endpoints.metrics))
            .body(body);
        self.send(request).await
    }

    #[instrument(skip_all, fields(host = %check.host_name))]
    async fn submit_service_check(
        &self,
        check: &ServiceCheck,
    ) -> DispatchResult<DispatchResponse> {
        let body = serde_json::to_string(check)?;
        let request = self
            .authenticated(self.client.post(&self.endpoints.check_run))
            .body(body);
        self.send(request).await
    }

    #[instrument(skip(self))]
    async fn clear_tags(&self, host: &str) -> DispatchResult<DispatchResponse> {
        let request = self.authenticated(self.client.delete(self.tag_url(host)));
        self.send(request).await
    }

    #[instrument(skip(self, tags))]
    async fn register_tags(
        &self,
        host: &str,
        tags: &TagsPayload,
    ) -> DispatchResult<DispatchResponse> {
        let body = serde_json::to_string(tags)?;
        let request = self
            .authenticated(self.client.post(self.tag_url(host)))
            .body(body);
        self.send(request).await
    }

    #[instrument(skip(self))]
    async fn container_count(&self) -> DispatchResult<Option<i64>> {
        let Some(url) = &self.endpoints.sizing else {
            return Ok(None);
        };

        let body = self.client.get(url).send().await?.text().await?;
        let sizing: Sizing = serde_json::from_str(&body)
            .map_err(|e| DispatchError::MalformedResponse(format!("{e}: {body}")))?;

        Ok(Some(sizing.count))
    }
}
