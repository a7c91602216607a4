//! API client for communicating with the Webex REST API.
//!
//! This module provides the `WebexClient` struct, which implements the
//! directory, membership and token service traits on top of `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::TokenGrant;
use crate::models::membership::CreateMembershipRequest;
use crate::models::{DirectoryEntry, Membership};
use crate::services::{DirectoryService, MembershipService, TokenService};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) or 5xx responses.
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds, doubled after every retry.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Upper bound for a server-supplied `Retry-After` delay.
const MAX_RETRY_AFTER_SECS: u64 = 120;

/// Items requested per page on list endpoints (the API maximum).
const PAGE_SIZE: &str = "1000";

/// List envelope shared by all Webex collection endpoints
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// How often and how patiently failed requests are retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

/// API client for Webex.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct WebexClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl WebexClient {
    /// Create a new client for the given API base URL (e.g. `https://webexapis.com/v1`)
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a new client with the given access token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
            retry: self.retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ApiError> {
        let raw = format!("{}/{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, retrying rate limits, server errors and connection
    /// failures with exponential backoff.
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is consumed
    /// by sending it.
    async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.retry.initial_backoff;

        loop {
            let (error, retry_after) = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let retry_after = Self::retry_after(&response);
                    let body = response.text().await.unwrap_or_default();
                    (ApiError::from_status(status, &body), retry_after)
                }
                Err(e) if e.is_timeout() || e.is_connect() => (ApiError::NetworkError(e), None),
                Err(e) => return Err(e.into()),
            };

            let retryable = error.is_transient() || matches!(error, ApiError::NetworkError(_));
            if !retryable || retries >= self.retry.max_retries {
                return Err(error);
            }

            retries += 1;
            let delay = retry_after.unwrap_or(backoff);
            warn!(error = %error, retry = retries, delay_ms = delay.as_millis() as u64, "Request failed, backing off");
            tokio::time::sleep(delay).await;
            backoff *= 2;
        }
    }

    /// Numeric `Retry-After` header of a 429 response, capped
    fn retry_after(response: &Response) -> Option<Duration> {
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }
        response
            .headers()
            .get(header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    /// Fetch every page of a collection, following `Link: <...>; rel="next"`.
    async fn get_all<T: DeserializeOwned>(&self, first: Url, what: &str) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            debug!(url = %url, "GET");
            let response = self
                .send(|| self.authorized(self.client.get(url.clone())))
                .await?;

            next = match next_link(response.headers()) {
                Some(link) => Some(
                    Url::parse(&link).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", link, e)))?,
                ),
                None => None,
            };

            let page: ListResponse<T> = Self::parse_json(response, what).await?;
            pages += 1;
            items.extend(page.items);
        }

        debug!(what = what, pages = pages, count = items.len(), "Fetched collection");
        Ok(items)
    }
}

/// Extract the `rel="next"` target from RFC 5988 `Link` headers.
fn next_link(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get_all(header::LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let mut parts = link.split(';');
            let target = parts.next()?.trim();
            let is_next = parts.any(|param| {
                let param = param.trim();
                param == "rel=\"next\"" || param == "rel=next"
            });
            if !is_next {
                return None;
            }
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        })
}

#[async_trait]
impl DirectoryService for WebexClient {
    async fn list_people(&self) -> Result<Vec<DirectoryEntry>, ApiError> {
        let url = self.endpoint("people", &[("max", PAGE_SIZE)])?;
        self.get_all(url, "people list").await
    }
}

#[async_trait]
impl MembershipService for WebexClient {
    async fn list_memberships(&self, space_id: &str) -> Result<Vec<Membership>, ApiError> {
        let url = self.endpoint("memberships", &[("roomId", space_id), ("max", PAGE_SIZE)])?;
        self.get_all(url, "membership list").await
    }

    async fn create_membership(&self, space_id: &str, person_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint("memberships", &[])?;
        let body = CreateMembershipRequest {
            room_id: space_id,
            person_id,
        };
        debug!(person_id = person_id, "POST memberships");
        match self
            .send(|| self.authorized(self.client.post(url.clone()).json(&body)))
            .await
        {
            Ok(_) => Ok(()),
            // a retried POST whose first attempt was committed lands here
            Err(ApiError::Conflict(_)) => {
                debug!(person_id = person_id, "Already a member of the space");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_membership(&self, membership_id: &str) -> Result<(), ApiError> {
        let mut url = self.endpoint("memberships", &[])?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .push(membership_id);
        debug!(membership_id = membership_id, "DELETE membership");
        self.send(|| self.authorized(self.client.delete(url.clone())))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenService for WebexClient {
    async fn refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant, ApiError> {
        let url = self.endpoint("access_token", &[])?;
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ];
        debug!("POST access_token (refresh_token grant)");
        let response = self
            .send(|| {
                self.client
                    .post(url.clone())
                    .header(header::ACCEPT, "application/json")
                    .form(&form)
            })
            .await?;
        Self::parse_json(response, "token response").await
    }
}
