use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;

use courier_common::error::PollFailure;
use courier_common::types::{Cursor, PollResponse};

/// Source of review results, one long-poll request at a time.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Ask whether anything changed since `cursor` (or since now, when absent).
    async fn poll(&self, cursor: Option<Cursor>) -> Result<PollResponse, PollFailure>;
}

#[async_trait]
impl<T: ReviewSource + ?Sized> ReviewSource for std::sync::Arc<T> {
    async fn poll(&self, cursor: Option<Cursor>) -> Result<PollResponse, PollFailure> {
        (**self).poll(cursor).await
    }
}

/// HTTP client for the review service's long-polling endpoint.
pub struct ReviewApiClient {
    client: reqwest::Client,
    api_url: String,
    authorization: String,
}

impl ReviewApiClient {
    /// `timeout` bounds the whole request, including the time the server
    /// holds it open, so it must exceed the server's hold time.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            authorization: authorization_value(&token.into()),
        })
    }
}

/// `Token <token>`, accepting a token that already carries the prefix.
fn authorization_value(token: &str) -> String {
    let token = token.trim();
    let token = token.strip_prefix("Token ").unwrap_or(token).trim_start();
    format!("Token {token}")
}

#[async_trait]
impl ReviewSource for ReviewApiClient {
    async fn poll(&self, cursor: Option<Cursor>) -> Result<PollResponse, PollFailure> {
        let mut request = self
            .client
            .get(&self.api_url)
            .header(AUTHORIZATION, &self.authorization);

        if let Some(cursor) = &cursor {
            request = request.query(&[("timestamp", cursor.as_str())]);
        }

        let response = request.send().await.map_err(|e| map_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollFailure::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| map_reqwest_error(&e))?;
        Ok(PollResponse::parse(&body)?)
    }
}

/// Map a transport error onto the closed set of poll failures.
pub fn map_reqwest_error(err: &reqwest::Error) -> PollFailure {
    if err.is_timeout() {
        PollFailure::ReadTimeout
    } else if err.is_connect() {
        PollFailure::Connection(err.to_string())
    } else if let Some(status) = err.status() {
        PollFailure::Status(status.as_u16())
    } else if err.is_decode() || err.is_body() {
        PollFailure::Malformed(err.to_string())
    } else {
        PollFailure::Other(err.to_string())
    }
}
