// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use async_trait::async_trait;
use common::driver::RawDriverRecord;
use reqwest::{StatusCode, header::ACCEPT};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

/// Failures of a roster request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The endpoint answered with a non success status.
    #[error("roster endpoint answered with status {0}")]
    Status(u16),
    /// The endpoint rejected the credentials.
    #[error("roster endpoint rejected the credentials")]
    Unauthorized,
    /// The request didn't reach the endpoint or the answer got lost.
    #[error("roster request failed: {0}")]
    Transport(String),
    /// The answer is not a roster.
    #[error("malformed roster payload: {0}")]
    Malformed(String),
}

/// Source of the driver roster.
#[async_trait]
pub trait RosterEndpoint: Send + Sync {
    /// Retrieves the complete roster as delivered by the backend.
    async fn fetch(&self) -> Result<Vec<RawDriverRecord>, FetchError>;
}

/// Supplies the bearer token of the signed in user.
///
/// The token is owned by the authentication layer, it's asked again for
/// every request.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Parses the body of a roster answer.
///
/// An empty body and a JSON `null` are an empty roster.
pub fn parse_roster_body(body: &str) -> Result<Vec<RawDriverRecord>, FetchError> {
    if body.trim().is_empty() {
        return Ok(vec![]);
    }
    RawDriverRecord::list_from_json(body).map_err(|e| FetchError::Malformed(e.to_string()))
}

/// Roster endpoint of the campus services API, `GET <base_url>/shuttle`.
pub struct HttpRosterEndpoint {
    client: reqwest::Client,
    url: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl HttpRosterEndpoint {
    /// Creates the endpoint below `base_url`. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(HttpRosterEndpoint {
            client,
            url: format!("{}/shuttle", base_url.trim_end_matches('/')),
            token_provider: None,
        })
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RosterEndpoint for HttpRosterEndpoint {
    async fn fetch(&self) -> Result<Vec<RawDriverRecord>, FetchError> {
        let mut request = self.client.get(&self.url).header(ACCEPT, "application/json");
        if let Some(token) = self.token_provider.as_ref().and_then(|p| p.token()) {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Roster request unauthorized, the session token is missing or expired");
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let records = parse_roster_body(&body)?;
        debug!("Fetched {} roster records from {}", records.len(), self.url);
        Ok(records)
    }
}
