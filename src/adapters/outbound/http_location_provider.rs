//! HTTP Location Provider
//!
//! Implements LocationProvider against a profile endpoint:
//! `GET {base_url}/users/{author}` answering `{"location": "..."}`.

use crate::domain::ports::{LocationProvider, LookupOutcome, ProviderError};
use crate::domain::value_objects::AuthorId;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Unix timestamp (seconds) at which the provider window resets.
const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

/// Default wait when a 429 carries no usable header.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    location: Option<String>,
}

/// HTTP-backed location provider.
pub struct HttpLocationProvider {
    base_url: String,
    client: reqwest::Client,
    default_wait: Duration,
}

impl HttpLocationProvider {
    /// Create a provider for the given base URL.
    pub fn new(base_url: impl Into<String>, default_wait: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            default_wait,
        }
    }

    /// Create a provider with a request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        default_wait: Duration,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            default_wait,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Map a 429's headers into a rate-limit outcome.
    fn rate_limited(&self, headers: &HeaderMap) -> LookupOutcome {
        let header_u64 = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        let reset_time = header_u64(RATE_LIMIT_RESET).unwrap_or(0);
        let wait = match header_u64(RETRY_AFTER.as_str()) {
            Some(secs) => Duration::from_secs(secs),
            None if reset_time > 0 => Duration::ZERO,
            None => self.default_wait,
        };

        LookupOutcome::RateLimited { reset_time, wait }
    }
}

#[async_trait]
impl LocationProvider for HttpLocationProvider {
    async fn lookup(&self, author: &AuthorId) -> Result<LookupOutcome, ProviderError> {
        let url = format!("{}/users/{}", self.base_url, author);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let profile: ProfileResponse = response.json().await?;
                let location = profile
                    .location
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty());
                Ok(LookupOutcome::Resolved(location))
            }
            StatusCode::NOT_FOUND => Ok(LookupOutcome::Resolved(None)),
            StatusCode::TOO_MANY_REQUESTS => Ok(self.rate_limited(response.headers())),
            status => Err(ProviderError::UnexpectedStatus(status.as_u16())),
        }
    }
}
