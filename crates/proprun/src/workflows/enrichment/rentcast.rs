use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::cache::CachedEstimate;
use super::normalizer::NormalizedListing;
use crate::config::RentcastConfig;

const LONG_TERM_RENT_PATH: &str = "/v1/avm/rent/long-term";

/// Query parameters for one long-term rent estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentEstimateRequest {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub square_footage: f64,
}

impl From<&NormalizedListing> for RentEstimateRequest {
    fn from(listing: &NormalizedListing) -> Self {
        Self {
            address: listing.address.clone(),
            property_type: listing.property_type.clone(),
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            square_footage: listing.square_footage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchFailure {
    #[error("rent estimate request failed: {0}")]
    Transport(String),
    #[error("rent estimate service answered {0}")]
    Status(u16),
    #[error("rent estimate response malformed: {0}")]
    Malformed(String),
    #[error("rent estimate request timed out")]
    Timeout,
    #[error("no API key configured for the rent estimate service")]
    MissingCredentials,
}

impl FetchFailure {
    /// Failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Transport(_) | FetchFailure::Timeout => true,
            FetchFailure::Status(code) => *code == 429 || *code >= 500,
            FetchFailure::Malformed(_) | FetchFailure::MissingCredentials => false,
        }
    }
}

/// One external lookup per uncached address.
#[async_trait]
pub trait RentEstimateClient: Send + Sync {
    async fn fetch(&self, request: &RentEstimateRequest) -> Result<CachedEstimate, FetchFailure>;
}

/// Client for the RentCast long-term rent AVM endpoint. Makes exactly one
/// request per call.
#[derive(Clone)]
pub struct RentcastClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RentcastClient {
    pub fn new(config: &RentcastConfig) -> Result<Self, FetchFailure> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| FetchFailure::Transport(err.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                LONG_TERM_RENT_PATH
            ),
            api_key: config.api_key.clone(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for RentcastClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RentcastClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RentEstimateClient for RentcastClient {
    async fn fetch(&self, request: &RentEstimateRequest) -> Result<CachedEstimate, FetchFailure> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(FetchFailure::MissingCredentials)?;

        debug!(address = %request.address, ?request, "requesting rent estimate");

        let response = self
            .http
            .get(&self.endpoint)
            .query(request)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Api-Key", api_key)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    FetchFailure::Timeout
                } else {
                    FetchFailure::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        debug!(address = %request.address, %status, "rent estimate response");
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| FetchFailure::Transport(err.to_string()))?;
        parse_estimate(&body)
    }
}

pub(crate) fn parse_estimate(body: &[u8]) -> Result<CachedEstimate, FetchFailure> {
    serde_json::from_slice(body).map_err(|err| FetchFailure::Malformed(err.to_string()))
}

/// Bounded retry with exponential backoff around another client. Only
/// transient failures are retried.
#[derive(Debug, Clone)]
pub struct RetryingClient<C> {
    inner: C,
    max_retries: u32,
    base_delay: Duration,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C> RentEstimateClient for RetryingClient<C>
where
    C: RentEstimateClient,
{
    async fn fetch(&self, request: &RentEstimateRequest) -> Result<CachedEstimate, FetchFailure> {
        let mut attempt = 0u32;
        loop {
            match self.inner.fetch(request).await {
                Ok(estimate) => return Ok(estimate),
                Err(failure) if failure.is_transient() && attempt < self.max_retries => {
                    let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        address = %request.address,
                        %failure,
                        attempt,
                        ?delay,
                        "retrying rent estimate"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}
