use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use tracing::info;

use super::cache::EstimateStore;
use super::domain::{EnrichmentOptions, EnrichmentReport};
use super::listing::ListingRecord;
use super::pipeline::{EnrichmentPipeline, PipelineError};
use super::rentcast::RentEstimateClient;
use super::source::{ListingSource, ListingSourceError};

/// Request payload accepted by the listing processing endpoint. Anything left
/// out falls back to the service defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingOptionsRequest {
    pub location: String,
    #[serde(default)]
    pub num_listings: Option<usize>,
    #[serde(default)]
    pub profit: Option<f64>,
    #[serde(default)]
    pub down_payment: Option<f64>,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub loan_term_years: Option<u32>,
    #[serde(default, deserialize_with = "zip_as_string")]
    pub zip_code: Option<String>,
}

impl ListingOptionsRequest {
    pub fn to_options(&self, defaults: &EnrichmentOptions) -> EnrichmentOptions {
        EnrichmentOptions {
            profit: self.profit.unwrap_or(defaults.profit),
            down_payment_pct: self.down_payment.unwrap_or(defaults.down_payment_pct),
            interest_rate_pct: self.interest_rate.unwrap_or(defaults.interest_rate_pct),
            loan_term_years: self.loan_term_years.unwrap_or(defaults.loan_term_years),
            // Zero means "no limit", as it always has for this endpoint.
            limit: self.num_listings.filter(|count| *count > 0).or(defaults.limit),
            zip_code: self.zip_code.clone().or_else(|| defaults.zip_code.clone()),
            ..defaults.clone()
        }
    }
}

fn zip_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ZipValue {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<ZipValue>::deserialize(deserializer)? {
        Some(ZipValue::Number(zip)) => Some(format!("{zip:05}")),
        Some(ZipValue::Text(text)) => Some(text.trim().to_string()).filter(|zip| !zip.is_empty()),
        None => None,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Source(#[from] ListingSourceError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Resolves listings for a location and runs them through the pipeline.
pub struct EnrichmentService<S, C> {
    pipeline: EnrichmentPipeline<S, C>,
    source: Arc<dyn ListingSource>,
    defaults: EnrichmentOptions,
}

impl<S, C> EnrichmentService<S, C>
where
    S: EstimateStore + 'static,
    C: RentEstimateClient + 'static,
{
    pub fn new(
        pipeline: EnrichmentPipeline<S, C>,
        source: Arc<dyn ListingSource>,
        defaults: EnrichmentOptions,
    ) -> Self {
        Self {
            pipeline,
            source,
            defaults,
        }
    }

    /// Enrich an already loaded batch.
    pub async fn enrich_listings(
        &self,
        options: &EnrichmentOptions,
        listings: Vec<ListingRecord>,
    ) -> Result<EnrichmentReport, PipelineError> {
        self.pipeline.run(options, listings).await
    }

    /// Load the listings for the requested location and enrich them.
    pub async fn process(
        &self,
        request: ListingOptionsRequest,
    ) -> Result<EnrichmentReport, EnrichmentServiceError> {
        let location = request.location.trim();
        if location.is_empty() {
            return Err(EnrichmentServiceError::InvalidRequest(
                "location is required, e.g. \"Austin, TX\"".to_string(),
            ));
        }

        let options = request.to_options(&self.defaults);
        let source = Arc::clone(&self.source);
        let requested = location.to_string();
        let listings = tokio::task::spawn_blocking(move || source.listings(&requested))
            .await
            .map_err(ListingSourceError::from)??;
        info!(%location, listings = listings.len(), "processing listings");

        Ok(self.enrich_listings(&options, listings).await?)
    }
}
