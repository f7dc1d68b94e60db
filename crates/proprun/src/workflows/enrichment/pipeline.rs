use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::cache::{CacheError, EstimateCache, EstimateMap, EstimateStore};
use super::domain::{EnrichmentOptions, EnrichmentReport, SkipReason};
use super::listing::{normalize_zip, ListingRecord};
use super::normalizer::{normalize, NormalizedListing};
use super::profitability::assess;
use super::rentcast::{FetchFailure, RentEstimateClient, RentEstimateRequest};

/// Run-level failures. Everything that goes wrong for a single listing is
/// absorbed into the report's skip counts instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("estimate store task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
}

/// Cache-first, concurrency-bounded enrichment of a listing batch.
pub struct EnrichmentPipeline<S, C> {
    store: Arc<S>,
    client: Arc<C>,
}

impl<S, C> EnrichmentPipeline<S, C>
where
    S: EstimateStore + 'static,
    C: RentEstimateClient + 'static,
{
    pub fn new(store: Arc<S>, client: Arc<C>) -> Self {
        Self { store, client }
    }

    /// Enriches `listings`, returning results in input order. The store is read
    /// once before any lookup and written once after every fetch has settled.
    pub async fn run(
        &self,
        options: &EnrichmentOptions,
        listings: Vec<ListingRecord>,
    ) -> Result<EnrichmentReport, PipelineError> {
        let listings = apply_filters(options, listings);
        let cache = Arc::new(EstimateCache::from_map(self.load_store().await?));
        info!(
            listings = listings.len(),
            cached = cache.len(),
            cache_only = options.cache_only,
            "starting enrichment run"
        );

        let normalized: Vec<Result<NormalizedListing, SkipReason>> = listings
            .iter()
            .map(|record| {
                let outcome = normalize(record);
                match &outcome {
                    Ok(listing) if !listing.missing_fields.is_empty() => {
                        debug!(address = %listing.address, missing = ?listing.missing_fields, "listing has gaps");
                    }
                    Err(reason) => {
                        debug!(street = ?record.full_street_line, reason = reason.label(), "skipping listing");
                    }
                    Ok(_) => {}
                }
                outcome
            })
            .collect();

        let mut report = EnrichmentReport::default();
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for listing in normalized.iter().flatten() {
            if !seen.insert(listing.address.as_str()) {
                continue;
            }
            if cache.contains(&listing.address) {
                report.cache_hits += 1;
                debug!(address = %listing.address, "found cached estimate");
            } else if !options.cache_only {
                pending.push(RentEstimateRequest::from(listing));
            }
        }

        if !pending.is_empty() {
            info!(requests = pending.len(), concurrency = options.concurrency, "fetching rent estimates");
            report.fetched = self.fetch_all(options, pending, &cache).await;
        }

        for outcome in normalized {
            let listing = match outcome {
                Ok(listing) => listing,
                Err(reason) => {
                    report.record_skip(reason);
                    continue;
                }
            };

            let Some(estimate) = cache.get(&listing.address) else {
                let reason = if options.cache_only {
                    SkipReason::CacheOnlyMiss
                } else {
                    SkipReason::FetchFailed
                };
                debug!(address = %listing.address, reason = reason.label(), "skipping listing");
                report.record_skip(reason);
                continue;
            };

            match assess(&listing, &estimate, options) {
                Ok(result) => report.results.push(result),
                Err(reason) => {
                    debug!(address = %listing.address, reason = reason.label(), "skipping listing");
                    report.record_skip(reason);
                }
            }
        }

        self.persist_store(cache.snapshot()).await?;
        info!(
            results = report.results.len(),
            skipped = report.skipped,
            cache_hits = report.cache_hits,
            fetched = report.fetched,
            "enrichment run complete"
        );
        Ok(report)
    }

    async fn load_store(&self) -> Result<EstimateMap, PipelineError> {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || store.load()).await??)
    }

    async fn persist_store(&self, estimates: EstimateMap) -> Result<(), PipelineError> {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || store.persist(&estimates)).await??)
    }

    /// Issues one fetch per request with at most `options.concurrency` in
    /// flight. Successful estimates land in `cache`; the count is returned.
    async fn fetch_all(
        &self,
        options: &EnrichmentOptions,
        requests: Vec<RentEstimateRequest>,
        cache: &Arc<EstimateCache>,
    ) -> usize {
        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for request in requests {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let client = self.client.clone();
            let timeout = options.fetch_timeout;
            tasks.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, client.fetch(&request)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(FetchFailure::Timeout),
                };
                drop(permit);
                (request.address, outcome)
            });
        }

        let mut fetched = 0;
        let mut failures: HashMap<String, FetchFailure> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((address, Ok(estimate))) => {
                    debug!(%address, rent = estimate.rent, "cached rental estimate");
                    cache.put(address, estimate);
                    fetched += 1;
                }
                Ok((address, Err(failure))) => {
                    failures.insert(address, failure);
                }
                Err(err) => warn!(error = %err, "rent estimate task aborted"),
            }
        }

        for (address, failure) in &failures {
            info!(%address, %failure, "no rent estimate available");
        }
        fetched
    }
}

/// Limits the batch before any enrichment: first N rows, then the zip filter.
pub fn apply_filters(options: &EnrichmentOptions, listings: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let limit = options.limit.unwrap_or(usize::MAX);
    let zip = options.zip_code.as_deref().map(normalize_zip);

    listings
        .into_iter()
        .take(limit)
        .filter(|record| match (&zip, record.zip_code.as_deref()) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => normalize_zip(actual) == *wanted,
            (Some(_), None) => false,
        })
        .collect()
}
