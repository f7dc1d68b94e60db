//! Rental profitability enrichment for batches of for-sale listings.
//!
//! A run normalizes each listing, looks its canonical address up in the
//! estimate cache, fetches missing estimates from the rent estimate service
//! with bounded concurrency, and compares the market rent against the rent
//! needed to cover financing, insurance, tax, and the desired profit.

pub mod cache;
pub mod domain;
pub mod finance;
pub mod listing;
pub mod normalizer;
pub mod pipeline;
pub mod profitability;
pub mod rentcast;
pub mod router;
pub mod service;
pub mod source;

pub use cache::{
    CacheError, CachedEstimate, EstimateCache, EstimateMap, EstimateStore, InMemoryEstimateStore,
    JsonFileEstimateStore,
};
pub use domain::{EnrichmentOptions, EnrichmentReport, EnrichmentResult, SkipReason};
pub use finance::{monthly_payment, LoanTerms};
pub use listing::{canonical_address, ListingRecord};
pub use normalizer::{normalize, NormalizedListing};
pub use pipeline::{EnrichmentPipeline, PipelineError};
pub use profitability::{assess, Profitability};
pub use rentcast::{
    FetchFailure, RentEstimateClient, RentEstimateRequest, RentcastClient, RetryingClient,
};
pub use router::enrichment_router;
pub use service::{EnrichmentService, EnrichmentServiceError, ListingOptionsRequest};
pub use source::{
    FixtureListingSource, ListingCsvImporter, ListingSource, ListingSourceError,
    SnapshotListingSource,
};
