use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::finance::LoanTerms;

/// Per-run settings. One value is built for every pipeline invocation; nothing
/// here is read from ambient process state.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOptions {
    /// Desired monthly profit on top of operating cost.
    pub profit: f64,
    pub down_payment_pct: f64,
    pub interest_rate_pct: f64,
    pub loan_term_years: u32,
    /// Keep only the first N listings of the batch.
    pub limit: Option<usize>,
    pub zip_code: Option<String>,
    /// Skip addresses that are not already cached instead of fetching them.
    pub cache_only: bool,
    /// Maximum number of estimate fetches in flight.
    pub concurrency: usize,
    pub fetch_timeout: Duration,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self {
            profit: 500.0,
            down_payment_pct: 20.0,
            interest_rate_pct: 7.0,
            loan_term_years: 30,
            limit: None,
            zip_code: None,
            cache_only: false,
            concurrency: 8,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl EnrichmentOptions {
    pub fn loan_terms(&self) -> LoanTerms {
        LoanTerms {
            down_payment_pct: self.down_payment_pct,
            annual_rate_pct: self.interest_rate_pct,
            term_years: self.loan_term_years,
        }
    }
}

/// Why a listing was left out of the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `beds` or `full_baths` absent.
    MissingRequiredField,
    IncompleteAddress,
    CacheOnlyMiss,
    FetchFailed,
    /// Price, insurance, or tax missing so operating cost is undefined.
    NonNumericCost,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::MissingRequiredField => "missing beds or full baths",
            SkipReason::IncompleteAddress => "incomplete address",
            SkipReason::CacheOnlyMiss => "not cached (cache-only mode)",
            SkipReason::FetchFailed => "rent estimate unavailable",
            SkipReason::NonNumericCost => "operating cost not computable",
        }
    }
}

/// One enriched listing. Field names follow the wire format consumed by the
/// web front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub address: String,
    pub list_price: f64,
    pub mortgage: f64,
    pub home_insurance: f64,
    pub property_tax: f64,
    pub total_operating_cost: f64,
    pub target_net_margin: f64,
    /// Target monthly rent: operating cost plus desired profit.
    pub rental_price: f64,
    /// Market rent estimate.
    pub rental_value: f64,
    pub differential: f64,
    pub is_profitable: bool,
    pub adjusted_profit: Option<f64>,
    pub rentcast_rent_low: f64,
    pub rentcast_rent_high: f64,
    pub square_footage_estimated: bool,
}

/// Outcome of a single pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentReport {
    pub results: Vec<EnrichmentResult>,
    pub skipped: usize,
    pub skip_reasons: BTreeMap<SkipReason, usize>,
    pub cache_hits: usize,
    pub fetched: usize,
}

impl EnrichmentReport {
    pub(crate) fn record_skip(&mut self, reason: SkipReason) {
        self.skipped += 1;
        *self.skip_reasons.entry(reason).or_insert(0) += 1;
    }

    pub fn profitable(&self) -> impl Iterator<Item = &EnrichmentResult> {
        self.results.iter().filter(|result| result.is_profitable)
    }
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
