use super::cache::CachedEstimate;
use super::domain::{round_cents, EnrichmentOptions, EnrichmentResult, SkipReason};
use super::finance::monthly_payment;
use super::normalizer::NormalizedListing;

/// Comparison of a market rent estimate against the rent needed to clear the
/// desired profit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profitability {
    pub target_rent: f64,
    pub differential: f64,
    pub is_profitable: bool,
    /// Profit still achievable at market rent. Only set when the estimate falls
    /// short of the target.
    pub adjusted_profit: Option<f64>,
}

impl Profitability {
    pub fn evaluate(operating_cost: f64, desired_profit: f64, rent_estimate: f64) -> Self {
        let target_rent = operating_cost + desired_profit;
        let differential = rent_estimate - target_rent;
        let adjusted_profit = (differential < 0.0).then(|| (desired_profit + differential).max(0.0));

        Self {
            target_rent,
            differential,
            is_profitable: differential >= 0.0,
            adjusted_profit,
        }
    }
}

/// Builds the enriched result for one listing, or reports why it cannot be
/// built. Operating cost must be finite; sentinel values are never emitted.
pub fn assess(
    listing: &NormalizedListing,
    estimate: &CachedEstimate,
    options: &EnrichmentOptions,
) -> Result<EnrichmentResult, SkipReason> {
    let (Some(list_price), Some(home_insurance), Some(property_tax)) = (
        listing.list_price,
        listing.home_insurance,
        listing.property_tax,
    ) else {
        return Err(SkipReason::NonNumericCost);
    };

    let mortgage = monthly_payment(list_price, &options.loan_terms());
    let operating_cost = mortgage + home_insurance + property_tax;
    if !operating_cost.is_finite() || !estimate.rent.is_finite() {
        return Err(SkipReason::NonNumericCost);
    }

    let outcome = Profitability::evaluate(operating_cost, options.profit, estimate.rent);

    Ok(EnrichmentResult {
        address: listing.address.clone(),
        list_price: round_cents(list_price),
        mortgage: round_cents(mortgage),
        home_insurance: round_cents(home_insurance),
        property_tax: round_cents(property_tax),
        total_operating_cost: round_cents(operating_cost),
        target_net_margin: round_cents(outcome.target_rent - mortgage),
        rental_price: round_cents(outcome.target_rent),
        rental_value: round_cents(estimate.rent),
        differential: round_cents(outcome.differential),
        is_profitable: outcome.is_profitable,
        adjusted_profit: outcome.adjusted_profit.map(round_cents),
        rentcast_rent_low: round_cents(estimate.rent_range_low),
        rentcast_rent_high: round_cents(estimate.rent_range_high),
        square_footage_estimated: listing.square_footage_estimated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> NormalizedListing {
        NormalizedListing {
            address: "1 First St, Austin, TX 78704".to_string(),
            zip_code: "78704".to_string(),
            property_type: Some("Single Family".to_string()),
            bedrooms: 3.0,
            bathrooms: 2.0,
            square_footage: 1400.0,
            square_footage_estimated: false,
            list_price: Some(300_000.0),
            home_insurance: Some(100.0),
            property_tax: Some(400.0),
            missing_fields: Vec::new(),
        }
    }

    #[test]
    fn shortfall_reports_adjusted_profit() {
        let outcome = Profitability::evaluate(2000.0, 500.0, 2200.0);
        assert_eq!(outcome.target_rent, 2500.0);
        assert_eq!(outcome.differential, -300.0);
        assert!(!outcome.is_profitable);
        assert_eq!(outcome.adjusted_profit, Some(200.0));
    }

    #[test]
    fn surplus_is_profitable_without_adjustment() {
        let outcome = Profitability::evaluate(2000.0, 500.0, 2600.0);
        assert_eq!(outcome.differential, 100.0);
        assert!(outcome.is_profitable);
        assert_eq!(outcome.adjusted_profit, None);
    }

    #[test]
    fn break_even_counts_as_profitable() {
        let outcome = Profitability::evaluate(2000.0, 500.0, 2500.0);
        assert_eq!(outcome.differential, 0.0);
        assert!(outcome.is_profitable);
        assert_eq!(outcome.adjusted_profit, None);
    }

    #[test]
    fn adjusted_profit_floors_at_zero() {
        let outcome = Profitability::evaluate(2000.0, 500.0, 1200.0);
        assert_eq!(outcome.adjusted_profit, Some(0.0));
    }

    #[test]
    fn assess_builds_rounded_result() {
        let result = assess(
            &listing(),
            &CachedEstimate::new(2200.0, 1950.0, 2450.0),
            &EnrichmentOptions::default(),
        )
        .expect("assessable");

        assert_eq!(result.mortgage, 1596.73);
        assert_eq!(result.total_operating_cost, 2096.73);
        assert_eq!(result.rental_price, 2596.73);
        assert_eq!(result.target_net_margin, 1000.0);
        assert_eq!(result.differential, -396.73);
        assert!(!result.is_profitable);
        assert_eq!(result.adjusted_profit, Some(103.27));
        assert_eq!(result.rentcast_rent_low, 1950.0);
    }

    #[test]
    fn missing_tax_is_not_assessable() {
        let listing = NormalizedListing {
            property_tax: None,
            ..listing()
        };
        assert_eq!(
            assess(
                &listing,
                &CachedEstimate::new(2200.0, 1950.0, 2450.0),
                &EnrichmentOptions::default()
            ),
            Err(SkipReason::NonNumericCost)
        );
    }
}
