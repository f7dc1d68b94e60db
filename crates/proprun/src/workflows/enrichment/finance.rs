/// Financing scenario applied to every listing in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanTerms {
    pub down_payment_pct: f64,
    pub annual_rate_pct: f64,
    pub term_years: u32,
}

impl LoanTerms {
    pub fn loan_amount(&self, list_price: f64) -> f64 {
        list_price * (1.0 - self.down_payment_pct / 100.0)
    }
}

/// Monthly payment on a fully amortized fixed-rate loan.
///
/// A non-positive rate falls back to flat amortization (`loan / n`), and a
/// zero-length term returns the whole loan amount as a single payment.
pub fn monthly_payment(list_price: f64, terms: &LoanTerms) -> f64 {
    let loan_amount = terms.loan_amount(list_price);
    let payments = f64::from(terms.term_years) * 12.0;
    if payments <= 0.0 {
        return loan_amount;
    }

    let monthly_rate = terms.annual_rate_pct / 100.0 / 12.0;
    if monthly_rate <= 0.0 {
        return loan_amount / payments;
    }

    let growth = (1.0 + monthly_rate).powf(payments);
    loan_amount * monthly_rate * growth / (growth - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(down_payment_pct: f64, annual_rate_pct: f64, term_years: u32) -> LoanTerms {
        LoanTerms {
            down_payment_pct,
            annual_rate_pct,
            term_years,
        }
    }

    #[test]
    fn thirty_year_fixed_matches_amortization_table() {
        let payment = monthly_payment(300_000.0, &terms(20.0, 7.0, 30));
        assert!((payment - 1596.73).abs() < 0.01, "got {payment}");

        let payment = monthly_payment(250_000.0, &terms(20.0, 6.0, 30));
        assert!((payment - 1199.10).abs() < 0.01, "got {payment}");
    }

    #[test]
    fn zero_rate_amortizes_flat() {
        let payment = monthly_payment(300_000.0, &terms(20.0, 0.0, 30));
        assert!((payment - 666.666_666).abs() < 1e-3);
        assert!(payment.is_finite());
    }

    #[test]
    fn negative_rate_is_treated_as_zero() {
        let flat = monthly_payment(300_000.0, &terms(20.0, 0.0, 30));
        let negative = monthly_payment(300_000.0, &terms(20.0, -1.5, 30));
        assert_eq!(flat, negative);
    }

    #[test]
    fn zero_term_returns_loan_amount() {
        assert_eq!(monthly_payment(100_000.0, &terms(10.0, 7.0, 0)), 90_000.0);
    }

    #[test]
    fn payment_is_positive_and_monotonic() {
        let base = terms(20.0, 6.5, 30);
        let mut previous = 0.0;
        for price in [50_000.0, 120_000.0, 300_000.0, 750_000.0, 2_000_000.0] {
            let payment = monthly_payment(price, &base);
            assert!(payment > 0.0);
            assert!(payment > previous, "payment must grow with price");
            previous = payment;
        }

        let mut previous = f64::MAX;
        for down in [0.0, 5.0, 20.0, 50.0, 90.0] {
            let payment = monthly_payment(400_000.0, &terms(down, 6.5, 30));
            assert!(payment > 0.0);
            assert!(payment < previous, "payment must shrink as down payment grows");
            previous = payment;
        }
    }

    #[test]
    fn missing_price_propagates_nan() {
        assert!(monthly_payment(f64::NAN, &terms(20.0, 7.0, 30)).is_nan());
    }
}
