use crate::infra::{build_pipeline, default_options};
use chrono::Local;
use clap::Args;
use proprun::config::AppConfig;
use proprun::error::AppError;
use proprun::workflows::enrichment::{
    EnrichmentOptions, EnrichmentReport, EnrichmentResult, ListingCsvImporter,
};
use std::cmp::Ordering;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct EnrichArgs {
    /// Listing export to enrich
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Desired monthly profit
    #[arg(long)]
    pub(crate) profit: Option<f64>,
    /// Down payment as a percentage of list price
    #[arg(long)]
    pub(crate) down_payment: Option<f64>,
    /// Annual interest rate in percent
    #[arg(long)]
    pub(crate) interest_rate: Option<f64>,
    /// Loan term in years
    #[arg(long)]
    pub(crate) loan_term_years: Option<u32>,
    /// Only enrich the first N listings
    #[arg(long)]
    pub(crate) num_listings: Option<usize>,
    /// Only enrich listings in this zip code
    #[arg(long)]
    pub(crate) zip_code: Option<String>,
    /// Never call the rent estimate service; only use cached estimates
    #[arg(short, long)]
    pub(crate) cache_only: bool,
    /// Print the raw JSON report instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

impl EnrichArgs {
    fn options(&self, defaults: EnrichmentOptions) -> EnrichmentOptions {
        EnrichmentOptions {
            profit: self.profit.unwrap_or(defaults.profit),
            down_payment_pct: self.down_payment.unwrap_or(defaults.down_payment_pct),
            interest_rate_pct: self.interest_rate.unwrap_or(defaults.interest_rate_pct),
            loan_term_years: self.loan_term_years.unwrap_or(defaults.loan_term_years),
            limit: self.num_listings.filter(|count| *count > 0).or(defaults.limit),
            zip_code: self.zip_code.clone().or(defaults.zip_code.clone()),
            ..defaults
        }
    }
}

pub(crate) async fn run_enrich(config: AppConfig, args: EnrichArgs) -> Result<(), AppError> {
    let options = args.options(default_options(&config, args.cache_only));
    let listings = ListingCsvImporter::from_path(&args.csv)?;
    let pipeline = build_pipeline(&config)?;
    let report = pipeline.run(&options, listings).await?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        render_report(&report, &options);
    }
    Ok(())
}

/// Results best-first: largest rent surplus at the top. Input order breaks ties.
pub(crate) fn ranked(results: &[EnrichmentResult]) -> Vec<&EnrichmentResult> {
    let mut ranked: Vec<&EnrichmentResult> = results.iter().collect();
    ranked.sort_by(|a, b| {
        b.differential
            .partial_cmp(&a.differential)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

fn render_report(report: &EnrichmentReport, options: &EnrichmentOptions) {
    println!("Rental profitability report ({})", Local::now().date_naive());
    println!(
        "Financing: {}% down, {}% over {} years; target profit ${:.2}/month",
        options.down_payment_pct, options.interest_rate_pct, options.loan_term_years, options.profit
    );
    println!(
        "{} enriched, {} profitable, {} skipped ({} cached, {} fetched)",
        report.results.len(),
        report.profitable().count(),
        report.skipped,
        report.cache_hits,
        report.fetched
    );

    if !report.skip_reasons.is_empty() {
        println!("\nSkipped listings");
        for (reason, count) in &report.skip_reasons {
            println!("- {}: {}", reason.label(), count);
        }
    }

    if report.results.is_empty() {
        println!("\nNo listings could be enriched");
        return;
    }

    println!("\nListings by rent surplus");
    for result in ranked(&report.results) {
        let verdict = if result.is_profitable {
            "PROFITABLE".to_string()
        } else {
            match result.adjusted_profit {
                Some(profit) => format!("short, ${profit:.2} achievable"),
                None => "short".to_string(),
            }
        };
        println!(
            "- {} | list ${:.0} | cost ${:.2} | target ${:.2} | market ${:.2} ({:.0}-{:.0}) | {:+.2} | {}",
            result.address,
            result.list_price,
            result.total_operating_cost,
            result.rental_price,
            result.rental_value,
            result.rentcast_rent_low,
            result.rentcast_rent_high,
            result.differential,
            verdict
        );
    }
}
