use super::domain::SkipReason;
use super::listing::{canonical_address, normalize_zip, ListingRecord};

pub const DEFAULT_SQUARE_FOOTAGE: f64 = 1000.0;

/// A listing that carries enough data to request a rent estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    pub address: String,
    pub zip_code: String,
    pub property_type: Option<String>,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub square_footage: f64,
    /// Square footage was missing and defaulted.
    pub square_footage_estimated: bool,
    pub list_price: Option<f64>,
    pub home_insurance: Option<f64>,
    pub property_tax: Option<f64>,
    pub missing_fields: Vec<&'static str>,
}

pub fn normalize(record: &ListingRecord) -> Result<NormalizedListing, SkipReason> {
    let missing_fields = missing_fields(record);

    let (Some(bedrooms), Some(full_baths)) = (record.beds, record.full_baths) else {
        return Err(SkipReason::MissingRequiredField);
    };

    let (Some(street), Some(city), Some(state), Some(zip)) = (
        record.full_street_line.as_deref(),
        record.city.as_deref(),
        record.state.as_deref(),
        record.zip_code.as_deref(),
    ) else {
        return Err(SkipReason::IncompleteAddress);
    };

    let bathrooms = match record.half_baths {
        Some(half_baths) => full_baths + half_baths,
        None => full_baths,
    };

    let (square_footage, square_footage_estimated) = match record.sqft {
        Some(sqft) if sqft > 0.0 => (sqft, false),
        _ => (DEFAULT_SQUARE_FOOTAGE, true),
    };

    Ok(NormalizedListing {
        address: canonical_address(street, city, state, zip),
        zip_code: normalize_zip(zip),
        property_type: record.style.as_deref().map(property_type_for_style),
        bedrooms,
        bathrooms,
        square_footage,
        square_footage_estimated,
        list_price: record.list_price,
        home_insurance: record.home_insurance,
        property_tax: record.property_tax,
        missing_fields,
    })
}

fn missing_fields(record: &ListingRecord) -> Vec<&'static str> {
    let checks: [(&'static str, bool); 12] = [
        ("full_street_line", record.full_street_line.is_none()),
        ("city", record.city.is_none()),
        ("state", record.state.is_none()),
        ("zip_code", record.zip_code.is_none()),
        ("list_price", record.list_price.is_none()),
        ("beds", record.beds.is_none()),
        ("full_baths", record.full_baths.is_none()),
        ("half_baths", record.half_baths.is_none()),
        ("sqft", record.sqft.is_none()),
        ("style", record.style.is_none()),
        ("home_insurance", record.home_insurance.is_none()),
        ("property_tax", record.property_tax.is_none()),
    ];

    checks
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
}

/// Maps the scraper's style codes onto the estimate service's property types.
/// Unknown styles pass through untouched.
pub(crate) fn property_type_for_style(style: &str) -> String {
    let mapped = match style.trim().to_ascii_uppercase().as_str() {
        "SINGLE_FAMILY" => "Single Family",
        "CONDO" | "CONDOS" | "CONDO_TOWNHOME" | "CONDO_TOWNHOME_ROWHOME_COOP" => "Condo",
        "TOWNHOME" | "TOWNHOMES" | "TOWNHOUSE" => "Townhouse",
        "MULTI_FAMILY" | "DUPLEX_TRIPLEX" => "Multi-Family",
        "APARTMENT" => "Apartment",
        "MOBILE" | "MANUFACTURED" => "Manufactured",
        _ => return style.trim().to_string(),
    };
    mapped.to_string()
}
