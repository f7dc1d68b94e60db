use serde::{Deserialize, Deserializer, Serialize};

/// Raw listing row as exported by the listing scraper. Every field may be
/// absent; blank and `NaN` cells deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub full_street_line: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub zip_code: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub list_price: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub beds: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub full_baths: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub half_baths: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub sqft: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub home_insurance: Option<f64>,
    #[serde(default, deserialize_with = "optional_number")]
    pub property_tax: Option<f64>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && !is_nan_marker(value)))
}

/// Accepts numbers or numeric strings. Unparseable values count as missing.
fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    let parsed = match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(value)) => Some(value),
        Some(NumberOrText::Text(text)) => text.trim().replace(',', "").parse::<f64>().ok(),
        None => None,
    };
    Ok(parsed.filter(|value| value.is_finite()))
}

fn is_nan_marker(value: &str) -> bool {
    value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("null")
}

/// Renders a zip code the way it is keyed: scraped exports sometimes carry
/// zip codes as floats (`78704.0`).
pub fn normalize_zip(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Cache identity for a listing: `"<street>, <city>, <state> <zip>"`.
pub fn canonical_address(street: &str, city: &str, state: &str, zip: &str) -> String {
    format!(
        "{}, {}, {} {}",
        street.trim(),
        city.trim(),
        state.trim(),
        normalize_zip(zip)
    )
}
