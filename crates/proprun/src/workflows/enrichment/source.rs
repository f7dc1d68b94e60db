use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use super::listing::ListingRecord;

#[derive(Debug, thiserror::Error)]
pub enum ListingSourceError {
    #[error("failed to read listing export {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid listing CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("no listing snapshot for {location} dated {date} at {path}")]
    SnapshotMissing {
        location: String,
        date: NaiveDate,
        path: PathBuf,
    },
    #[error("listing load task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Reads scraped listing exports into records, preserving row order.
pub struct ListingCsvImporter;

impl ListingCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<ListingRecord>, ListingSourceError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| ListingSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<ListingRecord>, ListingSourceError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let mut records = Vec::new();

        for record in csv_reader.deserialize::<ListingRecord>() {
            records.push(record?);
        }

        debug!(count = records.len(), "parsed listing export");
        Ok(records)
    }
}

/// Where a run gets its listings from. The service never scrapes; it only
/// reads exports that some other process has already written.
pub trait ListingSource: Send + Sync {
    fn listings(&self, location: &str) -> Result<Vec<ListingRecord>, ListingSourceError>;
}

/// Dated exports named `HomeHarvest_<date>_<location>.csv` inside a data
/// directory. Only today's snapshot is considered fresh.
#[derive(Debug, Clone)]
pub struct SnapshotListingSource {
    data_dir: PathBuf,
}

impl SnapshotListingSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn snapshot_path(&self, location: &str, date: NaiveDate) -> PathBuf {
        self.data_dir.join(snapshot_file_name(location, date))
    }

    pub fn listings_on(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> Result<Vec<ListingRecord>, ListingSourceError> {
        let path = self.snapshot_path(location, date);
        if !path.is_file() {
            return Err(ListingSourceError::SnapshotMissing {
                location: location.to_string(),
                date,
                path,
            });
        }

        info!(path = %path.display(), "loading listing snapshot");
        ListingCsvImporter::from_path(&path)
    }
}

impl ListingSource for SnapshotListingSource {
    fn listings(&self, location: &str) -> Result<Vec<ListingRecord>, ListingSourceError> {
        self.listings_on(location, Local::now().date_naive())
    }
}

/// A fixed export used regardless of the requested location (test mode).
#[derive(Debug, Clone)]
pub struct FixtureListingSource {
    path: PathBuf,
}

impl FixtureListingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ListingSource for FixtureListingSource {
    fn listings(&self, _location: &str) -> Result<Vec<ListingRecord>, ListingSourceError> {
        info!(path = %self.path.display(), "loading fixture listings");
        ListingCsvImporter::from_path(&self.path)
    }
}

pub fn snapshot_file_name(location: &str, date: NaiveDate) -> String {
    let formatted = location.trim().replace(", ", "_");
    format!("HomeHarvest_{}_{}.csv", date.format("%Y-%m-%d"), formatted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "property_url,full_street_line,city,state,zip_code,style,beds,full_baths,half_baths,sqft,list_price,home_insurance,property_tax\n";

    #[test]
    fn importer_preserves_row_order_and_blank_cells() {
        let csv = format!(
            "{HEADER}\
https://x/1,1 First St,Austin,TX,78704,SINGLE_FAMILY,3,2,,1200,300000,100,400\n\
https://x/2,2 Second St,Austin,TX,78705.0,CONDOS,,1,1,,210000,,\n"
        );
        let records = ListingCsvImporter::from_reader(Cursor::new(csv)).expect("parses");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].full_street_line.as_deref(), Some("1 First St"));
        assert_eq!(records[0].half_baths, None);
        assert_eq!(records[0].list_price, Some(300_000.0));
        assert_eq!(records[1].beds, None);
        assert_eq!(records[1].zip_code.as_deref(), Some("78705.0"));
        assert_eq!(records[1].home_insurance, None);
    }

    #[test]
    fn importer_tolerates_missing_optional_columns() {
        let csv = "full_street_line,city,state,zip_code,beds,full_baths\n1 First St,Austin,TX,78704,2,1\n";
        let records = ListingCsvImporter::from_reader(Cursor::new(csv)).expect("parses");
        assert_eq!(records[0].beds, Some(2.0));
        assert!(records[0].list_price.is_none());
    }

    #[test]
    fn snapshot_file_name_formats_location() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        assert_eq!(
            snapshot_file_name("Austin, TX", date),
            "HomeHarvest_2024-06-01_Austin_TX.csv"
        );
    }

    #[test]
    fn missing_snapshot_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = SnapshotListingSource::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");

        match source.listings_on("Austin, TX", date) {
            Err(ListingSourceError::SnapshotMissing { path, .. }) => {
                assert!(path.ends_with("HomeHarvest_2024-06-01_Austin_TX.csv"));
            }
            other => panic!("expected missing snapshot, got {other:?}"),
        }
    }

    #[test]
    fn existing_snapshot_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = SnapshotListingSource::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        std::fs::write(
            source.snapshot_path("Austin, TX", date),
            format!("{HEADER}u,1 First St,Austin,TX,78704,SINGLE_FAMILY,3,2,,1200,300000,100,400\n"),
        )
        .expect("write snapshot");

        let records = source.listings_on("Austin, TX", date).expect("loads");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn fixture_source_reports_io_errors() {
        let source = FixtureListingSource::new("./does-not-exist.csv");
        match source.listings("Anywhere") {
            Err(ListingSourceError::Io { .. }) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
