use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Rent estimate as returned by the estimate service. Fields beyond the three
/// the pipeline reads are carried through untouched so the stored cache keeps
/// the full response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEstimate {
    pub rent: f64,
    pub rent_range_low: f64,
    pub rent_range_high: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CachedEstimate {
    pub fn new(rent: f64, rent_range_low: f64, rent_range_high: f64) -> Self {
        Self {
            rent,
            rent_range_low,
            rent_range_high,
            extra: Map::new(),
        }
    }
}

pub type EstimateMap = HashMap<String, CachedEstimate>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("estimate cache {path} unreadable: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("estimate cache {path} unwritable: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("estimate cache {path} is not valid JSON: {source}")]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("estimate cache unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the estimate cache. Read wholesale at the start of a run and
/// written wholesale at the end; one run owns the store at a time.
pub trait EstimateStore: Send + Sync {
    /// A store that has never been written loads as an empty mapping.
    fn load(&self) -> Result<EstimateMap, CacheError>;
    /// Replaces the stored contents with `estimates`.
    fn persist(&self, estimates: &EstimateMap) -> Result<(), CacheError>;
}

/// Pretty-printed JSON object keyed by canonical address.
#[derive(Debug, Clone)]
pub struct JsonFileEstimateStore {
    path: PathBuf,
}

impl JsonFileEstimateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl EstimateStore for JsonFileEstimateStore {
    fn load(&self) -> Result<EstimateMap, CacheError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no estimate cache on disk yet");
                return Ok(EstimateMap::new());
            }
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Format {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, estimates: &EstimateMap) -> Result<(), CacheError> {
        let staging = self.staging_path();
        let write_err = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };

        let ordered: BTreeMap<&String, &CachedEstimate> = estimates.iter().collect();
        let file = File::create(&staging).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &ordered).map_err(|source| {
            CacheError::Format {
                path: self.path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(write_err)?;
        drop(writer);

        std::fs::rename(&staging, &self.path).map_err(write_err)?;
        debug!(path = %self.path.display(), entries = estimates.len(), "estimate cache persisted");
        Ok(())
    }
}

/// Process-local store, handy for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct InMemoryEstimateStore {
    estimates: Mutex<EstimateMap>,
}

impl InMemoryEstimateStore {
    pub fn with_estimates(estimates: EstimateMap) -> Self {
        Self {
            estimates: Mutex::new(estimates),
        }
    }

    pub fn snapshot(&self) -> EstimateMap {
        lock(&self.estimates).clone()
    }
}

impl EstimateStore for InMemoryEstimateStore {
    fn load(&self) -> Result<EstimateMap, CacheError> {
        Ok(lock(&self.estimates).clone())
    }

    fn persist(&self, estimates: &EstimateMap) -> Result<(), CacheError> {
        *lock(&self.estimates) = estimates.clone();
        Ok(())
    }
}

/// Run-scoped view of the cache shared by concurrent fetches. Writes only touch
/// memory; the pipeline persists a snapshot once every fetch has settled, so a
/// crash mid-run loses the estimates fetched during that run.
#[derive(Debug, Default)]
pub struct EstimateCache {
    entries: Mutex<EstimateMap>,
}

impl EstimateCache {
    pub fn from_map(entries: EstimateMap) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, address: &str) -> Option<CachedEstimate> {
        lock(&self.entries).get(address).cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        lock(&self.entries).contains_key(address)
    }

    pub fn put(&self, address: impl Into<String>, estimate: CachedEstimate) {
        lock(&self.entries).insert(address.into(), estimate);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> EstimateMap {
        lock(&self.entries).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
