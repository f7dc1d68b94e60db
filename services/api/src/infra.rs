use metrics_exporter_prometheus::PrometheusHandle;
use proprun::config::AppConfig;
use proprun::error::AppError;
use proprun::workflows::enrichment::{
    EnrichmentOptions, EnrichmentPipeline, EnrichmentService, FixtureListingSource,
    JsonFileEstimateStore, ListingSource, RentcastClient, RetryingClient, SnapshotListingSource,
};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) type LiveEnrichmentService =
    EnrichmentService<JsonFileEstimateStore, RetryingClient<RentcastClient>>;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Run defaults derived from configuration. Request payloads override the
/// financing fields per call.
pub(crate) fn default_options(config: &AppConfig, cache_only: bool) -> EnrichmentOptions {
    let attempts = config.rentcast.max_retries.saturating_add(1);
    let backoff: Duration = (0..config.rentcast.max_retries)
        .map(|attempt| RETRY_BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt)))
        .sum();

    EnrichmentOptions {
        cache_only,
        concurrency: config.pipeline.concurrency,
        fetch_timeout: config.rentcast.timeout.saturating_mul(attempts) + backoff,
        ..EnrichmentOptions::default()
    }
}

pub(crate) fn build_pipeline(
    config: &AppConfig,
) -> Result<EnrichmentPipeline<JsonFileEstimateStore, RetryingClient<RentcastClient>>, AppError> {
    let client = RentcastClient::new(&config.rentcast)?;
    if !client.has_credentials() {
        warn!("RENTCAST_API_KEY not set; only cached rent estimates will be available");
    }

    let client = RetryingClient::new(client, config.rentcast.max_retries, RETRY_BASE_DELAY);
    let store = JsonFileEstimateStore::new(config.storage.cache_file.clone());
    info!(cache = %store.path().display(), "using estimate cache");

    Ok(EnrichmentPipeline::new(Arc::new(store), Arc::new(client)))
}

pub(crate) fn build_enrichment_service(
    config: &AppConfig,
    cache_only: bool,
    test_csv: Option<PathBuf>,
) -> Result<Arc<LiveEnrichmentService>, AppError> {
    let pipeline = build_pipeline(config)?;

    let source: Arc<dyn ListingSource> = match test_csv {
        Some(path) => {
            info!(path = %path.display(), "running in test mode");
            Arc::new(FixtureListingSource::new(path))
        }
        None => Arc::new(SnapshotListingSource::new(config.storage.data_dir.clone())),
    };

    Ok(Arc::new(EnrichmentService::new(
        pipeline,
        source,
        default_options(config, cache_only),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proprun::config::{
        AppEnvironment, PipelineConfig, RentcastConfig, ServerConfig, StorageConfig,
        TelemetryConfig,
    };

    fn config() -> AppConfig {
        AppConfig {
            environment: AppEnvironment::Test,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
            rentcast: RentcastConfig {
                api_key: None,
                base_url: RentcastConfig::DEFAULT_BASE_URL.to_string(),
                timeout: Duration::from_secs(10),
                max_retries: 2,
            },
            storage: StorageConfig {
                cache_file: PathBuf::from("rentcast_cache.json"),
                data_dir: PathBuf::from("."),
            },
            pipeline: PipelineConfig { concurrency: 4 },
        }
    }

    #[test]
    fn fetch_timeout_covers_every_attempt_and_backoff() {
        let options = default_options(&config(), true);
        assert!(options.cache_only);
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.fetch_timeout, Duration::from_millis(31_500));
        assert_eq!(options.profit, 500.0);
    }
}
