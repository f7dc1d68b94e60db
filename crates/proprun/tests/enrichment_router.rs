use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use proprun::workflows::enrichment::{
    enrichment_router, CachedEstimate, EnrichmentOptions, EnrichmentPipeline, EnrichmentService,
    FetchFailure, InMemoryEstimateStore, ListingCsvImporter, ListingRecord, ListingSource,
    ListingSourceError, RentEstimateClient, RentEstimateRequest, SnapshotListingSource,
};
use serde_json::Value;
use tower::ServiceExt;

const EXPORT: &str = "property_url,full_street_line,city,state,zip_code,style,beds,full_baths,half_baths,sqft,list_price,home_insurance,property_tax
https://x/1,1 First St,Austin,TX,78704,SINGLE_FAMILY,3,2,,1400,300000,100,400
https://x/2,2 Second St,Austin,TX,78705,CONDOS,2,1,1,,180000,60,250
https://x/3,3 Third St,Austin,TX,78704,SINGLE_FAMILY,,2,,1600,350000,110,420
";

struct InlineSource;

impl ListingSource for InlineSource {
    fn listings(&self, _location: &str) -> Result<Vec<ListingRecord>, ListingSourceError> {
        ListingCsvImporter::from_reader(EXPORT.as_bytes())
    }
}

#[derive(Default)]
struct FixedRentClient {
    calls: AtomicUsize,
}

#[async_trait]
impl RentEstimateClient for FixedRentClient {
    async fn fetch(&self, request: &RentEstimateRequest) -> Result<CachedEstimate, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.address.starts_with("1 ") {
            Ok(CachedEstimate::new(2800.0, 2500.0, 3100.0))
        } else {
            Ok(CachedEstimate::new(1200.0, 1100.0, 1300.0))
        }
    }
}

fn service_with(
    source: Arc<dyn ListingSource>,
    client: Arc<FixedRentClient>,
) -> Arc<EnrichmentService<InMemoryEstimateStore, FixedRentClient>> {
    let pipeline = EnrichmentPipeline::new(Arc::new(InMemoryEstimateStore::default()), client);
    Arc::new(EnrichmentService::new(
        pipeline,
        source,
        EnrichmentOptions::default(),
    ))
}

fn post(body: &str) -> Request<Body> {
    Request::post("/process_listings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn process_listings_returns_results_and_skip_counts() {
    let client = Arc::new(FixedRentClient::default());
    let router = enrichment_router(service_with(Arc::new(InlineSource), client.clone()));

    let response = router
        .oneshot(post(r#"{"location": "Austin, TX", "profit": 500}"#))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 2);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["skip_reasons"]["missing_required_field"], 1);

    let first = &results[0];
    assert_eq!(first["address"], "1 First St, Austin, TX 78704");
    assert_eq!(first["mortgage"], 1596.73);
    assert_eq!(first["is_profitable"], true);
    assert!(first["adjusted_profit"].is_null());

    let second = &results[1];
    assert_eq!(second["is_profitable"], false);
    assert_eq!(second["square_footage_estimated"], true);
    assert!(second["adjusted_profit"].is_number());

    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn zip_filter_and_limit_narrow_the_batch() {
    let client = Arc::new(FixedRentClient::default());
    let router = enrichment_router(service_with(Arc::new(InlineSource), client.clone()));

    let response = router
        .oneshot(post(
            r#"{"location": "Austin, TX", "num_listings": 2, "zip_code": 78705}"#,
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["address"], "2 Second St, Austin, TX 78705");
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_location_is_unprocessable() {
    let router = enrichment_router(service_with(
        Arc::new(InlineSource),
        Arc::new(FixedRentClient::default()),
    ));

    let response = router
        .oneshot(post(r#"{"location": "  "}"#))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_location_field_is_rejected() {
    let router = enrichment_router(service_with(
        Arc::new(InlineSource),
        Arc::new(FixedRentClient::default()),
    ));

    let response = router
        .oneshot(post(r#"{"profit": 500}"#))
        .await
        .expect("router responds");
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn missing_snapshot_is_a_server_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let router = enrichment_router(service_with(
        Arc::new(SnapshotListingSource::new(dir.path())),
        Arc::new(FixedRentClient::default()),
    ));

    let response = router
        .oneshot(post(r#"{"location": "Austin, TX"}"#))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Error loading CSV file");
}
