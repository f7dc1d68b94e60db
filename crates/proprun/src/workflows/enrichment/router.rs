use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};

use super::cache::EstimateStore;
use super::domain::EnrichmentReport;
use super::rentcast::RentEstimateClient;
use super::service::{EnrichmentService, ListingOptionsRequest};
use crate::error::AppError;

/// Router builder exposing the listing processing endpoint.
pub fn enrichment_router<S, C>(service: Arc<EnrichmentService<S, C>>) -> Router
where
    S: EstimateStore + 'static,
    C: RentEstimateClient + 'static,
{
    Router::new()
        .route("/process_listings", post(process_listings_handler::<S, C>))
        .with_state(service)
}

pub(crate) async fn process_listings_handler<S, C>(
    State(service): State<Arc<EnrichmentService<S, C>>>,
    Json(request): Json<ListingOptionsRequest>,
) -> Result<Json<EnrichmentReport>, AppError>
where
    S: EstimateStore + 'static,
    C: RentEstimateClient + 'static,
{
    let report = service.process(request).await?;
    Ok(Json(report))
}
