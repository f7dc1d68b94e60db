use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::enrichment::{
    EnrichmentServiceError, FetchFailure, ListingSourceError, PipelineError,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use tracing::warn;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Listings(ListingSourceError),
    Enrichment(PipelineError),
    RentEstimate(FetchFailure),
    InvalidRequest(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Listings(err) => write!(f, "listing source error: {}", err),
            AppError::Enrichment(err) => write!(f, "enrichment error: {}", err),
            AppError::RentEstimate(err) => write!(f, "rent estimate client error: {}", err),
            AppError::InvalidRequest(message) => write!(f, "invalid request: {}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Listings(err) => Some(err),
            AppError::Enrichment(err) => Some(err),
            AppError::RentEstimate(err) => Some(err),
            AppError::InvalidRequest(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match &self {
            AppError::InvalidRequest(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": message }))
            }
            AppError::Listings(err) => {
                warn!(error = %err, "listing source unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Error loading CSV file", "detail": err.to_string() }),
                )
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Enrichment(_)
            | AppError::RentEstimate(_) => {
                warn!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": self.to_string() }),
                )
            }
        };

        (status, Json(payload)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ListingSourceError> for AppError {
    fn from(value: ListingSourceError) -> Self {
        Self::Listings(value)
    }
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Enrichment(value)
    }
}

impl From<FetchFailure> for AppError {
    fn from(value: FetchFailure) -> Self {
        Self::RentEstimate(value)
    }
}

impl From<EnrichmentServiceError> for AppError {
    fn from(value: EnrichmentServiceError) -> Self {
        match value {
            EnrichmentServiceError::InvalidRequest(message) => Self::InvalidRequest(message),
            EnrichmentServiceError::Source(err) => Self::Listings(err),
            EnrichmentServiceError::Pipeline(err) => Self::Enrichment(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::enrichment::CacheError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn listing_errors_are_reported_as_csv_load_failures() {
        let error = AppError::from(EnrichmentServiceError::from(ListingSourceError::Io {
            path: "missing.csv".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Error loading CSV file");
        assert!(body["detail"]
            .as_str()
            .expect("detail string")
            .contains("missing.csv"));
    }

    #[tokio::test]
    async fn invalid_requests_are_unprocessable() {
        let error = AppError::from(EnrichmentServiceError::InvalidRequest(
            "location is required".to_string(),
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "location is required");
    }

    #[test]
    fn cache_failures_are_server_errors() {
        let error = AppError::from(PipelineError::from(CacheError::Unavailable(
            "locked".to_string(),
        )));
        assert!(error.to_string().contains("locked"));
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
