use crate::cli::ServeArgs;
use crate::infra::{build_enrichment_service, AppState};
use crate::routes::with_enrichment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use proprun::config::AppConfig;
use proprun::error::AppError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub(crate) async fn run(mut config: AppConfig, mut args: ServeArgs) -> Result<(), AppError> {
    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if args.cache_only {
        info!("running in cache only mode");
    }
    let service = build_enrichment_service(&config, args.cache_only, args.test_csv.take())?;

    let app = with_enrichment_routes(service)
        .layer(Extension(app_state))
        .layer(CorsLayer::permissive())
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "listing enrichment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
