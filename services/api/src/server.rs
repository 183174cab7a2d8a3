use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_engine_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use study_abroad::config::AppConfig;
use study_abroad::error::AppError;
use study_abroad::telemetry;
use study_abroad::workflows::application::OrchestratorSettings;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(catalog) = args.catalog.take() {
        config.intake.document_catalog_csv = Some(catalog);
    }

    telemetry::init(&config.telemetry)?;

    let settings = Arc::new(OrchestratorSettings::from_config(&config.intake)?);
    info!(
        groups = settings.resolver.catalog().groups().len(),
        debounce_ms = config.intake.save_debounce_ms,
        custom_catalog = config.intake.document_catalog_csv.is_some(),
        "intake engine configured"
    );

    let (app, ready) = instrumented(with_engine_routes(settings));
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    ready.store(true, Ordering::Release);

    info!(?config.environment, %addr, "study abroad intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Attach the Prometheus layer and the shared state behind `/ready` and `/metrics`.
/// Readiness stays false until the caller flips the returned flag.
fn instrumented(router: Router) -> (Router, Arc<AtomicBool>) {
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let ready = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: ready.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let router = router.layer(Extension(state)).layer(prometheus_layer);
    (router, ready)
}
