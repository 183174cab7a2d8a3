use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::Arc;
use study_abroad::error::AppError;
use study_abroad::workflows::application::{
    engine_router, resolve, DestinationTag, DocumentCatalog, DocumentGroup, OrchestratorSettings,
    RequiredDocument,
};

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogPreviewRequest {
    pub(crate) csv: String,
    #[serde(default)]
    pub(crate) destinations: BTreeSet<DestinationTag>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CatalogPreviewResponse {
    pub(crate) groups: Vec<DocumentGroup>,
    pub(crate) required: Vec<RequiredDocument>,
}

pub(crate) fn with_engine_routes(settings: Arc<OrchestratorSettings>) -> axum::Router {
    engine_router(settings)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/documents/catalog/preview",
            axum::routing::post(catalog_preview_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Parse a catalog CSV export and show what it would require for the given destinations.
pub(crate) async fn catalog_preview_endpoint(
    Json(payload): Json<CatalogPreviewRequest>,
) -> Result<Json<CatalogPreviewResponse>, AppError> {
    let CatalogPreviewRequest { csv, destinations } = payload;
    let catalog = DocumentCatalog::from_csv_reader(Cursor::new(csv.into_bytes()))?;
    let matrix = resolve(&destinations, &catalog);

    Ok(Json(CatalogPreviewResponse {
        groups: matrix.groups,
        required: matrix.required,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const CSV: &str = "Group,Destination,Key,Label,Category,Required\n\
identity,,passport,Passport,identity,yes\n\
canada,canada,acceptance_certificate,Letter of acceptance,academic,yes\n";

    #[tokio::test]
    async fn catalog_preview_resolves_requested_destinations() {
        let request = CatalogPreviewRequest {
            csv: CSV.to_string(),
            destinations: [DestinationTag::Canada].into_iter().collect(),
        };

        let Json(body) = catalog_preview_endpoint(Json(request))
            .await
            .expect("preview builds");

        assert_eq!(body.groups.len(), 2);
        assert_eq!(body.required.len(), 2);
        assert!(body.required[0].base);
        assert_eq!(
            body.required[1].destinations,
            [DestinationTag::Canada].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn catalog_preview_reports_bad_rows_as_client_errors() {
        let request = CatalogPreviewRequest {
            csv: "Group,Destination,Key,Label,Category,Required\n\
identity,,passport,Passport,identity,yes\n\
extra,japan,passport,Passport,identity,yes\n"
                .to_string(),
            destinations: BTreeSet::new(),
        };

        let err = catalog_preview_endpoint(Json(request))
            .await
            .expect_err("unknown destination rejected");
        assert_eq!(
            err.to_string(),
            "document catalog error: line 3: unknown destination 'japan'"
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_route_is_mounted_next_to_engine_routes() {
        let router = with_engine_routes(Arc::new(OrchestratorSettings::default()));
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
