use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{DestinationTag, DocumentRecord, Qualification};
use super::orchestrator::OrchestratorSettings;
use super::sections::{evaluated_flags, Progress, SectionContext};
use crate::workflows::questionnaire::{evaluate, AnswerMap};

/// Read-only endpoints exposing the pure engines over caller-supplied snapshots.
pub fn engine_router(settings: Arc<OrchestratorSettings>) -> Router {
    Router::new()
        .route("/api/v1/questionnaire/catalog", get(catalog_handler))
        .route("/api/v1/questionnaire/evaluate", post(evaluate_handler))
        .route("/api/v1/documents/requirements", post(requirements_handler))
        .route("/api/v1/sections/validate", post(validate_handler))
        .with_state(settings)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluateRequest {
    #[serde(default)]
    answers: AnswerMap,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RequirementsRequest {
    #[serde(default)]
    destinations: BTreeSet<DestinationTag>,
    #[serde(default)]
    documents: Vec<DocumentRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidateRequest {
    #[serde(default)]
    answers: AnswerMap,
    #[serde(default)]
    qualifications: Vec<Qualification>,
    #[serde(default)]
    documents: Vec<DocumentRecord>,
    #[serde(default)]
    submitted: bool,
}

pub(crate) async fn catalog_handler(State(settings): State<Arc<OrchestratorSettings>>) -> Response {
    (StatusCode::OK, Json(settings.questionnaire.as_ref())).into_response()
}

pub(crate) async fn evaluate_handler(
    State(settings): State<Arc<OrchestratorSettings>>,
    Json(request): Json<EvaluateRequest>,
) -> Response {
    let flow = evaluate(&settings.questionnaire, &request.answers);
    let progress = flow.progress(&request.answers);
    let payload = json!({
        "nodes": flow.nodes(),
        "answerable": flow.answerable().count(),
        "progress": progress,
        "percent": progress.percent(),
        "complete": flow.is_complete(&request.answers),
        "inert": flow.inert_answers(&request.answers),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn requirements_handler(
    State(settings): State<Arc<OrchestratorSettings>>,
    Json(request): Json<RequirementsRequest>,
) -> Response {
    let matrix = settings.resolver.resolve(&request.destinations);
    let compliance = settings.resolver.assess(&request.destinations, &request.documents);
    let required_in: BTreeMap<DestinationTag, bool> = request
        .destinations
        .iter()
        .map(|tag| (*tag, compliance.required_documents_in(*tag)))
        .collect();

    let payload = json!({
        "matrix": matrix,
        "compliance": compliance,
        "minimum_required_percent": compliance.minimum_required.percent(),
        "full_catalog_percent": compliance.full_catalog.percent(),
        "required_documents_in": required_in,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn validate_handler(
    State(settings): State<Arc<OrchestratorSettings>>,
    Json(request): Json<ValidateRequest>,
) -> Response {
    let flow = evaluate(&settings.questionnaire, &request.answers);
    let answers = flow.effective_answers(&request.answers);
    let destinations = DestinationTag::from_answers(&answers);
    let compliance = settings.resolver.assess(&destinations, &request.documents);
    let context = SectionContext {
        answers: &answers,
        qualifications: &request.qualifications,
        compliance: &compliance,
        submitted: request.submitted,
    };

    let verdicts = settings.validator.verdicts(&context);
    let progress = Progress::from_flags(&evaluated_flags(&verdicts));
    let payload = json!({
        "verdicts": verdicts,
        "progress": progress,
        "percent": progress.percent(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}
