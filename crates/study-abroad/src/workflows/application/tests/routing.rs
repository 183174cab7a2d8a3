use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::application::domain::{DocumentKey, Language, QualificationKind};
use crate::workflows::application::{engine_router, OrchestratorSettings};

fn router() -> axum::Router {
    engine_router(Arc::new(OrchestratorSettings::default()))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[tokio::test]
async fn catalog_route_lists_groups_in_order() {
    let response = router()
        .oneshot(
            Request::get("/api/v1/questionnaire/catalog")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let groups = payload["groups"].as_array().expect("groups array");
    assert_eq!(groups[0]["key"], "welcome");
    assert!(groups.iter().any(|group| group["key"] == "china"));
}

#[tokio::test]
async fn evaluate_route_reports_inert_answers() {
    let response = router()
        .oneshot(post(
            "/api/v1/questionnaire/evaluate",
            json!({
                "answers": {
                    "study_level": "master",
                    "destinations": ["china"],
                    "campus_france_started": "yes"
                }
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["inert"], json!(["campus_france_started"]));
    assert_eq!(payload["complete"], false);
    let ids: Vec<&str> = payload["nodes"]
        .as_array()
        .expect("nodes array")
        .iter()
        .filter_map(|node| node["id"].as_str())
        .collect();
    assert!(ids.contains(&"china_teaching_language"));
    assert!(!ids.contains(&"french_proficiency"));
}

#[tokio::test]
async fn requirements_route_flags_untranslated_documents() {
    let passport = record("doc-1", DocumentKey::Passport, Language::arabic());
    let response = router()
        .oneshot(post(
            "/api/v1/documents/requirements",
            json!({ "destinations": ["france"], "documents": [passport] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["required_documents_in"]["france"], false);
    assert_eq!(payload["minimum_required_percent"], 0.0);
    let passport = payload["compliance"]["documents"]
        .as_array()
        .expect("documents array")
        .iter()
        .find(|document| document["key"] == "passport")
        .expect("passport assessed")
        .clone();
    assert_eq!(passport["uploaded"], true);
    assert_eq!(passport["language_ok_for"]["france"], false);
}

#[tokio::test]
async fn requirements_route_rejects_unknown_destination() {
    let response = router()
        .oneshot(post(
            "/api/v1/documents/requirements",
            json!({ "destinations": ["japan"] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn validate_route_returns_verdicts_for_gating_sections() {
    let mut answers = complete_profile();
    answers.insert("intake".to_string(), text("september-2026"));
    let qualifications = vec![
        qualification(QualificationKind::Language, "DELF B2"),
        qualification(QualificationKind::Academic, "Licence Informatique"),
    ];

    let response = router()
        .oneshot(post(
            "/api/v1/sections/validate",
            json!({ "answers": answers, "qualifications": qualifications }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let verdicts = payload["verdicts"].as_array().expect("verdicts array");
    assert_eq!(verdicts.len(), 5);
    let satisfied = |section: &str| {
        verdicts
            .iter()
            .find(|verdict| verdict["section"] == section)
            .map(|verdict| verdict["satisfied"] == true)
            .unwrap_or(false)
    };
    assert!(satisfied("personalInformation"));
    assert!(satisfied("academicBackground"));
    assert!(!satisfied("documents"));
    assert!(satisfied("preferences"));
    assert!(!satisfied("review"));
    assert_eq!(payload["progress"]["completed"], 3);
    assert_eq!(payload["progress"]["total"], 5);
}
