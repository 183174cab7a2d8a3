use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::answers::{AnswerMap, AnswerValue};
use super::evaluator::ActiveFlow;
use crate::workflows::application::services::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticAnswer {
    pub question_id: String,
    pub kind: &'static str,
    pub value: AnswerValue,
}

/// Payload forwarded to the scoring backend. Only live, answered, interactive nodes are
/// included, in flow order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRequest {
    pub answers: Vec<DiagnosticAnswer>,
}

impl DiagnosticRequest {
    pub fn from_flow(flow: &ActiveFlow<'_>, answers: &AnswerMap) -> Self {
        let answers = flow
            .answerable()
            .filter_map(|node| {
                answers
                    .get(node.id)
                    .filter(|value| value.is_filled())
                    .map(|value| DiagnosticAnswer {
                        question_id: node.id.to_string(),
                        kind: node.kind.label(),
                        value: value.clone(),
                    })
            })
            .collect();

        Self { answers }
    }
}

/// Scored diagnostic as returned by the backend; its contents are opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub summary: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[async_trait]
pub trait DiagnosticBackend: Send + Sync {
    async fn score(&self, request: &DiagnosticRequest) -> Result<DiagnosticReport, ServiceError>;
}
