use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::answers::{AnswerError, AnswerMap, AnswerStore, AnswerValue};
use super::catalog::{FlowCatalog, QuestionNode};
use super::checkpoint::{CheckpointError, CheckpointStore, DraftCheckpoint};
use super::diagnostic::{DiagnosticBackend, DiagnosticReport, DiagnosticRequest};
use super::evaluator::{evaluate, ActiveFlow, TranscriptEntry};
use super::navigator::{FlowError, FlowState};
use crate::workflows::application::services::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("questionnaire has {remaining} unanswered required question(s)")]
    Incomplete { remaining: usize },
}

/// Advisory chat session: answers, cursor, and a checkpoint written after every mutation.
pub struct QuestionnaireSession {
    catalog: Arc<FlowCatalog>,
    key: String,
    store: AnswerStore,
    state: FlowState,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl QuestionnaireSession {
    pub fn begin(
        catalog: Arc<FlowCatalog>,
        key: impl Into<String>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<Self, SessionError> {
        let store = AnswerStore::new();
        let state = FlowState::start(&catalog, store.as_map())?;
        Ok(Self {
            catalog,
            key: key.into(),
            store,
            state,
            checkpoints,
        })
    }

    /// Continue from the stored checkpoint, or start fresh when none exists.
    pub fn resume(
        catalog: Arc<FlowCatalog>,
        key: impl Into<String>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<Self, SessionError> {
        let key = key.into();
        let Some(checkpoint) = checkpoints.get(&key)? else {
            return Self::begin(catalog, key, checkpoints);
        };

        debug!(%key, answers = checkpoint.answers.len(), "resuming questionnaire checkpoint");
        let store = AnswerStore::from_map(checkpoint.answers);
        let state = FlowState::restore(
            &catalog,
            store.as_map(),
            checkpoint.cursor_node.as_deref(),
            checkpoint.history,
        )?;

        Ok(Self {
            catalog,
            key,
            store,
            state,
            checkpoints,
        })
    }

    pub fn current(&self) -> Result<&QuestionNode, FlowError> {
        let id = self.state.current();
        self.catalog
            .node(id)
            .ok_or_else(|| FlowError::UnknownNode(id.to_string()))
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn answers(&self) -> &AnswerMap {
        self.store.as_map()
    }

    pub fn flow(&self) -> ActiveFlow<'_> {
        evaluate(&self.catalog, self.store.as_map())
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry<'_>> {
        self.flow().transcript(self.store.as_map())
    }

    pub fn is_complete(&self) -> bool {
        self.flow().is_complete(self.store.as_map())
    }

    /// Answer the node under the cursor and move on.
    pub fn answer_current(
        &mut self,
        value: AnswerValue,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let node = self.current()?.clone();
        if !node.is_interactive() {
            return Err(FlowError::NotInteractive(node.id.to_string()).into());
        }
        self.store.answer(&node, value)?;
        self.state.advance(&self.catalog, self.store.as_map())?;
        self.checkpoint(now)
    }

    /// Change an earlier answer without moving the cursor; branches are re-derived.
    pub fn revise(
        &mut self,
        question: &str,
        value: AnswerValue,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let flow = self.flow();
        if !flow.contains(question) {
            return Err(FlowError::UnknownNode(question.to_string()).into());
        }
        let node = self
            .catalog
            .node(question)
            .cloned()
            .ok_or_else(|| FlowError::UnknownNode(question.to_string()))?;

        self.store.answer(&node, value)?;
        self.state.refresh(&self.catalog, self.store.as_map())?;
        self.checkpoint(now)
    }

    pub fn back(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.state.retreat(&self.catalog, self.store.as_map())?;
        self.checkpoint(now)
    }

    pub fn diagnostic_request(&self) -> DiagnosticRequest {
        DiagnosticRequest::from_flow(&self.flow(), self.store.as_map())
    }

    /// Forward the live answers to the scoring backend once every required node is answered.
    pub async fn request_diagnostic(
        &self,
        backend: &dyn DiagnosticBackend,
    ) -> Result<DiagnosticReport, SessionError> {
        let progress = self.flow().progress(self.store.as_map());
        if progress.answered < progress.total {
            return Err(SessionError::Incomplete {
                remaining: progress.total - progress.answered,
            });
        }

        let request = self.diagnostic_request();
        backend.score(&request).await.map_err(|err| {
            warn!(key = %self.key, error = %err, "diagnostic backend rejected questionnaire");
            SessionError::from(err)
        })
    }

    /// Drop the checkpoint and hand back the live answers.
    pub fn finish(self) -> Result<AnswerMap, SessionError> {
        self.checkpoints.clear(&self.key)?;
        let flow = evaluate(&self.catalog, self.store.as_map());
        Ok(flow.effective_answers(self.store.as_map()))
    }

    fn checkpoint(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        let checkpoint = DraftCheckpoint {
            answers: self.store.snapshot(),
            cursor_node: Some(self.state.current().to_string()),
            history: self.state.history().to_vec(),
            saved_at: now,
        };
        self.checkpoints.set(&self.key, &checkpoint)?;
        Ok(())
    }
}
