use serde::{Deserialize, Serialize};

use super::answers::AnswerMap;
use super::catalog::FlowCatalog;
use super::evaluator::{evaluate, ActiveFlow};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("no question is active for the current answers")]
    EmptyFlow,
    #[error("question '{0}' is not part of the active flow")]
    UnknownNode(String),
    #[error("navigation history is exhausted")]
    HistoryExhausted,
    #[error("question '{0}' does not take an answer")]
    NotInteractive(String),
}

/// Cursor over the active flow plus the stack of previously visited nodes.
///
/// Only node ids are kept; the active list is always re-derived from the catalog and the
/// answers, so the state never holds a stale branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredFlowState")]
pub struct FlowState {
    active: Vec<String>,
    cursor: usize,
    history: Vec<String>,
}

#[derive(Deserialize)]
struct StoredFlowState {
    active: Vec<String>,
    cursor: usize,
    history: Vec<String>,
}

impl TryFrom<StoredFlowState> for FlowState {
    type Error = String;

    fn try_from(stored: StoredFlowState) -> Result<Self, Self::Error> {
        if stored.cursor >= stored.active.len() {
            return Err(format!(
                "cursor {} is outside the {} active nodes",
                stored.cursor,
                stored.active.len()
            ));
        }
        Ok(Self {
            active: stored.active,
            cursor: stored.cursor,
            history: stored.history,
        })
    }
}

impl FlowState {
    /// Position the cursor on the first unanswered node.
    pub fn start(catalog: &FlowCatalog, answers: &AnswerMap) -> Result<Self, FlowError> {
        let flow = evaluate(catalog, answers);
        if flow.is_empty() {
            return Err(FlowError::EmptyFlow);
        }
        let cursor = first_unanswered(&flow, answers, 0).unwrap_or(flow.len() - 1);

        Ok(Self {
            active: ids(&flow),
            cursor,
            history: Vec::new(),
        })
    }

    /// Rebuild a state from a checkpointed cursor node and history.
    pub fn restore(
        catalog: &FlowCatalog,
        answers: &AnswerMap,
        cursor_node: Option<&str>,
        history: Vec<String>,
    ) -> Result<Self, FlowError> {
        let mut state = Self::start(catalog, answers)?;
        if let Some(position) = cursor_node.and_then(|id| state.position(id)) {
            state.cursor = position;
        }
        state.history = history;
        Ok(state)
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn current(&self) -> &str {
        &self.active[self.cursor]
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.active.iter().position(|active| active == id)
    }

    /// Re-derive the active nodes after a mutation. The cursor follows its node when the node
    /// survives, otherwise it clamps to the last valid index.
    pub fn refresh(&mut self, catalog: &FlowCatalog, answers: &AnswerMap) -> Result<(), FlowError> {
        let flow = evaluate(catalog, answers);
        if flow.is_empty() {
            return Err(FlowError::EmptyFlow);
        }

        let current = self.current().to_string();
        self.active = ids(&flow);
        self.cursor = match self.position(&current) {
            Some(position) => position,
            None => self.cursor.min(self.active.len() - 1),
        };
        Ok(())
    }

    /// Push the current node, recompute against the just-mutated answers, and move to the
    /// next unanswered node.
    pub fn advance(&mut self, catalog: &FlowCatalog, answers: &AnswerMap) -> Result<(), FlowError> {
        let flow = evaluate(catalog, answers);
        if flow.is_empty() {
            return Err(FlowError::EmptyFlow);
        }

        let current = self.current().to_string();
        self.history.push(current.clone());
        self.active = ids(&flow);

        let anchor = match flow.position(&current) {
            Some(position) => position + 1,
            None => self.cursor.min(self.active.len()),
        };

        self.cursor = first_unanswered(&flow, answers, anchor)
            .or_else(|| first_unanswered(&flow, answers, 0))
            .unwrap_or(self.active.len() - 1);
        Ok(())
    }

    /// Pop back to the most recent history entry that is still active.
    pub fn retreat(&mut self, catalog: &FlowCatalog, answers: &AnswerMap) -> Result<(), FlowError> {
        self.refresh(catalog, answers)?;
        while let Some(previous) = self.history.pop() {
            if let Some(position) = self.position(&previous) {
                self.cursor = position;
                return Ok(());
            }
        }
        Err(FlowError::HistoryExhausted)
    }
}

fn ids(flow: &ActiveFlow<'_>) -> Vec<String> {
    flow.ids().into_iter().map(str::to_string).collect()
}

fn first_unanswered(flow: &ActiveFlow<'_>, answers: &AnswerMap, from: usize) -> Option<usize> {
    flow.nodes()
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, active)| active.node.is_interactive() && !flow.is_answered(active.node, answers))
        .map(|(position, _)| position)
}
