use std::collections::HashSet;

use serde::Serialize;

use super::answers::{AnswerMap, AnswerValue};
use super::catalog::{FlowCatalog, QuestionNode};

/// Walk the catalog in declaration order and keep the nodes whose guards hold.
///
/// Predicates only see answers that are still live: non-catalog form fields, or catalog
/// answers whose node was already activated earlier in the walk. An answer orphaned by a
/// retracted branch therefore cannot keep a downstream node alive.
pub fn evaluate<'c>(catalog: &'c FlowCatalog, answers: &AnswerMap) -> ActiveFlow<'c> {
    let mut active: Vec<ActiveNode<'c>> = Vec::new();
    let mut live_ids: HashSet<&'c str> = HashSet::new();

    for group in catalog.groups() {
        let group_open = {
            let lookup = |id: &str| live_answer(catalog, answers, &live_ids, id);
            group.guard.holds(&lookup)
        };
        if !group_open {
            continue;
        }

        for node in &group.nodes {
            let included = {
                let lookup = |id: &str| live_answer(catalog, answers, &live_ids, id);
                node.condition.holds(&lookup)
            };
            if included {
                live_ids.insert(node.id);
                active.push(ActiveNode {
                    group: group.key,
                    node,
                });
            }
        }
    }

    ActiveFlow {
        catalog,
        nodes: active,
    }
}

fn live_answer<'a>(
    catalog: &FlowCatalog,
    answers: &'a AnswerMap,
    live_ids: &HashSet<&str>,
    id: &str,
) -> Option<&'a AnswerValue> {
    if catalog.contains(id) && !live_ids.contains(id) {
        return None;
    }
    answers.get(id)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActiveNode<'c> {
    pub group: &'static str,
    #[serde(flatten)]
    pub node: &'c QuestionNode,
}

/// One line of the chat transcript: an active node and, when answered, its answer.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry<'c> {
    pub node: &'c QuestionNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerValue>,
}

/// Answered-versus-total counts over the required answerable projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowProgress {
    pub answered: usize,
    pub total: usize,
}

impl FlowProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.answered * 100) / self.total) as u8
    }
}

/// Ordered active nodes derived from one answer snapshot.
#[derive(Debug, Clone)]
pub struct ActiveFlow<'c> {
    catalog: &'c FlowCatalog,
    nodes: Vec<ActiveNode<'c>>,
}

impl<'c> ActiveFlow<'c> {
    pub fn nodes(&self) -> &[ActiveNode<'c>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|active| active.node.id).collect()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|active| active.node.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Interactive nodes only; info banners never count toward progress.
    pub fn answerable(&self) -> impl Iterator<Item = &'c QuestionNode> + '_ {
        self.nodes
            .iter()
            .map(|active| active.node)
            .filter(|node| node.is_interactive())
    }

    pub fn transcript(&self, answers: &AnswerMap) -> Vec<TranscriptEntry<'c>> {
        self.nodes
            .iter()
            .map(|active| TranscriptEntry {
                node: active.node,
                answer: answers.get(active.node.id).cloned(),
            })
            .collect()
    }

    /// Answers minus catalog answers whose node is not active.
    pub fn effective_answers(&self, answers: &AnswerMap) -> AnswerMap {
        answers
            .iter()
            .filter(|(id, _)| !self.catalog.contains(id) || self.contains(id))
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    /// Catalog answers kept in storage but excluded from the live flow.
    pub fn inert_answers(&self, answers: &AnswerMap) -> Vec<String> {
        answers
            .keys()
            .filter(|id| self.catalog.contains(id) && !self.contains(id))
            .cloned()
            .collect()
    }

    pub fn is_answered(&self, node: &QuestionNode, answers: &AnswerMap) -> bool {
        !node.is_interactive()
            || answers
                .get(node.id)
                .map(AnswerValue::is_filled)
                .unwrap_or(false)
    }

    pub fn progress(&self, answers: &AnswerMap) -> FlowProgress {
        let required: Vec<&QuestionNode> =
            self.answerable().filter(|node| node.required).collect();
        let answered = required
            .iter()
            .filter(|node| self.is_answered(node, answers))
            .count();
        FlowProgress {
            answered,
            total: required.len(),
        }
    }

    pub fn is_complete(&self, answers: &AnswerMap) -> bool {
        self.answerable()
            .filter(|node| node.required)
            .all(|node| self.is_answered(node, answers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::questionnaire::answers::AnswerValue;
    use crate::workflows::questionnaire::catalog::FlowCatalog;

    fn answers(pairs: &[(&str, AnswerValue)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(id, value)| (id.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn evaluation_is_deterministic_and_idempotent() {
        let catalog = FlowCatalog::advisory();
        let snapshot = answers(&[
            ("study_level", AnswerValue::text("master")),
            ("destinations", AnswerValue::choices(["china", "france"])),
            ("wants_callback", AnswerValue::text("yes")),
        ]);

        let first = evaluate(&catalog, &snapshot).ids();
        for _ in 0..5 {
            assert_eq!(evaluate(&catalog, &snapshot).ids(), first);
        }
    }

    #[test]
    fn branch_order_ignores_selection_order() {
        let catalog = FlowCatalog::advisory();
        let china_first = answers(&[("destinations", AnswerValue::choices(["china", "france"]))]);
        let france_first = answers(&[("destinations", AnswerValue::choices(["france", "china"]))]);

        let left = evaluate(&catalog, &china_first).ids();
        let right = evaluate(&catalog, &france_first).ids();

        assert_eq!(left, right);
        let france = left
            .iter()
            .position(|id| *id == "france_banner")
            .expect("france branch present");
        let china = left
            .iter()
            .position(|id| *id == "china_banner")
            .expect("china branch present");
        assert!(france < china, "france branch declared before china");
    }

    #[test]
    fn banners_are_emitted_but_not_answerable() {
        let catalog = FlowCatalog::advisory();
        let flow = evaluate(&catalog, &AnswerMap::new());

        assert!(flow.contains("welcome_banner"));
        assert!(flow.answerable().all(|node| node.id != "welcome_banner"));
        let transcript = flow.transcript(&AnswerMap::new());
        assert_eq!(transcript[0].node.id, "welcome_banner");
    }

    #[test]
    fn trailing_conditional_follows_sentinel() {
        let catalog = FlowCatalog::advisory();
        let mut snapshot = answers(&[
            ("wants_callback", AnswerValue::text("yes")),
            ("callback_slot", AnswerValue::text("evening")),
        ]);
        let flow = evaluate(&catalog, &snapshot);
        assert!(flow.contains("callback_slot"));
        assert!(flow.inert_answers(&snapshot).is_empty());

        snapshot.insert("wants_callback".to_string(), AnswerValue::text("no"));
        let flow = evaluate(&catalog, &snapshot);
        assert!(!flow.contains("callback_slot"));
        assert_eq!(flow.inert_answers(&snapshot), vec!["callback_slot"]);
        assert!(!flow
            .effective_answers(&snapshot)
            .contains_key("callback_slot"));
        assert!(snapshot.contains_key("callback_slot"), "storage is untouched");
        assert!(flow
            .transcript(&snapshot)
            .iter()
            .all(|entry| entry.node.id != "callback_slot"));
    }

    #[test]
    fn retracted_destination_makes_branch_answers_inert() {
        let catalog = FlowCatalog::advisory();
        let mut snapshot = answers(&[
            ("destinations", AnswerValue::choices(["france", "china"])),
            ("french_proficiency", AnswerValue::Number(4.0)),
            ("passport_number", AnswerValue::text("AB123456")),
        ]);
        assert!(evaluate(&catalog, &snapshot).contains("french_proficiency"));

        snapshot.insert("destinations".to_string(), AnswerValue::choices(["china"]));
        let flow = evaluate(&catalog, &snapshot);

        assert!(!flow.contains("france_banner"));
        assert!(!flow.contains("french_proficiency"));
        let effective = flow.effective_answers(&snapshot);
        assert!(!effective.contains_key("french_proficiency"));
        assert!(
            effective.contains_key("passport_number"),
            "form fields outside the catalog pass through"
        );
    }

    #[test]
    fn progress_counts_required_answerable_nodes() {
        let catalog = FlowCatalog::advisory();
        let snapshot = answers(&[
            ("study_level", AnswerValue::text("bachelor")),
            ("destinations", AnswerValue::choices(["morocco"])),
            ("field_of_interest", AnswerValue::text("  ")),
        ]);
        let flow = evaluate(&catalog, &snapshot);
        let progress = flow.progress(&snapshot);

        // study_level, destinations, field_of_interest, morocco_city, budget x2, contact x4
        assert_eq!(progress.total, 10);
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.percent(), 20);
        assert!(!flow.is_complete(&snapshot));
    }
}
